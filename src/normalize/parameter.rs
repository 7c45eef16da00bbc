use std::collections::BTreeMap;

use log::{debug, info};
use serde_json::{Map, Value};

use crate::coerce::{coerce, CanonicalValue};
use crate::error::Rejection;
use crate::normalize::resolve;
use crate::software::ParameterSpec;

/// Canonical parameter set, keyed by parameter key
pub type Parameters = BTreeMap<String, CanonicalValue>;

/// Validate and coerce the raw parameter map against the declared parameters
///
/// Keys the application does not declare are ignored.
pub fn normalize_parameters(
    specs: &[ParameterSpec],
    raw: &Map<String, Value>,
) -> Result<Parameters, Rejection> {
    info!("Normalizing {} parameters against {} declared", raw.len(), specs.len());
    let mut parameters = Parameters::new();

    for spec in specs {
        let Some(value) = resolve(&spec.key, spec.visible, spec.required, &spec.default_value, raw)?
        else {
            continue;
        };

        if let Some(canonical) = coerce(&spec.rules(), value)? {
            debug!("Parameter {} = {:?}", spec.key, canonical);
            parameters.insert(spec.key.clone(), canonical);
        }
    }

    Ok(parameters)
}
