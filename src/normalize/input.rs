use std::collections::BTreeMap;

use log::{debug, info};
use serde_json::{Map, Value};

use crate::catalog::Catalog;
use crate::coerce::{coerce, CanonicalValue, LIST_DELIMITER};
use crate::error::Rejection;
use crate::normalize::probe::InputProbe;
use crate::normalize::resolve;
use crate::normalize::uri::check_input;
use crate::software::InputSpec;

/// Canonical input set, keyed by input key
pub type Inputs = BTreeMap<String, Vec<String>>;

/// Validate and coerce the raw input map, checking every value is a supported, reachable location
///
/// A value that fails the location check rejects the whole input set.
pub fn normalize_inputs<C, P>(
    specs: &[InputSpec],
    raw: &Map<String, Value>,
    catalog: &C,
    probe: &P,
) -> Result<Inputs, Rejection>
where
    C: Catalog + ?Sized,
    P: InputProbe + ?Sized,
{
    info!("Normalizing {} inputs against {} declared", raw.len(), specs.len());
    let mut inputs = Inputs::new();

    for spec in specs {
        let Some(value) = resolve(&spec.key, spec.visible, spec.required, &spec.default_value, raw)?
        else {
            continue;
        };

        // inputs are string typed, coercion only ever yields a list
        let Some(CanonicalValue::List(locations)) = coerce(&spec.rules(), &drop_blank(value))? else {
            continue;
        };
        for location in &locations {
            check_input(&spec.key, location, catalog, probe)?;
        }

        debug!("Input {} = {:?}", spec.key, locations);
        inputs.insert(spec.key.clone(), locations);
    }

    Ok(inputs)
}

/// Blank and null elements are not locations and do not count toward cardinality
fn drop_blank(value: &Value) -> Value {
    let present = |element: &&str| !element.trim().is_empty();
    match value {
        Value::String(s) => s
            .split(LIST_DELIMITER)
            .filter(present)
            .map(|element| Value::String(element.to_string()))
            .collect(),
        Value::Array(values) => values
            .iter()
            .filter(|element| match element {
                Value::Null => false,
                Value::String(s) => present(&s.as_str()),
                _ => true,
            })
            .cloned()
            .collect(),
        other => other.clone(),
    }
}
