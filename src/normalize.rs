//! Normalize raw parameter and input maps against an application's schema
//!
//! Both normalizers walk the schema in order and apply the same visibility policy:
//! - hidden fields may never be supplied, and always take their coerced default
//! - a missing visible field is an error only if required, and is otherwise omitted
//! - an explicit null on a visible field means "no value" and is omitted
//! - anything else is coerced

use log::debug;
use serde_json::{Map, Value};

use crate::error::{Rejection, RejectionKind};

/// Canonical parameters, application-declared keys only
pub mod parameter;
/// Canonical inputs, with every value checked as a supported location
pub mod input;
/// Classify and check input locations
pub mod uri;
/// Bounded reachability checks for remote inputs
pub mod probe;

/// Pick the raw value to coerce for one declared field, or `None` to omit the field
fn resolve<'v>(
    key: &str,
    visible: bool,
    required: bool,
    default_value: &'v Value,
    raw: &'v Map<String, Value>,
) -> Result<Option<&'v Value>, Rejection> {
    if !visible {
        if raw.contains_key(key) {
            return Err(Rejection::new(
                RejectionKind::HiddenFieldSupplied,
                format!(
                    "Invalid value for {key}. {key} is a fixed value that cannot be set manually."
                ),
            ));
        }
        debug!("Injecting default value for hidden field {key}");
        return Ok(Some(default_value));
    }

    match raw.get(key) {
        None if required => Err(Rejection::new(
            RejectionKind::RequiredFieldMissing,
            format!("No value specified for {key}"),
        )),
        None => Ok(None),
        Some(Value::Null) => {
            debug!("Explicit null for {key}, omitting");
            Ok(None)
        }
        Some(value) => Ok(Some(value)),
    }
}
