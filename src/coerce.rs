//! Type and cardinality coercion of a single raw value
//!
//! A raw value is whatever the caller sent for one field: a scalar, a `;`-delimited string, a
//! native list, or null. Coercion turns it into an ordered list of strings, or a single boolean
//! for `bool`/`flag` fields, or rejects it.
//!
//! Null elements inside a list count toward cardinality but are dropped from the output.

use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Rejection;
use crate::software::{FieldRules, ParameterType};

/// Separator for multiple values packed into one string
pub const LIST_DELIMITER: char = ';';

/// A coerced, persistable field value
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CanonicalValue {
    Flag(bool),
    List(Vec<String>),
}

impl CanonicalValue {
    pub fn to_value(&self) -> Value {
        match self {
            CanonicalValue::Flag(flag) => Value::Bool(*flag),
            CanonicalValue::List(values) => {
                Value::Array(values.iter().cloned().map(Value::String).collect())
            }
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            CanonicalValue::List(values) => Some(values),
            CanonicalValue::Flag(_) => None,
        }
    }
}

/// Coerce `raw` according to `rules`
///
/// Returns `Ok(None)` when the value carries nothing to emit, e.g. a list of nulls or a blank
/// boolean. Callers omit the field in that case.
pub fn coerce(rules: &FieldRules, raw: &Value) -> Result<Option<CanonicalValue>, Rejection> {
    let elements = explode(rules.key, raw)?;

    if rules.value_type.is_boolean() && elements.len() > 1 {
        return Err(Rejection::invalid_type(format!(
            "Invalid parameter value for {}. Boolean and flag parameters do not support multiple values.",
            rules.key
        )));
    }

    check_cardinality(rules, elements.len())?;

    match rules.value_type {
        ParameterType::Bool | ParameterType::Flag => coerce_boolean(rules, &elements),
        ParameterType::Number => coerce_number(rules, &elements),
        ParameterType::Enumeration => coerce_enumeration(rules, &elements),
        ParameterType::String => coerce_string(rules, &elements),
    }
}

/// Split a raw value into trimmed elements, `None` standing for a null list element
fn explode(key: &str, raw: &Value) -> Result<Vec<Option<String>>, Rejection> {
    match raw {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(s
            .split(LIST_DELIMITER)
            .map(|element| Some(element.trim().to_string()))
            .collect()),
        Value::Bool(_) | Value::Number(_) => Ok(vec![Some(raw.to_string())]),
        Value::Array(values) => values
            .iter()
            .map(|value| match value {
                Value::Null => Ok(None),
                Value::String(s) => Ok(Some(s.trim().to_string())),
                Value::Bool(_) | Value::Number(_) => Ok(Some(value.to_string())),
                _ => Err(nested_value(key, value)),
            })
            .collect(),
        Value::Object(_) => Err(nested_value(key, raw)),
    }
}

fn nested_value(key: &str, value: &Value) -> Rejection {
    Rejection::invalid_type(format!(
        "Invalid value, {}, for {}. Values must be scalars or lists of scalars.",
        value, key
    ))
}

fn check_cardinality(rules: &FieldRules, count: usize) -> Result<(), Rejection> {
    let count = count as i64;
    if rules.min_cardinality > count {
        return Err(Rejection::invalid_cardinality(format!(
            "{} requires at least {} values",
            rules.key, rules.min_cardinality
        )));
    }
    if rules.max_cardinality != -1 && rules.max_cardinality < count {
        return Err(Rejection::invalid_cardinality(format!(
            "{} may have at most {} values",
            rules.key, rules.max_cardinality
        )));
    }
    Ok(())
}

fn coerce_boolean(
    rules: &FieldRules,
    elements: &[Option<String>],
) -> Result<Option<CanonicalValue>, Rejection> {
    let Some(Some(token)) = elements.first() else {
        return Ok(None);
    };
    if token.is_empty() {
        return Ok(None);
    }

    match parse_truthy(token) {
        Some(flag) => Ok(Some(CanonicalValue::Flag(flag))),
        None => Err(Rejection::invalid_type(format!(
            "Invalid parameter value for {}. Value {} must be a case-insensitive truthy value. \
             1, on, or true evaluate to true. 0, off, and false evaluate to false.",
            rules.key, token
        ))),
    }
}

/// Case and whitespace insensitive truthy/falsy tokens
pub fn parse_truthy(token: &str) -> Option<bool> {
    match token.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" => Some(true),
        "false" | "0" | "off" => Some(false),
        _ => None,
    }
}

fn decimal() -> &'static Regex {
    static DECIMAL: OnceLock<Regex> = OnceLock::new();
    DECIMAL.get_or_init(|| {
        Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").expect("decimal pattern compiles")
    })
}

fn coerce_number(
    rules: &FieldRules,
    elements: &[Option<String>],
) -> Result<Option<CanonicalValue>, Rejection> {
    let validator = compile_validator(rules)?;
    let mut values = Vec::new();
    for element in elements.iter().flatten() {
        // blank numbers carry no value
        if element.is_empty() {
            continue;
        }
        if !decimal().is_match(element) {
            return Err(Rejection::invalid_type(format!(
                "Invalid parameter value for {}. Value '{}' must be a number.",
                rules.key, element
            )));
        }
        check_validator(rules, validator.as_ref(), element)?;
        values.push(element.clone());
    }
    Ok(emit(values))
}

fn coerce_enumeration(
    rules: &FieldRules,
    elements: &[Option<String>],
) -> Result<Option<CanonicalValue>, Rejection> {
    if rules.enumerated_values.is_empty() {
        return Err(Rejection::invalid_type(format!(
            "Unable to validate parameter value for {}. No enumerated values are defined.",
            rules.key
        )));
    }

    let mut values = Vec::new();
    for element in elements.iter().flatten() {
        if !rules.enumerated_values.iter().any(|allowed| allowed == element) {
            return Err(Rejection::invalid_type(format!(
                "Invalid parameter value, '{}', for {}. Value must be one of: {}",
                element,
                rules.key,
                rules.enumerated_values.join(",  ")
            )));
        }
        values.push(element.clone());
    }
    Ok(emit(values))
}

fn coerce_string(
    rules: &FieldRules,
    elements: &[Option<String>],
) -> Result<Option<CanonicalValue>, Rejection> {
    let validator = compile_validator(rules)?;
    let mut values = Vec::new();
    for element in elements.iter().flatten() {
        check_validator(rules, validator.as_ref(), element)?;
        values.push(element.clone());
    }
    Ok(emit(values))
}

fn compile_validator(rules: &FieldRules) -> Result<Option<Regex>, Rejection> {
    let Some(pattern) = rules.validator.filter(|p| !p.is_empty()) else {
        return Ok(None);
    };
    Regex::new(pattern).map(Some).map_err(|_| {
        Rejection::invalid_type(format!(
            "Unable to validate {}. The validator {} is not a valid expression.",
            rules.key, pattern
        ))
    })
}

/// Validators match anywhere in the value unless anchored
fn check_validator(rules: &FieldRules, validator: Option<&Regex>, value: &str) -> Result<(), Rejection> {
    match validator {
        Some(regex) if !regex.is_match(value) => Err(Rejection::invalid_type(format!(
            "Invalid value for {}. Value '{}' must match the regular expression {}",
            rules.key,
            value,
            regex.as_str()
        ))),
        _ => Ok(()),
    }
}

fn emit(values: Vec<String>) -> Option<CanonicalValue> {
    if values.is_empty() {
        None
    } else {
        Some(CanonicalValue::List(values))
    }
}
