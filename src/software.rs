//! Application schema: the declared parameters, inputs and resource defaults of an app
//!
//! Schemas are data. Each parameter carries one of five value types and the coercion rules for
//! each type live in [crate::coerce].

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Bool,
    Flag,
    Enumeration,
}

impl ParameterType {
    /// bool and flag collapse to a single boolean instead of a list of strings
    pub fn is_boolean(&self) -> bool {
        matches!(self, ParameterType::Bool | ParameterType::Flag)
    }
}

fn visible() -> bool {
    true
}

fn max_one() -> i64 {
    1
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSpec {
    pub key: String,
    #[serde(rename = "type")]
    pub value_type: ParameterType,
    #[serde(default)]
    pub required: bool,
    #[serde(default = "visible")]
    pub visible: bool,
    #[serde(default)]
    pub min_cardinality: i64,
    /// -1 is unbounded
    #[serde(default = "max_one")]
    pub max_cardinality: i64,
    #[serde(default)]
    pub default_value: Value,
    pub validator: Option<String>,
    /// Ordered set, enumeration parameters only
    #[serde(default)]
    pub enumerated_values: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSpec {
    pub key: String,
    /// URI or path, or a list of them
    #[serde(default)]
    pub default_value: Value,
    #[serde(default)]
    pub required: bool,
    #[serde(default = "visible")]
    pub visible: bool,
    #[serde(default)]
    pub min_cardinality: i64,
    #[serde(default = "max_one")]
    pub max_cardinality: i64,
    pub validator: Option<String>,
}

/// Cardinality and validation rules shared by parameters and inputs
///
/// Inputs are coerced like string parameters, so both specs are viewed through this struct by
/// the coercer.
#[derive(Clone, Debug)]
pub struct FieldRules<'a> {
    pub key: &'a str,
    pub value_type: ParameterType,
    pub min_cardinality: i64,
    pub max_cardinality: i64,
    pub validator: Option<&'a str>,
    pub enumerated_values: &'a [String],
}

impl ParameterSpec {
    pub fn rules(&self) -> FieldRules<'_> {
        FieldRules {
            key: &self.key,
            value_type: self.value_type,
            min_cardinality: self.min_cardinality,
            max_cardinality: self.max_cardinality,
            validator: self.validator.as_deref(),
            enumerated_values: &self.enumerated_values,
        }
    }
}

impl InputSpec {
    pub fn rules(&self) -> FieldRules<'_> {
        FieldRules {
            key: &self.key,
            value_type: ParameterType::String,
            min_cardinality: self.min_cardinality,
            max_cardinality: self.max_cardinality,
            validator: self.validator.as_deref(),
            enumerated_values: &[],
        }
    }
}

/// An invokable application and the execution system it runs on
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    /// Unique id, `<name>-<version>`
    pub id: String,
    pub execution_system: String,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    #[serde(default)]
    pub inputs: Vec<InputSpec>,
    pub default_queue: Option<String>,
    pub default_node_count: Option<i64>,
    pub default_processors_per_node: Option<i64>,
    pub default_memory_per_node: Option<f64>,
    pub default_max_run_time: Option<String>,
}

impl Application {
    pub fn is_input(&self, key: &str) -> bool {
        self.inputs.iter().any(|input| input.key == key)
    }
}
