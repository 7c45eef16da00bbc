use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::queue::resource::RequestedResources;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub name: String,
    pub app_id: String,
    /// Must match the application's execution system when given
    pub execution_system: Option<String>,
    pub batch_queue: Option<String>,
    #[serde(flatten)]
    pub resources: RequestedResources,
    /// Defaults to true
    pub archive: Option<bool>,
    pub archive_path: Option<String>,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub inputs: Map<String, Value>,
    #[serde(default)]
    pub notifications: Value,
}
