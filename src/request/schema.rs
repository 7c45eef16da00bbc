use anyhow::{anyhow, Context, Result};
use jsonschema::JSONSchema;
use log::{info, warn};
use serde_json::Value;

use crate::error::Rejection;

static SCHEMA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/schema/job_request.json"));

pub struct RequestSchema {
    compiled: JSONSchema,
}

impl RequestSchema {
    pub fn load() -> Result<RequestSchema> {
        let schema: Value = serde_json::from_str(SCHEMA).context("Parsing job request schema")?;
        let compiled = JSONSchema::compile(&schema).map_err(|err| anyhow!("Invalid job request schema: {err}"))?;
        Ok(RequestSchema { compiled })
    }

    /// Reject raw request JSON that doesn't match the wire shape
    pub fn check(&self, json: &Value) -> Result<(), Rejection> {
        info!("Validating raw job request against JSON schema");
        self.compiled.validate(json).map_err(|errors| {
            let reasons: Vec<String> = errors
                .map(|err| match err.instance_path.to_string() {
                    path if path.is_empty() => err.to_string(),
                    path => format!("{path}: {err}"),
                })
                .collect();
            warn!("Job request fails validation: {}", reasons.join("; "));
            Rejection::malformed(format!("Invalid job request. {}", reasons.join("; ")))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RejectionKind;
    use serde_json::json;

    fn check(json: Value) -> Result<(), Rejection> {
        RequestSchema::load().unwrap().check(&json)
    }

    #[test]
    fn test_valid_requests() {
        assert!(check(json!({ "name": "wc", "appId": "wc-1.0" })).is_ok());
        assert!(check(json!({
            "name": "wc", "appId": "wc-1.0", "nodeCount": "2", "memoryPerNode": 1.5,
            "notifications": "user@example.com", "parameters": {}, "archive": true
        }))
        .is_ok());
    }

    #[test]
    fn test_oversize_and_wrong_types_are_malformed() {
        let long_name = "x".repeat(65);
        for bad in [
            json!({ "appId": "wc-1.0" }),
            json!({ "name": long_name, "appId": "wc-1.0" }),
            json!({ "name": "wc", "appId": "wc" }),
            json!({ "name": "wc", "appId": "wc-" }),
            json!({ "name": "wc", "appId": format!("wc-{}", "1".repeat(80)) }),
            json!({ "name": "wc", "appId": "wc-1.0", "archive": "yes" }),
            json!({ "name": "wc", "appId": "wc-1.0", "nodeCount": 1.5 }),
            json!({ "name": "wc", "appId": "wc-1.0", "parameters": [] }),
            json!({ "name": "wc", "appId": "wc-1.0", "archivePath": "p".repeat(256) }),
            json!({ "name": "wc", "appId": "wc-1.0", "notifications": 7 }),
            json!(["not", "an", "object"]),
        ] {
            let err = check(bad.clone()).unwrap_err();
            assert_eq!(err.kind(), RejectionKind::MalformedRequest, "{bad}");
        }
    }
}
