use log::{debug, info};
use serde_json::{Map, Value};
use url::form_urlencoded;

use crate::catalog::Catalog;
use crate::coerce::{parse_truthy, LIST_DELIMITER};

/// Map a form field to its request field, accepting the legacy spellings
fn reserved(key: &str) -> Option<&'static str> {
    match key {
        "name" | "jobName" => Some("name"),
        "appId" | "softwareName" => Some("appId"),
        "executionSystem" => Some("executionSystem"),
        "batchQueue" | "queue" => Some("batchQueue"),
        "nodeCount" => Some("nodeCount"),
        "processorsPerNode" | "processorCount" => Some("processorsPerNode"),
        "memoryPerNode" | "maxMemory" => Some("memoryPerNode"),
        "maxRunTime" | "requestedTime" => Some("maxRunTime"),
        "archive" => Some("archive"),
        "archivePath" => Some("archivePath"),
        "notifications" | "callbackUrl" => Some("notifications"),
        _ => None,
    }
}

/// Turn a flat form body into request JSON
///
/// Form fields can't nest, so any field that isn't a request field is an application input if
/// the named application declares it as one, and a parameter otherwise. A repeated field is
/// joined into one `;`-delimited value. The result still has to pass the request schema.
pub fn parse_form<C: Catalog + ?Sized>(body: &str, catalog: &C) -> Value {
    let pairs: Vec<(String, String)> = form_urlencoded::parse(body.as_bytes()).into_owned().collect();
    info!("Parsing form submission with {} fields", pairs.len());

    let app = pairs
        .iter()
        .find(|(key, _)| reserved(key) == Some("appId"))
        .and_then(|(_, app_id)| catalog.application(app_id.trim()));

    let mut request = Map::new();
    let mut parameters = Map::new();
    let mut inputs = Map::new();

    for (key, value) in pairs {
        match reserved(&key) {
            Some("archive") => {
                let archive = parse_truthy(&value).map(Value::Bool).unwrap_or(Value::String(value));
                request.insert("archive".to_string(), archive);
            }
            Some(field) => {
                request.insert(field.to_string(), Value::String(value));
            }
            None => {
                let target = match app {
                    Some(app) if app.is_input(&key) => &mut inputs,
                    _ => &mut parameters,
                };
                append(target, key, value);
            }
        }
    }

    debug!("Form fields: {} parameters, {} inputs", parameters.len(), inputs.len());
    request.insert("parameters".to_string(), Value::Object(parameters));
    request.insert("inputs".to_string(), Value::Object(inputs));
    Value::Object(request)
}

fn append(target: &mut Map<String, Value>, key: String, value: String) {
    match target.get_mut(&key) {
        Some(Value::String(existing)) => {
            existing.push(LIST_DELIMITER);
            existing.push_str(&value);
        }
        _ => {
            target.insert(key, Value::String(value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use serde_json::json;

    fn catalog() -> StaticCatalog {
        serde_json::from_value(json!({
            "applications": [{
                "id": "wc-1.0",
                "executionSystem": "hpc",
                "parameters": [{ "key": "threads", "type": "number" }],
                "inputs": [{ "key": "reads" }]
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_routes_inputs_and_parameters() {
        let form = parse_form("name=wc&appId=wc-1.0&reads=a.fq;b.fq&threads=4&extra=x", &catalog());
        assert_eq!(form["name"], "wc");
        assert_eq!(form["inputs"], json!({ "reads": "a.fq;b.fq" }));
        assert_eq!(form["parameters"], json!({ "threads": "4", "extra": "x" }));
    }

    #[test]
    fn test_legacy_aliases_and_archive() {
        let form = parse_form(
            "name=wc&appId=wc-1.0&queue=debug&maxMemory=4GB&requestedTime=01%3A00%3A00&processorCount=8&archive=off",
            &catalog(),
        );
        assert_eq!(form["batchQueue"], "debug");
        assert_eq!(form["memoryPerNode"], "4GB");
        assert_eq!(form["maxRunTime"], "01:00:00");
        assert_eq!(form["processorsPerNode"], "8");
        assert_eq!(form["archive"], false);
    }

    #[test]
    fn test_callback_url_and_repeated_fields() {
        let form = parse_form("appId=wc-1.0&callbackUrl=user%40example.com&reads=a.fq&reads=b.fq", &catalog());
        assert_eq!(form["notifications"], "user@example.com");
        assert_eq!(form["inputs"]["reads"], "a.fq;b.fq");
    }

    #[test]
    fn test_unknown_app_sends_everything_to_parameters() {
        let form = parse_form("appId=other-1.0&reads=a.fq", &catalog());
        assert_eq!(form["parameters"], json!({ "reads": "a.fq" }));
        assert_eq!(form["inputs"], json!({}));
    }
}
