use std::fmt;
use std::sync::OnceLock;

use log::debug;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Rejection;
use crate::queue::is_unlimited_memory;
use crate::software::Application;
use crate::system::{BatchQueue, RunTime, UNLIMITED, UNLIMITED_MEMORY};

/// Resource fields as the caller sent them
///
/// Counts may be integers or integer strings. Memory may be a number of GB or a string such as
/// `512MB` or `1.5TB`. Run time is `HH:MM:SS`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedResources {
    pub node_count: Option<Value>,
    pub processors_per_node: Option<Value>,
    pub memory_per_node: Option<Value>,
    pub max_run_time: Option<Value>,
}

/// A complete resource request, every dimension present
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ResourceRequest {
    pub node_count: i64,
    pub processors_per_node: i64,
    /// GB
    pub memory_per_node: f64,
    pub max_run_time: RunTime,
}

impl fmt::Display for ResourceRequest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "nodes={} processors={} memory={}GB time={}",
            self.node_count, self.processors_per_node, self.memory_per_node, self.max_run_time
        )
    }
}

impl ResourceRequest {
    /// Back-fill missing dimensions: caller value, then application default, then one node of
    /// one processor with unlimited memory and time
    pub fn resolve(requested: &RequestedResources, app: &Application) -> Result<ResourceRequest, Rejection> {
        let node_count = parse_count("nodeCount", requested.node_count.as_ref())?
            .or(app.default_node_count)
            .unwrap_or(1);
        let processors_per_node = parse_count("processorsPerNode", requested.processors_per_node.as_ref())?
            .or(app.default_processors_per_node)
            .unwrap_or(1);
        let memory_per_node = parse_memory("memoryPerNode", requested.memory_per_node.as_ref())?
            .or(app.default_memory_per_node)
            .unwrap_or(UNLIMITED_MEMORY);

        let default_run_time = app
            .default_max_run_time
            .as_deref()
            .map(|time| parse_run_time_str("defaultMaxRunTime", time))
            .transpose()?;
        let max_run_time = parse_run_time("maxRunTime", requested.max_run_time.as_ref())?
            .or(default_run_time)
            .unwrap_or(RunTime::Unbounded);

        let resolved = ResourceRequest { node_count, processors_per_node, memory_per_node, max_run_time };
        debug!("Resolved resource request {resolved}");
        Ok(resolved)
    }

    /// Replace unlimited dimensions with the selected queue's own limits
    pub fn settle(&self, queue: &BatchQueue) -> ResourceRequest {
        ResourceRequest {
            node_count: if self.node_count == UNLIMITED { queue.max_nodes } else { self.node_count },
            processors_per_node: if self.processors_per_node == UNLIMITED {
                queue.max_processors_per_node
            } else {
                self.processors_per_node
            },
            memory_per_node: if is_unlimited_memory(self.memory_per_node) {
                queue.max_memory_per_node
            } else {
                self.memory_per_node
            },
            max_run_time: match self.max_run_time {
                RunTime::Unbounded => queue.max_requested_time,
                bounded => bounded,
            },
        }
    }
}

fn malformed(field: &str, value: &Value, expected: &str) -> Rejection {
    Rejection::malformed(format!("Invalid {field} value {value}. {expected}"))
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

/// A positive integer or the unlimited sentinel
pub fn parse_count(field: &str, value: Option<&Value>) -> Result<Option<i64>, Rejection> {
    if is_blank(value) {
        return Ok(None);
    }
    let Some(value) = value else { return Ok(None) };

    let count = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match count {
        Some(n) if n > 0 || n == UNLIMITED => Ok(Some(n)),
        _ => Err(malformed(field, value, "Please specify a positive integer value.")),
    }
}

fn memory_pattern() -> &'static Regex {
    static MEMORY: OnceLock<Regex> = OnceLock::new();
    MEMORY.get_or_init(|| {
        Regex::new(r"(?i)^(\d+(?:\.\d+)?|\.\d+)\s*([MGTPE])B$").expect("memory pattern compiles")
    })
}

fn gigabytes(unit: &str) -> f64 {
    match unit.to_ascii_uppercase().as_str() {
        "M" => 1.0 / 1024.0,
        "T" => 1024.0,
        "P" => 1024.0 * 1024.0,
        "E" => 1024.0 * 1024.0 * 1024.0,
        _ => 1.0,
    }
}

/// Memory in GB, from a number or a `###.#[MGTPE]B` string
pub fn parse_memory(field: &str, value: Option<&Value>) -> Result<Option<f64>, Rejection> {
    if is_blank(value) {
        return Ok(None);
    }
    let Some(value) = value else { return Ok(None) };
    let expected = "Please specify a positive number of GB or a value such as 512MB, 4GB or 1.5TB.";

    let memory = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            match memory_pattern().captures(s) {
                Some(captures) => captures[1]
                    .parse::<f64>()
                    .ok()
                    .map(|amount| amount * gigabytes(&captures[2])),
                None => s.parse::<f64>().ok(),
            }
        }
        _ => None,
    };
    match memory {
        Some(m) if is_unlimited_memory(m) => Ok(Some(UNLIMITED_MEMORY)),
        Some(m) if m > 0.0 && m.is_finite() => Ok(Some(m)),
        _ => Err(malformed(field, value, expected)),
    }
}

fn parse_run_time_str(field: &str, time: &str) -> Result<RunTime, Rejection> {
    match time.parse::<RunTime>() {
        Ok(time) if !time.is_zero() => Ok(time),
        _ => Err(Rejection::malformed(format!(
            "Invalid {field} value {time}. Please specify a positive run time as HH:MM:SS."
        ))),
    }
}

/// Run time as `HH:MM:SS`
pub fn parse_run_time(field: &str, value: Option<&Value>) -> Result<Option<RunTime>, Rejection> {
    match value {
        _ if is_blank(value) => Ok(None),
        Some(Value::String(s)) => parse_run_time_str(field, s).map(Some),
        Some(Value::Number(n)) if n.as_i64() == Some(UNLIMITED) => Ok(Some(RunTime::Unbounded)),
        Some(other) => Err(malformed(field, other, "Please specify a run time as HH:MM:SS.")),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RejectionKind;
    use serde_json::json;

    fn app(defaults: Value) -> Application {
        let mut app = json!({ "id": "wc-1.0", "executionSystem": "hpc" });
        app.as_object_mut().unwrap().extend(defaults.as_object().cloned().unwrap());
        serde_json::from_value(app).unwrap()
    }

    fn requested(json: Value) -> RequestedResources {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("nodeCount", Some(&json!(4))).unwrap(), Some(4));
        assert_eq!(parse_count("nodeCount", Some(&json!(" 4 "))).unwrap(), Some(4));
        assert_eq!(parse_count("nodeCount", Some(&json!(-1))).unwrap(), Some(UNLIMITED));
        assert_eq!(parse_count("nodeCount", Some(&json!(""))).unwrap(), None);
        assert_eq!(parse_count("nodeCount", None).unwrap(), None);
        for bad in [json!(0), json!(-2), json!(1.5), json!("four"), json!(true)] {
            let err = parse_count("nodeCount", Some(&bad)).unwrap_err();
            assert_eq!(err.kind(), RejectionKind::MalformedRequest, "{bad}");
        }
    }

    #[test]
    fn test_parse_memory_units() {
        assert_eq!(parse_memory("m", Some(&json!(4))).unwrap(), Some(4.0));
        assert_eq!(parse_memory("m", Some(&json!("4GB"))).unwrap(), Some(4.0));
        assert_eq!(parse_memory("m", Some(&json!("512MB"))).unwrap(), Some(0.5));
        assert_eq!(parse_memory("m", Some(&json!("1.5tb"))).unwrap(), Some(1536.0));
        assert_eq!(parse_memory("m", Some(&json!("1PB"))).unwrap(), Some(1024.0 * 1024.0));
        assert_eq!(parse_memory("m", Some(&json!("2.5"))).unwrap(), Some(2.5));
        assert_eq!(parse_memory("m", Some(&json!(-1))).unwrap(), Some(UNLIMITED_MEMORY));
        for bad in [json!("4XB"), json!("0GB"), json!(0), json!(-3.0), json!([1])] {
            assert!(parse_memory("m", Some(&bad)).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_parse_run_time() {
        assert_eq!(
            parse_run_time("t", Some(&json!("02:00:00"))).unwrap(),
            Some(RunTime::from_secs(7200))
        );
        assert_eq!(parse_run_time("t", Some(&json!(null))).unwrap(), None);
        assert!(parse_run_time("t", Some(&json!("00:00:00"))).is_err());
        assert!(parse_run_time("t", Some(&json!("2h"))).is_err());
        assert!(parse_run_time("t", Some(&json!(7200))).is_err());
    }

    #[test]
    fn test_caller_value_wins_over_app_default() {
        let app = app(json!({ "defaultNodeCount": 4, "defaultMaxRunTime": "01:00:00" }));
        let resolved =
            ResourceRequest::resolve(&requested(json!({ "nodeCount": 2, "maxRunTime": "00:10:00" })), &app)
                .unwrap();
        assert_eq!(resolved.node_count, 2);
        assert_eq!(resolved.max_run_time, RunTime::from_secs(600));
    }

    #[test]
    fn test_back_fill_from_app_then_fallback() {
        let app = app(json!({ "defaultProcessorsPerNode": 16, "defaultMemoryPerNode": 32.0 }));
        let resolved = ResourceRequest::resolve(&RequestedResources::default(), &app).unwrap();
        assert_eq!(
            resolved,
            ResourceRequest {
                node_count: 1,
                processors_per_node: 16,
                memory_per_node: 32.0,
                max_run_time: RunTime::Unbounded,
            }
        );
    }

    #[test]
    fn test_settle_records_queue_limits() {
        let queue: BatchQueue = serde_json::from_value(json!({
            "name": "normal", "maxMemoryPerNode": 64.0, "maxRequestedTime": "48:00:00"
        }))
        .unwrap();
        let request = ResourceRequest {
            node_count: 2,
            processors_per_node: 1,
            memory_per_node: UNLIMITED_MEMORY,
            max_run_time: RunTime::Unbounded,
        };

        let settled = request.settle(&queue);
        assert_eq!(settled.node_count, 2);
        assert_eq!(settled.memory_per_node, 64.0);
        assert_eq!(settled.max_run_time, RunTime::from_secs(48 * 3600));
    }
}
