//! Execution and storage systems, and the batch queues an execution system owns

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sentinel used by node, processor and memory limits for "no limit"
pub const UNLIMITED: i64 = -1;

/// Memory counterpart of [UNLIMITED], in GB
pub const UNLIMITED_MEMORY: f64 = UNLIMITED as f64;

/// A requested or maximum run time
///
/// Written as `HH:MM:SS` (hours unbounded, minutes and seconds 0-59) or `unbounded`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum RunTime {
    Bounded(u64),
    Unbounded,
}

impl RunTime {
    pub fn from_secs(secs: u64) -> RunTime {
        RunTime::Bounded(secs)
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, RunTime::Bounded(0))
    }

    /// true if `self` is no longer than `limit`
    pub fn fits_within(&self, limit: &RunTime) -> bool {
        match (self, limit) {
            (_, RunTime::Unbounded) => true,
            (RunTime::Unbounded, RunTime::Bounded(_)) => false,
            (RunTime::Bounded(requested), RunTime::Bounded(max)) => requested <= max,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid run time '{0}', expected HH:MM:SS")]
pub struct RunTimeError(String);

impl FromStr for RunTime {
    type Err = RunTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("unbounded") || trimmed == "-1" {
            return Ok(RunTime::Unbounded);
        }

        let fields: Vec<&str> = trimmed.split(':').collect();
        let [hours, minutes, seconds] = fields.as_slice() else {
            return Err(RunTimeError(s.to_string()));
        };
        let parse = |field: &str, max: Option<u64>| -> Result<u64, RunTimeError> {
            if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
                return Err(RunTimeError(s.to_string()));
            }
            let value: u64 = field.parse().map_err(|_| RunTimeError(s.to_string()))?;
            match max {
                Some(max) if value > max => Err(RunTimeError(s.to_string())),
                _ => Ok(value),
            }
        };
        let hours = parse(*hours, None)?;
        let minutes = parse(*minutes, Some(59))?;
        let seconds = parse(*seconds, Some(59))?;

        hours
            .checked_mul(3600)
            .and_then(|secs| secs.checked_add(minutes * 60 + seconds))
            .map(RunTime::Bounded)
            .ok_or_else(|| RunTimeError(s.to_string()))
    }
}

impl TryFrom<String> for RunTime {
    type Error = RunTimeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for RunTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RunTime::Unbounded => write!(f, "unbounded"),
            RunTime::Bounded(secs) => {
                write!(f, "{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
            }
        }
    }
}

impl From<RunTime> for String {
    fn from(value: RunTime) -> Self {
        value.to_string()
    }
}

fn unlimited() -> i64 {
    UNLIMITED
}

fn unlimited_memory() -> f64 {
    UNLIMITED_MEMORY
}

fn unbounded() -> RunTime {
    RunTime::Unbounded
}

/// A resource-defined compute allocation class
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchQueue {
    pub name: String,
    #[serde(default = "unlimited")]
    pub max_nodes: i64,
    #[serde(default = "unlimited")]
    pub max_processors_per_node: i64,
    /// GB
    #[serde(default = "unlimited_memory")]
    pub max_memory_per_node: f64,
    #[serde(default = "unbounded")]
    pub max_requested_time: RunTime,
    #[serde(default)]
    pub is_system_default: bool,
}

/// A compute resource. Queue order is significant and fixed at admission time.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSystem {
    pub id: String,
    #[serde(default)]
    pub queues: Vec<BatchQueue>,
    pub scratch_dir: Option<String>,
    pub work_dir: Option<String>,
}

impl ExecutionSystem {
    pub fn queue(&self, name: &str) -> Option<&BatchQueue> {
        self.queues.iter().find(|queue| queue.name == name)
    }

    pub fn default_queue(&self) -> Option<&BatchQueue> {
        self.queues.iter().find(|queue| queue.is_system_default)
    }
}

/// A storage resource that `agave://` input references may point at
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSystem {
    pub id: String,
    #[serde(default)]
    pub default: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_run_time_parse() {
        assert_eq!("01:00:00".parse::<RunTime>(), Ok(RunTime::Bounded(3600)));
        assert_eq!("120:30:05".parse::<RunTime>(), Ok(RunTime::Bounded(120 * 3600 + 30 * 60 + 5)));
        assert_eq!("Unbounded".parse::<RunTime>(), Ok(RunTime::Unbounded));
        assert!("1:60:00".parse::<RunTime>().is_err());
        assert!("01:00".parse::<RunTime>().is_err());
        assert!("aa:00:00".parse::<RunTime>().is_err());
        assert!("".parse::<RunTime>().is_err());
    }

    #[test]
    fn test_run_time_overflow_is_an_error() {
        assert!("5124095576030432:00:00".parse::<RunTime>().is_err());
        assert!("99999999999999999999:00:00".parse::<RunTime>().is_err());
        assert_eq!("5124095576030:00:00".parse::<RunTime>(), Ok(RunTime::Bounded(5124095576030 * 3600)));
    }

    #[test]
    fn test_run_time_display_round_trips() {
        let time = RunTime::from_secs(2 * 3600 + 5);
        assert_eq!(time.to_string(), "02:00:05");
        assert_eq!(RunTime::Unbounded.to_string(), "unbounded");
    }

    #[test]
    fn test_run_time_fits_within() {
        let hour = RunTime::from_secs(3600);
        let day = RunTime::from_secs(86400);
        assert!(hour.fits_within(&day));
        assert!(day.fits_within(&day));
        assert!(!day.fits_within(&hour));
        assert!(day.fits_within(&RunTime::Unbounded));
        assert!(!RunTime::Unbounded.fits_within(&day));
    }

    #[test]
    fn test_queue_defaults_are_unlimited() {
        let queue: BatchQueue = serde_json::from_value(json!({ "name": "normal" })).unwrap();
        assert_eq!(queue.max_nodes, UNLIMITED);
        assert_eq!(queue.max_processors_per_node, UNLIMITED);
        assert_eq!(queue.max_memory_per_node, UNLIMITED_MEMORY);
        assert_eq!(queue.max_requested_time, RunTime::Unbounded);
        assert!(!queue.is_system_default);
    }

    #[test]
    fn test_execution_system_queue_lookup() {
        let system: ExecutionSystem = serde_json::from_value(json!({
            "id": "hpc",
            "queues": [
                { "name": "debug", "maxNodes": 1, "maxRequestedTime": "00:30:00" },
                { "name": "normal", "isSystemDefault": true }
            ]
        }))
        .unwrap();

        assert_eq!(system.queue("debug").map(|q| q.max_nodes), Some(1));
        assert!(system.queue("missing").is_none());
        assert_eq!(system.default_queue().map(|q| q.name.as_str()), Some("normal"));
    }
}
