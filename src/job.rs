//! Canonical jobs and their status lifecycle
//!
//! Job statuses: PENDING → QUEUED → RUNNING → {FINISHED | FAILED | STOPPED}
//! with PAUSED reachable from, and returning to, QUEUED or RUNNING

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::normalize::input::Inputs;
use crate::normalize::parameter::Parameters;
use crate::system::RunTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Admitted, not yet handed to a scheduler
    Pending,
    Queued,
    Running,
    Paused,
    Finished,
    Failed,
    Stopped,
}

impl JobStatus {
    pub const ALL: [JobStatus; 7] = [
        JobStatus::Pending,
        JobStatus::Queued,
        JobStatus::Running,
        JobStatus::Paused,
        JobStatus::Finished,
        JobStatus::Failed,
        JobStatus::Stopped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Queued => "QUEUED",
            JobStatus::Running => "RUNNING",
            JobStatus::Paused => "PAUSED",
            JobStatus::Finished => "FINISHED",
            JobStatus::Failed => "FAILED",
            JobStatus::Stopped => "STOPPED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed | JobStatus::Stopped)
    }

    pub fn can_transition_to(&self, target: JobStatus) -> bool {
        match (self, target) {
            (JobStatus::Pending, JobStatus::Queued) => true,

            (JobStatus::Queued, JobStatus::Running) => true,
            (JobStatus::Queued, JobStatus::Paused) => true,

            (JobStatus::Running, JobStatus::Finished) => true,
            (JobStatus::Running, JobStatus::Failed) => true,
            (JobStatus::Running, JobStatus::Stopped) => true,
            (JobStatus::Running, JobStatus::Paused) => true,

            (JobStatus::Paused, JobStatus::Queued) => true,
            (JobStatus::Paused, JobStatus::Running) => true,

            _ => false,
        }
    }

    /// Name of the event fired when a job enters this status
    pub fn event_name(&self) -> &'static str {
        match self {
            JobStatus::Pending => "JOB_CREATED",
            JobStatus::Queued => "JOB_QUEUED",
            JobStatus::Running => "JOB_RUNNING",
            JobStatus::Paused => "JOB_PAUSED",
            JobStatus::Finished => "JOB_FINISHED",
            JobStatus::Failed => "JOB_FAILED",
            JobStatus::Stopped => "JOB_STOPPED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job status '{0}'")]
pub struct UnknownStatus(String);

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobStateError {
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Job is in terminal status {0}")]
    TerminalStatus(JobStatus),
}

/// An admitted job request, ready to persist
///
/// Status is the only field that changes after admission, and only through [NormalizedJob::transition].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedJob {
    pub uuid: Uuid,
    pub name: String,
    pub owner: String,
    pub app_id: String,
    pub execution_system: String,
    pub batch_queue: String,
    pub node_count: i64,
    pub processors_per_node: i64,
    /// GB
    pub memory_per_node: f64,
    pub max_run_time: RunTime,
    pub parameters: Parameters,
    pub inputs: Inputs,
    pub archive: bool,
    pub archive_path: Option<String>,
    pub status: JobStatus,
    pub created: DateTime<Utc>,
}

impl NormalizedJob {
    pub fn transition(&mut self, to: JobStatus) -> Result<(), JobStateError> {
        if self.status.is_terminal() {
            return Err(JobStateError::TerminalStatus(self.status));
        }
        if !self.status.can_transition_to(to) {
            return Err(JobStateError::InvalidTransition { from: self.status, to });
        }
        self.status = to;
        Ok(())
    }
}
