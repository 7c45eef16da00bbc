//! Admitted job storage and status updates
//!
//! A job row is written together with its notification subscriptions, or not at all. After that
//! the status is the only thing that changes, and every change runs the event dispatcher.

use chrono::Utc;
use log::info;
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::open::atomically;
use crate::error::AdmissionError;
use crate::event::{Dispatcher, JobEvent};
use crate::job::{JobStateError, JobStatus, NormalizedJob};
use crate::notification::{register_notifications, NotificationSubscription};

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("No job {0}")]
    NotFound(Uuid),

    #[error(transparent)]
    Transition(#[from] JobStateError),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Store a newly admitted job and all of its subscriptions in one save point
pub fn save_admitted(
    conn: &Connection,
    job: &NormalizedJob,
    subscriptions: &[NotificationSubscription],
) -> Result<(), AdmissionError> {
    atomically(conn, "admission", |conn| -> Result<(), AdmissionError> {
        info!("Adding job {} to db", job.uuid);
        let manifest = serde_json::to_string(job)?;
        let created = job.created.to_rfc3339();
        conn.execute(
            "INSERT INTO job (uuid, name, owner, app_id, execution_system, batch_queue, status, manifest, created, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            (
                job.uuid.to_string(),
                &job.name,
                &job.owner,
                &job.app_id,
                &job.execution_system,
                &job.batch_queue,
                job.status.as_str(),
                manifest,
                created,
            ),
        )?;
        register_notifications(conn, subscriptions)?;
        Ok(())
    })
}

pub fn load(conn: &Connection, uuid: Uuid) -> Result<NormalizedJob, JobError> {
    let manifest: Option<String> = conn
        .query_row("SELECT manifest FROM job WHERE uuid = ?1", [uuid.to_string()], |row| row.get(0))
        .optional()?;
    let manifest = manifest.ok_or(JobError::NotFound(uuid))?;
    Ok(serde_json::from_str(&manifest)?)
}

/// Move a stored job to a new status and dispatch the matching events
pub fn update_status(
    conn: &Connection,
    uuid: Uuid,
    to: JobStatus,
    dispatcher: &Dispatcher,
) -> Result<(NormalizedJob, Vec<JobEvent>), JobError> {
    let mut job = load(conn, uuid)?;
    let from = job.status;
    job.transition(to)?;

    info!("Updating {uuid} with status {from} -> {to}");
    let manifest = serde_json::to_string(&job)?;
    let events = Dispatcher::events(&job)?;
    conn.execute(
        "UPDATE job SET status = ?1, manifest = ?2, last_updated = ?3 WHERE uuid = ?4",
        (to.as_str(), manifest, Utc::now().to_rfc3339(), uuid.to_string()),
    )?;

    dispatcher.emit(&events);
    Ok((job, events))
}
