use log::debug;
use rusqlite::Connection;
use uuid::Uuid;

use crate::event::{EventSink, JobEvent};

/// Records dispatched events in the `job_event` table for the delivery service to pick up
pub struct EventOutbox<'c> {
    conn: &'c Connection,
}

impl<'c> EventOutbox<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        EventOutbox { conn }
    }
}

impl EventSink for EventOutbox<'_> {
    fn emit(&self, event: &JobEvent) -> anyhow::Result<()> {
        let job_uuid = event.job["uuid"].as_str().unwrap_or_default();
        debug!("Recording {} {} for job {job_uuid}", event.scope, event.name);
        self.conn.execute(
            "INSERT INTO job_event (job_uuid, scope, scope_id, event, payload, created)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            (
                job_uuid,
                event.scope.kind(),
                event.scope.id(),
                event.name,
                serde_json::to_string(&event.job)?,
                event.created.to_rfc3339(),
            ),
        )?;
        Ok(())
    }
}

/// A recorded event, as stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxEntry {
    pub scope: String,
    pub scope_id: String,
    pub event: String,
}

/// Events recorded for a job, oldest first
pub fn load_events(conn: &Connection, job_uuid: Uuid) -> rusqlite::Result<Vec<OutboxEntry>> {
    let mut stmt = conn.prepare("SELECT scope, scope_id, event FROM job_event WHERE job_uuid = ?1 ORDER BY id")?;
    let rows = stmt.query_map([job_uuid.to_string()], |row| {
        Ok(OutboxEntry { scope: row.get(0)?, scope_id: row.get(1)?, event: row.get(2)? })
    })?;
    rows.collect()
}
