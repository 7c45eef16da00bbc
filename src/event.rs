//! Job lifecycle events
//!
//! Every status change produces one event scoped to the job's execution system. A newly created
//! job also produces one event scoped to its application, so application owners hear about a job
//! once, not on every later transition. Delivery is someone else's problem: sinks only record or
//! forward events.

use std::fmt;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use serde_json::Value;

use crate::job::{JobStatus, NormalizedJob};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EventScope {
    ExecutionSystem(String),
    Application(String),
}

impl EventScope {
    pub fn kind(&self) -> &'static str {
        match self {
            EventScope::ExecutionSystem(_) => "execution_system",
            EventScope::Application(_) => "application",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            EventScope::ExecutionSystem(id) | EventScope::Application(id) => id,
        }
    }
}

impl fmt::Display for EventScope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobEvent {
    pub scope: EventScope,
    pub name: &'static str,
    /// Serialised job at the time of the event
    pub job: Value,
    pub created: DateTime<Utc>,
}

/// Receives dispatched events
pub trait EventSink {
    fn emit(&self, event: &JobEvent) -> anyhow::Result<()>;
}

/// Writes every event to the log
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: &JobEvent) -> anyhow::Result<()> {
        info!("{} {} for job {}", event.scope, event.name, event.job["uuid"]);
        Ok(())
    }
}

/// Fans events out to every registered sink, in registration order
#[derive(Default)]
pub struct Dispatcher<'a> {
    sinks: Vec<Box<dyn EventSink + 'a>>,
}

impl<'a> Dispatcher<'a> {
    pub fn new() -> Self {
        Dispatcher { sinks: Vec::new() }
    }

    pub fn register(&mut self, sink: impl EventSink + 'a) {
        self.sinks.push(Box::new(sink));
    }

    /// Build the events for the job's current status
    pub fn events(job: &NormalizedJob) -> Result<Vec<JobEvent>, serde_json::Error> {
        let state = serde_json::to_value(job)?;
        let name = job.status.event_name();
        let created = Utc::now();

        let mut events = vec![JobEvent {
            scope: EventScope::ExecutionSystem(job.execution_system.clone()),
            name,
            job: state.clone(),
            created,
        }];
        if job.status == JobStatus::Pending {
            events.push(JobEvent {
                scope: EventScope::Application(job.app_id.clone()),
                name,
                job: state,
                created,
            });
        }
        Ok(events)
    }

    /// Send already built events to every sink
    ///
    /// A failing sink is logged and skipped, it never fails the status change that triggered it.
    pub fn emit(&self, events: &[JobEvent]) {
        for event in events {
            for sink in &self.sinks {
                if let Err(err) = sink.emit(event) {
                    warn!("Can't emit {} {}: {err:#}", event.scope, event.name);
                }
            }
        }
    }

    /// Build and emit the events for the job's current status
    pub fn dispatch(&self, job: &NormalizedJob) -> Result<Vec<JobEvent>, serde_json::Error> {
        let events = Dispatcher::events(job)?;
        self.emit(&events);
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use crate::normalize::input::Inputs;
    use crate::normalize::parameter::Parameters;
    use crate::system::RunTime;
    use uuid::Uuid;

    fn job(status: JobStatus) -> NormalizedJob {
        NormalizedJob {
            uuid: Uuid::new_v4(),
            name: "wc".to_string(),
            owner: "alice".to_string(),
            app_id: "wc-1.0".to_string(),
            execution_system: "hpc".to_string(),
            batch_queue: "normal".to_string(),
            node_count: 1,
            processors_per_node: 1,
            memory_per_node: 1.0,
            max_run_time: RunTime::from_secs(60),
            parameters: Parameters::new(),
            inputs: Inputs::new(),
            archive: false,
            archive_path: None,
            status,
            created: Utc::now(),
        }
    }

    struct Recorder<'r>(&'r RefCell<Vec<String>>);

    impl EventSink for Recorder<'_> {
        fn emit(&self, event: &JobEvent) -> anyhow::Result<()> {
            self.0.borrow_mut().push(format!("{} {}", event.scope, event.name));
            Ok(())
        }
    }

    struct Broken;

    impl EventSink for Broken {
        fn emit(&self, _: &JobEvent) -> anyhow::Result<()> {
            anyhow::bail!("sink offline")
        }
    }

    #[test]
    fn test_created_job_notifies_system_and_application() {
        let seen = RefCell::new(Vec::new());
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Recorder(&seen));

        let events = dispatcher.dispatch(&job(JobStatus::Pending)).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(
            *seen.borrow(),
            vec!["execution_system:hpc JOB_CREATED".to_string(), "application:wc-1.0 JOB_CREATED".to_string()]
        );
    }

    #[test]
    fn test_later_statuses_notify_system_only() {
        for status in JobStatus::ALL.into_iter().filter(|s| *s != JobStatus::Pending) {
            let events = Dispatcher::events(&job(status)).unwrap();
            assert_eq!(events.len(), 1, "{status}");
            assert_eq!(events[0].scope, EventScope::ExecutionSystem("hpc".to_string()));
            assert_eq!(events[0].name, status.event_name());
            assert_eq!(events[0].job["status"], status.as_str());
        }
    }

    #[test]
    fn test_failing_sink_does_not_stop_dispatch() {
        let seen = RefCell::new(Vec::new());
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Broken);
        dispatcher.register(Recorder(&seen));

        dispatcher.dispatch(&job(JobStatus::Running)).unwrap();
        assert_eq!(*seen.borrow(), vec!["execution_system:hpc JOB_RUNNING".to_string()]);
    }
}
