//! Admission: turn a job request into a canonical, stored job or reject it
//!
//! A request is checked in a fixed order: application lookup, parameters, inputs, batch queue,
//! notifications. The first failure rejects the request and nothing is stored. An admitted job
//! is committed with its subscriptions in one save point, then dispatched as `JOB_CREATED`.

use chrono::Utc;
use log::{info, warn};
use rusqlite::Connection;
use serde::Serialize;
use tinytemplate::{format_unescaped, TinyTemplate};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::db::job::save_admitted;
use crate::error::{AdmissionError, Rejection};
use crate::event::Dispatcher;
use crate::job::{JobStatus, NormalizedJob};
use crate::normalize::input::normalize_inputs;
use crate::normalize::parameter::normalize_parameters;
use crate::normalize::probe::InputProbe;
use crate::notification::{validate_notifications, NotificationSubscription};
use crate::queue::resource::ResourceRequest;
use crate::queue::select;
use crate::request::job::JobRequest;

const MAX_NAME_LENGTH: usize = 64;

/// A job that passed admission, with the subscriptions to store alongside it
#[derive(Debug, Clone)]
pub struct Admitted {
    pub job: NormalizedJob,
    pub subscriptions: Vec<NotificationSubscription>,
}

/// Rendering context for the default archive path
#[derive(Serialize)]
struct ArchiveContext<'a> {
    owner: &'a str,
    uuid: String,
}

fn render_archive_path(owner: &str, uuid: Uuid) -> Result<String, AdmissionError> {
    static ARCHIVE_PATH: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/archive_path.txt"));
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&format_unescaped);
    tt.add_template("archive_path", ARCHIVE_PATH)?;
    let context = ArchiveContext { owner, uuid: uuid.to_string() };
    Ok(tt.render("archive_path", &context)?.trim().to_string())
}

fn blank_to_none(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub struct Admission<'a, C: ?Sized, P: ?Sized> {
    catalog: &'a C,
    probe: &'a P,
}

impl<'a, C, P> Admission<'a, C, P>
where
    C: Catalog + ?Sized,
    P: InputProbe + ?Sized,
{
    pub fn new(catalog: &'a C, probe: &'a P) -> Self {
        Admission { catalog, probe }
    }

    /// Validate and normalise a request without storing anything
    pub fn normalize(&self, owner: &str, request: &JobRequest) -> Result<Admitted, AdmissionError> {
        info!("Admitting job request {} for {owner}", request.name);

        let name = request.name.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
            return Err(Rejection::malformed(format!(
                "Invalid job name. Names must be between 1 and {MAX_NAME_LENGTH} characters."
            ))
            .into());
        }

        let app = self.catalog.application(request.app_id.trim()).ok_or_else(|| {
            Rejection::unknown_resource(format!("No application found matching {}", request.app_id))
        })?;
        if let Some(system_id) = blank_to_none(&request.execution_system) {
            if system_id != app.execution_system {
                return Err(Rejection::unknown_resource(format!(
                    "Invalid executionSystem. {} can only run on {}, not {system_id}",
                    app.id, app.execution_system
                ))
                .into());
            }
        }
        let system = self.catalog.execution_system(&app.execution_system).ok_or_else(|| {
            Rejection::unknown_resource(format!(
                "No execution system found matching {} for application {}",
                app.execution_system, app.id
            ))
        })?;

        let parameters = normalize_parameters(&app.parameters, &request.parameters)?;
        let inputs = normalize_inputs(&app.inputs, &request.inputs, self.catalog, self.probe)?;

        let resources = ResourceRequest::resolve(&request.resources, app)?;
        let named = blank_to_none(&request.batch_queue).or(app.default_queue.as_deref());
        let queue = select(system, &resources, named)?;
        let resources = resources.settle(queue);
        info!("Selected queue {} on {} for {resources}", queue.name, system.id);

        let uuid = Uuid::new_v4();
        let subscriptions = validate_notifications(uuid, owner, &request.notifications)?;

        let archive = request.archive.unwrap_or(true);
        let archive_path = match (archive, blank_to_none(&request.archive_path)) {
            (false, _) => None,
            (true, Some(path)) => Some(path.to_string()),
            (true, None) => Some(render_archive_path(owner, uuid)?),
        };

        let job = NormalizedJob {
            uuid,
            name: name.to_string(),
            owner: owner.to_string(),
            app_id: app.id.clone(),
            execution_system: system.id.clone(),
            batch_queue: queue.name.clone(),
            node_count: resources.node_count,
            processors_per_node: resources.processors_per_node,
            memory_per_node: resources.memory_per_node,
            max_run_time: resources.max_run_time,
            parameters,
            inputs,
            archive,
            archive_path,
            status: JobStatus::Pending,
            created: Utc::now(),
        };
        Ok(Admitted { job, subscriptions })
    }

    /// Normalise, store and dispatch a request
    ///
    /// The job and its subscriptions are stored together or not at all. Nothing after the commit
    /// can fail the admission.
    pub fn admit(
        &self,
        conn: &Connection,
        owner: &str,
        request: &JobRequest,
        dispatcher: &Dispatcher,
    ) -> Result<Admitted, AdmissionError> {
        let admitted = self.normalize(owner, request).map_err(|err| {
            warn!("Rejecting job request {}: {err}", request.name);
            err
        })?;

        let events = Dispatcher::events(&admitted.job)?;
        save_admitted(conn, &admitted.job, &admitted.subscriptions)?;
        info!(
            "Admitted job {} with {} notification subscriptions",
            admitted.job.uuid,
            admitted.subscriptions.len()
        );
        dispatcher.emit(&events);
        Ok(admitted)
    }
}
