//! Job notification subscriptions
//!
//! A request may carry a list of `{url, event, persistent}` subscriptions. The whole list is
//! validated before anything is stored: one bad subscription rejects them all.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use regex_lite::Regex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use crate::error::Rejection;
use crate::job::JobStatus;

/// Stored event for subscriptions that match every status
pub const WILDCARD: &str = "*";

/// Statuses a bare callback url or email is subscribed to
pub const CALLBACK_EVENTS: [JobStatus; 2] = [JobStatus::Finished, JobStatus::Failed];

/// One requested subscription, as sent on the wire
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationRequest {
    pub url: Option<String>,
    pub event: Option<String>,
    #[serde(default)]
    pub persistent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSubscription {
    pub uuid: Uuid,
    pub associated_uuid: Uuid,
    pub owner: String,
    /// Upper-case status name or [WILDCARD]
    pub event: String,
    /// http(s) url or email address
    pub callback: String,
    pub persistent: bool,
    pub created: DateTime<Utc>,
}

impl NotificationSubscription {
    fn new(job_uuid: Uuid, owner: &str, event: String, callback: &str, persistent: bool) -> Self {
        NotificationSubscription {
            uuid: Uuid::new_v4(),
            associated_uuid: job_uuid,
            owner: owner.to_string(),
            event,
            callback: callback.to_string(),
            persistent,
            created: Utc::now(),
        }
    }
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[\w.+\-]+@([\w\-]+\.)+[A-Za-z]{2,}$").expect("email pattern compiles")
    })
}

/// Check a callback is an http(s) url or an email address
///
/// `${JOB_ID}` and `${JOB_STATUS}` placeholders are filled in with sample values before the url
/// is parsed.
pub fn check_callback(callback: &str) -> Result<(), String> {
    let callback = callback.trim();
    if email_pattern().is_match(callback) {
        return Ok(());
    }

    let sample = callback
        .replace("${JOB_ID}", "0001414144065563-5056a550b8-0001-007")
        .replace("${JOB_STATUS}", JobStatus::Finished.as_str());
    let url = Url::parse(&sample).map_err(|err| format!("{callback} is not a valid url or email address: {err}"))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some_and(|host| !host.is_empty()) => Ok(()),
        "http" | "https" => Err(format!("{callback} has no host")),
        scheme => Err(format!("Callbacks with the {scheme} scheme are not supported")),
    }
}

/// Normalise an event name: a status name, or the wildcard spelled `*` or `any`
pub fn check_event(event: &str) -> Result<String, String> {
    let event = event.trim();
    if event.is_empty() {
        return Err("No notification event was specified".to_string());
    }
    if event == WILDCARD || event.eq_ignore_ascii_case("any") {
        return Ok(WILDCARD.to_string());
    }
    event
        .parse::<JobStatus>()
        .map(|status| status.as_str().to_string())
        .map_err(|_| format!("{event} is not a valid job event"))
}

/// Subscribe a bare callback to [CALLBACK_EVENTS]
pub fn expand_callback(
    job_uuid: Uuid,
    owner: &str,
    callback: &str,
) -> Result<Vec<NotificationSubscription>, Rejection> {
    let callback = callback.trim();
    check_callback(callback).map_err(Rejection::invalid_subscription)?;
    Ok(CALLBACK_EVENTS
        .iter()
        .map(|status| NotificationSubscription::new(job_uuid, owner, status.as_str().to_string(), callback, false))
        .collect())
}

/// Validate every requested subscription, or reject the whole batch
///
/// `raw` is null (nothing), a single callback string, or a list of subscription objects.
pub fn validate_notifications(
    job_uuid: Uuid,
    owner: &str,
    raw: &Value,
) -> Result<Vec<NotificationSubscription>, Rejection> {
    let requests = match raw {
        Value::Null => return Ok(Vec::new()),
        Value::String(callback) if callback.trim().is_empty() => return Ok(Vec::new()),
        Value::String(callback) => return expand_callback(job_uuid, owner, callback),
        Value::Array(requests) => requests,
        other => {
            return Err(Rejection::invalid_subscription(format!(
                "Invalid notifications value {other}. Please specify a list of notification objects."
            )))
        }
    };

    info!("Validating {} notification subscriptions for job {job_uuid}", requests.len());
    let mut subscriptions = Vec::with_capacity(requests.len());
    for (i, request) in requests.iter().enumerate() {
        let request: NotificationRequest = serde_json::from_value(request.clone()).map_err(|err| {
            Rejection::invalid_subscription(format!("Invalid notification at index {i}: {err}"))
        })?;

        let event = check_event(request.event.as_deref().unwrap_or_default()).map_err(|why| {
            warn!("Rejecting notification {i}: {why}");
            Rejection::invalid_subscription(format!("Invalid notification at index {i}. {why}"))
        })?;
        let callback = request.url.as_deref().map(str::trim).unwrap_or_default();
        if callback.is_empty() {
            return Err(Rejection::invalid_subscription(format!(
                "Invalid notification at index {i}. No url was specified."
            )));
        }
        check_callback(callback).map_err(|why| {
            warn!("Rejecting notification {i}: {why}");
            Rejection::invalid_subscription(format!("Invalid notification at index {i}. {why}"))
        })?;

        debug!("Subscription {event} -> {callback}");
        subscriptions.push(NotificationSubscription::new(job_uuid, owner, event, callback, request.persistent));
    }

    Ok(subscriptions)
}

/// Store validated subscriptions
///
/// Callers commit the job in the same transaction, so subscriptions never outlive a failed admission.
pub fn register_notifications(
    conn: &Connection,
    subscriptions: &[NotificationSubscription],
) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO notification (uuid, job_uuid, owner, event, callback, persistent, created)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for subscription in subscriptions {
        info!("Registering {} notification for job {}", subscription.event, subscription.associated_uuid);
        stmt.execute((
            subscription.uuid.to_string(),
            subscription.associated_uuid.to_string(),
            &subscription.owner,
            &subscription.event,
            &subscription.callback,
            subscription.persistent,
            subscription.created.to_rfc3339(),
        ))?;
    }
    Ok(())
}

fn conversion_error(idx: usize, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

/// Subscriptions stored for a job, in registration order
pub fn load_notifications(conn: &Connection, job_uuid: Uuid) -> rusqlite::Result<Vec<NotificationSubscription>> {
    let mut stmt = conn.prepare(
        "SELECT uuid, owner, event, callback, persistent, created FROM notification
         WHERE job_uuid = ?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map([job_uuid.to_string()], |row| {
        let uuid: String = row.get(0)?;
        let created: String = row.get(5)?;
        Ok(NotificationSubscription {
            uuid: Uuid::parse_str(&uuid).map_err(|err| conversion_error(0, err))?,
            associated_uuid: job_uuid,
            owner: row.get(1)?,
            event: row.get(2)?,
            callback: row.get(3)?,
            persistent: row.get(4)?,
            created: DateTime::parse_from_rfc3339(&created)
                .map_err(|err| conversion_error(5, err))?
                .with_timezone(&Utc),
        })
    })?;
    rows.collect()
}
