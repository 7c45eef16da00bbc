//! Job requests as they arrive: JSON documents or flat form submissions
//!
//! Both shapes are checked against one JSON schema before any application-level processing, so
//! wrong scalar types and oversize strings are rejected up front.

use log::info;
use serde_json::Value;

use crate::error::Rejection;
use crate::request::job::JobRequest;
use crate::request::schema::RequestSchema;

/// Wire shape of a job request
pub mod job;
/// Flat `application/x-www-form-urlencoded` submissions
pub mod form;
/// Compiled job request schema
pub mod schema;
/// Read job request files
pub mod message;

/// Validate raw request JSON and deserialise it
pub fn parse_request(schema: &RequestSchema, json: Value) -> Result<JobRequest, Rejection> {
    schema.check(&json)?;
    info!("Deserialising valid JSON into a job request");
    serde_json::from_value::<JobRequest>(json)
        .map_err(|err| Rejection::malformed(format!("Invalid job request: {err}")))
}
