//! Admission rejections
//!
//! Every admission failure is a single [Rejection] with a machine-readable kind and a
//! human-readable reason. Rejections are expected outcomes of validating untrusted input, never
//! fatal to the process.

use std::fmt;

/// Machine-readable rejection categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    InvalidType,
    InvalidCardinality,
    HiddenFieldSupplied,
    RequiredFieldMissing,
    UnsupportedScheme,
    UnreachableInput,
    NoMatch,
    InvalidSubscription,
    /// Wire shape is wrong before any schema-level processing happens
    MalformedRequest,
    /// Application, execution system or storage system lookup failed
    UnknownResource,
}

impl RejectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionKind::InvalidType => "INVALID_TYPE",
            RejectionKind::InvalidCardinality => "INVALID_CARDINALITY",
            RejectionKind::HiddenFieldSupplied => "HIDDEN_FIELD_SUPPLIED",
            RejectionKind::RequiredFieldMissing => "REQUIRED_FIELD_MISSING",
            RejectionKind::UnsupportedScheme => "UNSUPPORTED_SCHEME",
            RejectionKind::UnreachableInput => "UNREACHABLE_INPUT",
            RejectionKind::NoMatch => "NO_MATCH",
            RejectionKind::InvalidSubscription => "INVALID_SUBSCRIPTION",
            RejectionKind::MalformedRequest => "MALFORMED_REQUEST",
            RejectionKind::UnknownResource => "UNKNOWN_RESOURCE",
        }
    }
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {reason}")]
pub struct Rejection {
    kind: RejectionKind,
    reason: String,
}

impl Rejection {
    pub fn new(kind: RejectionKind, reason: impl Into<String>) -> Self {
        Rejection { kind, reason: reason.into() }
    }

    pub fn kind(&self) -> RejectionKind {
        self.kind
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn invalid_type(reason: impl Into<String>) -> Self {
        Rejection::new(RejectionKind::InvalidType, reason)
    }

    pub fn invalid_cardinality(reason: impl Into<String>) -> Self {
        Rejection::new(RejectionKind::InvalidCardinality, reason)
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Rejection::new(RejectionKind::MalformedRequest, reason)
    }

    pub fn no_match(reason: impl Into<String>) -> Self {
        Rejection::new(RejectionKind::NoMatch, reason)
    }

    pub fn invalid_subscription(reason: impl Into<String>) -> Self {
        Rejection::new(RejectionKind::InvalidSubscription, reason)
    }

    pub fn unknown_resource(reason: impl Into<String>) -> Self {
        Rejection::new(RejectionKind::UnknownResource, reason)
    }
}

/// Admission either rejects the request or fails to commit it
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error("Job request rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    Template(#[from] tinytemplate::error::Error),
}

impl AdmissionError {
    /// The rejection, if admission failed because of the request itself
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            AdmissionError::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }
}
