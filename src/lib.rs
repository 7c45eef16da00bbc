//! portti admits job requests: it normalises parameters and inputs against an application's
//! schema, picks a batch queue, registers notification subscriptions and stores the canonical
//! job, then fires job lifecycle events.

pub mod admission;
pub mod catalog;
pub mod coerce;
pub mod db;
pub mod error;
pub mod event;
pub mod format;
pub mod job;
pub mod normalize;
pub mod notification;
pub mod queue;
pub mod request;
pub mod software;
pub mod system;
