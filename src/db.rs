//! Admitted jobs, their subscriptions, and dispatched events are stored in a SQLite database

/// Connect to a SQLite database
pub mod open;
/// Save admitted jobs and change their status
pub mod job;
/// Record dispatched events for delivery
pub mod event;
