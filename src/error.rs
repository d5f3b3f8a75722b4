//! Error types for the memory engine.
//!
//! [`StoreError`] is what storage backends return; [`SchedulerError`] is what
//! callers of the scheduler see. Store failures convert into the scheduler
//! taxonomy at the scheduler boundary and are never fatal.

use thiserror::Error;

/// Failure reported by a [`Store`](crate::store::Store) backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing medium could not be reached or read.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A create, update, bulk create or clear did not apply.
    #[error("store write failed: {0}")]
    Write(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Write(e.to_string())
    }
}

/// Errors surfaced by the memory scheduler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// Input rejected before any store interaction.
    #[error("validation error: {0}")]
    Validation(String),

    /// The read path failed; in-memory state is unchanged.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A durable write failed; optimistic state is kept.
    #[error("store write failed: {0}")]
    StoreWrite(String),

    /// No item with this id in the current collection.
    #[error("memory item not found: {0}")]
    NotFound(String),

    /// The operation needs a signed-in cloud account.
    #[error("not signed in to a cloud account")]
    NotAuthenticated,

    /// A backup document could not be parsed.
    #[error("backup error: {0}")]
    Backup(String),
}

impl From<StoreError> for SchedulerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => SchedulerError::StoreUnavailable(msg),
            StoreError::Write(msg) => SchedulerError::StoreWrite(msg),
        }
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(e: serde_json::Error) -> Self {
        SchedulerError::Backup(e.to_string())
    }
}

/// Result type alias for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;
