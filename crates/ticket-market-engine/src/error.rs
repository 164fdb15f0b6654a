//! Error types of the ticket market
use std::io;

use thiserror::Error;

/// Outcome of a blocking pool operation whose caller was cancelled
///
/// This is not a failure: it tells the actor to leave its loop.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
#[error("pool operation cancelled")]
pub struct Cancelled;

/// Malformed or contradictory configuration
#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum ValidationError {
    #[error("{field} cannot be negative")]
    Negative { field: &'static str },

    #[error("{field} is out of range")]
    OutOfRange { field: &'static str },

    #[error("Total tickets ({total}) must be greater than maximum capacity ({capacity})")]
    TotalNotAboveCapacity { total: u32, capacity: u32 },
}

/// Operation not valid for the current configuration or run state
#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum StateError {
    #[error("Invalid ticket capacity. Please configure the system first.")]
    MissingCapacity,

    #[error("Invalid ticket release rate. Please configure the system first.")]
    MissingReleaseRate,

    #[error("Invalid customer retrieval rate. Please configure the system first.")]
    MissingRetrievalRate,
}

/// Any error an administrative operation may report
#[derive(Debug, Error)]
pub enum MarketError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("failed to spawn actor thread: {0}")]
    Spawn(#[from] io::Error),
}

/// Failure to load or store configuration records
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("configuration file: {0}")]
    Io(#[from] io::Error),

    #[error("configuration file is malformed: {0}")]
    Json(#[from] serde_json::Error),
}
