//! Error types for interval construction

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur while reading events or building intervals
#[derive(Debug, Error)]
pub enum IntervalError {
    #[error("Failed to parse event stream: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cache capacity must be larger than zero, got {0}")]
    InvalidCapacity(usize),

    /// The event stream went back in time. This is an upstream ordering bug
    /// and aborts the run that observed it.
    #[error("Event stream is not ordered: {current} was triggered before {previous}")]
    NonMonotonicStream {
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    #[error("Archive worker failed: {0}")]
    WorkerFailed(String),
}
