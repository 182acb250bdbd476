//! Error taxonomy shared by the session store backends and the tracker.

use std::error::Error as StdError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    /// Malformed or out-of-range argument. Raised before any mutation.
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    /// Soft miss: the referenced record does not exist.
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// The backing store could not complete a read or write.
    #[error("session store failure: {0}")]
    Storage(#[source] Box<dyn StdError + Send + Sync + 'static>),
}

impl TrackerError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        TrackerError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    pub fn session_not_found(session_id: &str) -> Self {
        TrackerError::NotFound {
            what: "work session",
            id: session_id.to_string(),
        }
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, TrackerError::InvalidInput { .. })
    }
}

impl From<anyhow::Error> for TrackerError {
    fn from(err: anyhow::Error) -> Self {
        TrackerError::Storage(err.into())
    }
}

pub type TrackerResult<T> = Result<T, TrackerError>;

/// Durations cross the API signed so negative input can be rejected.
pub fn validate_seconds(field: &'static str, seconds: i64) -> TrackerResult<u64> {
    u64::try_from(seconds)
        .map_err(|_| TrackerError::invalid(field, format!("{seconds} is negative")))
}

/// Largest value a per-session counter may hold; SQLite stores it as INTEGER.
pub const MAX_COUNTER_SECONDS: u64 = i64::MAX as u64;

pub(crate) fn counter_overflow(field: &'static str, seconds: u64) -> TrackerError {
    TrackerError::invalid(
        field,
        format!("adding {seconds} would overflow the session counter"),
    )
}

/// Adds `seconds` to a session counter, refusing to pass [`MAX_COUNTER_SECONDS`].
pub fn accumulate_seconds(field: &'static str, current: u64, seconds: u64) -> TrackerResult<u64> {
    current
        .checked_add(seconds)
        .filter(|total| *total <= MAX_COUNTER_SECONDS)
        .ok_or_else(|| counter_overflow(field, seconds))
}
