//! Error types for the scheduler module

use std::fmt;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// Interval must be non-zero
    InvalidInterval { secs: u64 },

    /// `spawn` was called while a loop is already running
    AlreadyRunning,

    /// Periodic runs are switched off in configuration
    Disabled,

    /// The loop task ended abnormally
    TaskFailed { reason: String },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInterval { secs } => {
                write!(f, "Invalid interval '{}s'. Must be greater than 0", secs)
            }
            Self::AlreadyRunning => write!(f, "Scheduler loop is already running"),
            Self::Disabled => write!(f, "Scheduler is disabled in configuration"),
            Self::TaskFailed { reason } => write!(f, "Scheduler task failed: {}", reason),
        }
    }
}

impl std::error::Error for SchedulerError {}

impl From<tokio::task::JoinError> for SchedulerError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskFailed {
            reason: err.to_string(),
        }
    }
}

impl SchedulerError {
    /// Create an invalid interval error
    pub fn invalid_interval(secs: u64) -> Self {
        Self::InvalidInterval { secs }
    }

    /// Create a task failure error
    pub fn task_failed(reason: impl Into<String>) -> Self {
        Self::TaskFailed {
            reason: reason.into(),
        }
    }

    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::AlreadyRunning | Self::TaskFailed { .. })
    }
}
