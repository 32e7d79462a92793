//! Unified error handling for the ercrowd crate
//!
//! This module provides a unified error type that consolidates all domain-specific
//! errors into a single `Error` enum, while keeping the domain errors available
//! for code that needs to match on them.
//!
//! # Architecture
//!
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use ercrowd::error::{Error, ErrorCategory};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         println!("Retrying: {err}");
//!     } else {
//!         eprintln!("Fatal error: {err}");
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::ingest::limiter::RateLimitError;
pub use crate::ingest::IngestError;
pub use crate::scheduler::error::SchedulerError;
pub use crate::sources::registry::RegistryError;
pub use crate::utils::error::{FetchError, ParseError, ScrapeError};

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP, timeout, status)
    Network,
    /// Parsing and data extraction errors
    Parsing,
    /// Storage and I/O errors
    Storage,
    /// Configuration, registry and validation errors
    Config,
    /// Scheduler and timing errors
    Scheduler,
    /// Manual trigger cooldown
    RateLimit,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Short human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "network error",
            Self::Parsing => "parsing error",
            Self::Storage => "storage error",
            Self::Config => "configuration error",
            Self::Scheduler => "scheduler error",
            Self::RateLimit => "rate limited",
            Self::Other => "other error",
        }
    }
}

/// Unified error type for the ercrowd crate
#[derive(Error, Debug)]
pub enum Error {
    /// Fetch-specific errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Parse-specific errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Terminal scrape errors
    #[error("Scrape error: {0}")]
    Scrape(#[from] ScrapeError),

    /// Registry and factory errors
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Manual trigger cooldown
    #[error("Rate limited: {0}")]
    RateLimit(#[from] RateLimitError),

    /// Ingestion errors
    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),

    /// Scheduler and timing errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// SQLite errors
    #[error("Database error: {0}")]
    Database(#[source] rusqlite::Error),

    /// PostgreSQL errors
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Redis errors
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Check if this error is recoverable (a later attempt may succeed)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_transient(),
            Self::Parse(_) => false,
            Self::Scrape(ScrapeError::Fetch(e)) => e.is_transient(),
            Self::Scrape(ScrapeError::Parse(_)) => false,
            Self::Registry(_) => false,
            Self::RateLimit(_) => true,
            Self::Ingest(e) => e.is_recoverable(),
            Self::Scheduler(e) => e.is_recoverable(),
            Self::Database(_) => false,
            Self::Postgres(_) | Self::Redis(_) => true,
            Self::Io(_) => true, // I/O errors are often transient
            Self::Json(_) => false,
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }

    /// Get the error category for handling strategies
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(_) | Self::Scrape(ScrapeError::Fetch(_)) => ErrorCategory::Network,
            Self::Parse(_) | Self::Scrape(ScrapeError::Parse(_)) | Self::Json(_) => {
                ErrorCategory::Parsing
            }
            Self::Registry(_) | Self::Config(_) => ErrorCategory::Config,
            Self::RateLimit(_) => ErrorCategory::RateLimit,
            Self::Ingest(e) => match e {
                IngestError::RateLimited(_) => ErrorCategory::RateLimit,
                IngestError::Registry(_) | IngestError::HospitalNotFound(_) => {
                    ErrorCategory::Config
                }
                IngestError::Storage(_) => ErrorCategory::Storage,
            },
            Self::Scheduler(_) => ErrorCategory::Scheduler,
            Self::Database(_) | Self::Postgres(_) | Self::Redis(_) | Self::Io(_) => {
                ErrorCategory::Storage
            }
            Self::Other { .. } => ErrorCategory::Other,
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Conversion from rusqlite::Error
impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err)
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: format!("{err:#}"),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
