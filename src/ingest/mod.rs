//! Fleet ingestion: orchestration, manual triggers and their cooldown
//!
//! - [`service`] - one fleet pass or one hospital, validate-then-persist
//! - [`manual`] - externally triggered runs
//! - [`limiter`] - cooldown shared through the key-value store

pub mod limiter;
pub mod manual;
pub mod service;

use thiserror::Error;

use crate::sources::RegistryError;

pub use limiter::{CooldownLimiter, RateLimitError};
pub use manual::ManualTrigger;
pub use service::{FleetReport, FleetRunner, IngestSettings, IngestionService, JobOutcome};

/// Errors surfaced to callers of the ingestion service
///
/// Per-hospital failures inside a fleet run never appear here; they are
/// reported through [`FleetReport`].
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Hospital {0} not found")]
    HospitalNotFound(i64),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    RateLimited(#[from] RateLimitError),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl IngestError {
    /// Whether retrying later may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Storage(_))
    }
}
