//! ercrowd - Emergency-room congestion ingestion for Sicilian hospitals
//!
//! Scrapes the public waiting-room pages of 21 emergency departments on a
//! fixed interval, normalizes each into one triage-colour record and keeps
//! current status plus history.
//!
//! # Architecture
//!
//! - [`transport`] - shared retrying, rate-limited HTTP client
//! - [`parser`] - colour vocabulary, wait-time and date normalization
//! - [`models`] - canonical status types
//! - [`sources`] - per-source strategies, registry and factory
//! - [`storage`] - hospital directory, current status and history
//! - [`ingest`] - fleet orchestration, manual triggers and their cooldown
//! - [`scheduler`] - periodic fleet runs without overlap
//! - [`cache`] - key-value store backing the cooldown
//! - [`metrics`] - Prometheus counters for jobs and runs
//! - [`config`] - configuration management
//!
//! # Example
//!
//! ```no_run
//! use ercrowd::app::App;
//! use ercrowd::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let app = App::build(Config::from_env()?).await?;
//!     let report = app.service.run_fleet().await?;
//!     println!("{}/{} hospitals updated", report.succeeded(), report.total());
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod cache;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod models;
pub mod parser;
pub mod scheduler;
pub mod sources;
pub mod storage;
pub mod transport;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::ingest::{FleetReport, IngestionService, JobOutcome, ManualTrigger};
    pub use crate::models::{ColorCode, ColorCodeDistribution, HospitalStatusCreate, TriageColor};
    pub use crate::scheduler::FleetScheduler;
    pub use crate::sources::{HospitalScraper, ScraperFactory, SourceCode, SourceRegistry};
    pub use crate::storage::Storage;
}

pub use models::{ColorCode, ColorCodeDistribution, TriageColor};
