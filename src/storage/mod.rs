//! Persistence for hospital metadata, current status and history
//!
//! Two traits split the read side the ingestion service needs
//! ([`HospitalDirectory`]) from the write path it owns ([`StatusStore`]).
//! Backends:
//! - [`SqliteStore`] - single-file default
//! - [`PostgresStore`] - pooled, one transaction per hospital
//! - [`MemoryStore`] - tests

pub mod postgres;
pub mod repository;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{DatabaseBackend, DatabaseConfig};
use crate::models::{HospitalHistory, HospitalIdentity, HospitalStatus, HospitalStatusCreate};

pub use postgres::PostgresStore;
pub use repository::{MemoryStore, SqliteStore};

/// Static hospital metadata
#[async_trait]
pub trait HospitalDirectory: Send + Sync {
    /// Every known hospital, ordered by id
    async fn list_hospitals(&self) -> Result<Vec<HospitalIdentity>>;

    async fn get_hospital(&self, id: i64) -> Result<Option<HospitalIdentity>>;

    /// Insert or replace one hospital (seeding only)
    async fn upsert_hospital(&self, hospital: &HospitalIdentity) -> Result<()>;
}

/// Current status and history
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Upsert the current status and append a history row atomically
    ///
    /// Either both writes land or neither does.
    async fn persist_status(&self, status: &HospitalStatusCreate) -> Result<HospitalStatus>;

    async fn current_status(&self, hospital_id: i64) -> Result<Option<HospitalStatus>>;

    /// Most recent history rows first
    async fn history(&self, hospital_id: i64, limit: usize) -> Result<Vec<HospitalHistory>>;
}

/// A backend serving both traits
pub trait Storage: HospitalDirectory + StatusStore {}

impl<T: HospitalDirectory + StatusStore> Storage for T {}

/// Open the configured backend
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn Storage>> {
    match config.backend {
        DatabaseBackend::Sqlite => Ok(Arc::new(SqliteStore::new(&config.sqlite_path)?)),
        DatabaseBackend::Postgres => Ok(Arc::new(
            PostgresStore::connect(&config.postgres_url, config.pool_size).await?,
        )),
    }
}

/// Map a stored integer back to a count
pub(crate) fn to_count(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}
