//! Process wiring shared by the CLI commands
//!
//! Builds storage, transport, registry and factory from a [`Config`], and
//! loads the static hospital directory used for seeding.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

use crate::cache::{KeyValueStore, MemoryKeyValueStore, RedisStore};
use crate::config::Config;
use crate::ingest::{CooldownLimiter, IngestSettings, IngestionService, ManualTrigger};
use crate::models::HospitalIdentity;
use crate::sources::{ScraperContext, ScraperFactory, SourceCode, SourceRegistry};
use crate::storage::{self, HospitalDirectory, Storage};
use crate::transport::HttpTransport;

pub struct App {
    pub config: Config,
    pub storage: Arc<dyn Storage>,
    pub service: Arc<IngestionService>,
}

impl App {
    /// Validate the configuration and open every backend it names
    pub async fn build(config: Config) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let storage = storage::connect(&config.database)
            .await
            .context("Failed to open storage")?;

        let transport =
            HttpTransport::new(&config.http).context("Failed to create HTTP transport")?;
        let context = ScraperContext::new(Arc::new(transport))
            .with_endpoints(config.sources.endpoints.clone());

        let registry = Arc::new(SourceRegistry::standard());
        let factory = Arc::new(ScraperFactory::standard(registry));

        let service = Arc::new(IngestionService::new(
            storage.clone(),
            factory,
            context,
            IngestSettings::from(&config),
        ));

        Ok(Self {
            config,
            storage,
            service,
        })
    }

    /// Manual trigger backed by Redis, or by an in-process store when Redis is down
    pub async fn manual_trigger(&self) -> ManualTrigger {
        let store: Arc<dyn KeyValueStore> = match RedisStore::try_new(&self.config.redis).await {
            Some(redis) => Arc::new(redis),
            None => Arc::new(MemoryKeyValueStore::new()),
        };
        let limiter = CooldownLimiter::from_config(store, &self.config.trigger);
        ManualTrigger::new(self.service.clone(), limiter)
    }
}

// ============================================================================
// Hospital directory seeding
// ============================================================================

/// One `[[hospitals]]` entry of the directory file
#[derive(Debug, Clone, Deserialize)]
pub struct HospitalSeed {
    pub code: SourceCode,
    #[serde(flatten)]
    pub hospital: HospitalIdentity,
}

#[derive(Debug, Deserialize)]
struct DirectoryFile {
    hospitals: Vec<HospitalSeed>,
}

pub fn load_hospitals(path: &Path) -> Result<Vec<HospitalSeed>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read hospital file: {}", path.display()))?;

    let file: DirectoryFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse hospital file: {}", path.display()))?;

    Ok(file.hospitals)
}

/// Upsert every seed whose id matches its registry entry
///
/// Returns the number of hospitals written. A seed whose id maps to a
/// different source code aborts before anything is written.
pub async fn seed_directory(
    storage: &dyn Storage,
    registry: &SourceRegistry,
    seeds: &[HospitalSeed],
) -> Result<usize> {
    for seed in seeds {
        match registry.code_for(seed.hospital.id) {
            Some(code) if code == seed.code => {}
            Some(code) => anyhow::bail!(
                "Hospital {} is registered as {code}, file says {}",
                seed.hospital.id,
                seed.code
            ),
            None => anyhow::bail!(
                "Hospital {} ({}) has no registry entry",
                seed.hospital.id,
                seed.code
            ),
        }
    }

    for seed in seeds {
        storage
            .upsert_hospital(&seed.hospital)
            .await
            .with_context(|| format!("Failed to seed {}", seed.hospital.label()))?;
        tracing::debug!(
            hospital_id = seed.hospital.id,
            hospital = %seed.hospital.label(),
            "Seeded"
        );
    }

    tracing::info!(count = seeds.len(), "Hospital directory seeded");
    Ok(seeds.len())
}
