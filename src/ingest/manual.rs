//! Externally triggered runs
//!
//! A manual fleet run goes through the cooldown limiter; a single-hospital
//! run does not.

use std::sync::Arc;

use super::limiter::CooldownLimiter;
use super::service::{FleetReport, IngestionService};
use super::IngestError;
use crate::metrics;

pub struct ManualTrigger {
    service: Arc<IngestionService>,
    limiter: CooldownLimiter,
}

impl ManualTrigger {
    pub fn new(service: Arc<IngestionService>, limiter: CooldownLimiter) -> Self {
        Self { service, limiter }
    }

    /// Run the whole fleet now unless a manual run was accepted within the cooldown
    pub async fn run_fleet_now(&self) -> Result<FleetReport, IngestError> {
        self.limiter.check().await?;

        tracing::info!("Manual fleet run accepted");
        metrics::record_fleet_run("manual");
        self.service.run_fleet().await
    }

    pub async fn run_hospital_now(&self, hospital_id: i64) -> Result<bool, IngestError> {
        tracing::info!(hospital_id, "Manual hospital run");
        self.service.run_hospital(hospital_id).await
    }
}
