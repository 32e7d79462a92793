//! Fleet orchestration
//!
//! One fleet run lists every hospital, then runs one job per hospital with
//! at most `max_concurrent_jobs` in flight:
//!
//! ```text
//! acquire slot -> resolve strategy -> validate -> scrape -> persist
//!                                     \___ job timeout ___/
//! ```
//!
//! Every per-hospital failure is contained in its job and reported as a
//! [`JobOutcome`]; only a failure to list hospitals fails the run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

use super::IngestError;
use crate::config::Config;
use crate::metrics;
use crate::models::{HospitalIdentity, HospitalStatusCreate};
use crate::sources::{HospitalScraper, ScraperContext, ScraperFactory};
use crate::storage::{HospitalDirectory, StatusStore, Storage};

// ============================================================================
// Outcomes
// ============================================================================

/// How one hospital's job ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    /// `validate_data` returned false; nothing was written
    ValidationFailed,
    TimedOut,
    /// Transport or structural failure while validating or scraping
    ScrapeFailed,
    /// Transaction rolled back
    PersistFailed,
    /// No registry entry or no strategy for the hospital
    Misconfigured,
}

impl JobOutcome {
    pub fn is_success(self) -> bool {
        self == Self::Succeeded
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::ValidationFailed => "validation_failed",
            Self::TimedOut => "timed_out",
            Self::ScrapeFailed => "scrape_failed",
            Self::PersistFailed => "persist_failed",
            Self::Misconfigured => "misconfigured",
        }
    }
}

/// Result of one fleet run, keyed by hospital label
///
/// Labels shared by several hospitals carry a ` #id` suffix, so the report
/// always holds one entry per hospital.
#[derive(Debug, Clone)]
pub struct FleetReport {
    pub results: BTreeMap<String, bool>,
    pub outcomes: BTreeMap<String, JobOutcome>,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl FleetReport {
    fn new(
        outcomes: BTreeMap<String, JobOutcome>,
        started_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        let results = outcomes
            .iter()
            .map(|(label, outcome)| (label.clone(), outcome.is_success()))
            .collect();
        Self {
            results,
            outcomes,
            started_at,
            duration,
        }
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.values().filter(|ok| **ok).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }
}

/// Anything that can run a full fleet pass
#[async_trait]
pub trait FleetRunner: Send + Sync {
    async fn run_fleet(&self) -> Result<FleetReport, IngestError>;
}

// ============================================================================
// Service
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct IngestSettings {
    pub max_concurrent_jobs: usize,
    /// Bounds validation and scrape together
    pub job_timeout: Duration,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 5,
            job_timeout: Duration::from_secs(60),
        }
    }
}

impl From<&Config> for IngestSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_concurrent_jobs: config.scraper.max_concurrent_jobs,
            job_timeout: config.job_timeout(),
        }
    }
}

/// Owns the write path to current status and history
pub struct IngestionService {
    storage: Arc<dyn Storage>,
    factory: Arc<ScraperFactory>,
    context: ScraperContext,
    settings: IngestSettings,
}

impl IngestionService {
    pub fn new(
        storage: Arc<dyn Storage>,
        factory: Arc<ScraperFactory>,
        context: ScraperContext,
        settings: IngestSettings,
    ) -> Self {
        Self {
            storage,
            factory,
            context,
            settings,
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Scrape every hospital once
    pub async fn run_fleet(&self) -> Result<FleetReport, IngestError> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let _gauge = metrics::FleetGauge::start();

        let hospitals = self.storage.list_hospitals().await?;
        tracing::info!(
            hospitals = hospitals.len(),
            max_concurrent = self.settings.max_concurrent_jobs,
            "Starting fleet run"
        );

        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_jobs.max(1)));

        let keys = report_keys(&hospitals);
        let jobs = hospitals.iter().zip(keys).map(|(hospital, key)| {
            let semaphore = semaphore.clone();
            async move {
                let outcome = match semaphore.acquire().await {
                    Ok(_permit) => self.run_job(hospital).await,
                    // never closed
                    Err(_) => JobOutcome::ScrapeFailed,
                };
                (key, outcome)
            }
        });

        let outcomes: BTreeMap<String, JobOutcome> =
            futures::future::join_all(jobs).await.into_iter().collect();

        let report = FleetReport::new(outcomes, started_at, clock.elapsed());
        tracing::info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            total = report.total(),
            duration_ms = report.duration.as_millis() as u64,
            "Fleet run finished"
        );

        Ok(report)
    }

    /// Scrape one hospital
    ///
    /// Unknown hospitals and missing strategies are errors; job failures are
    /// `Ok(false)`.
    pub async fn run_hospital(&self, hospital_id: i64) -> Result<bool, IngestError> {
        let hospital = self
            .storage
            .get_hospital(hospital_id)
            .await?
            .ok_or(IngestError::HospitalNotFound(hospital_id))?;

        let scraper = self.factory.create(hospital.id, &self.context)?;
        Ok(self.execute(&hospital, scraper.as_ref()).await.is_success())
    }

    async fn run_job(&self, hospital: &HospitalIdentity) -> JobOutcome {
        match self.factory.create(hospital.id, &self.context) {
            Ok(scraper) => self.execute(hospital, scraper.as_ref()).await,
            Err(e) => {
                tracing::error!(
                    hospital_id = hospital.id,
                    hospital = %hospital.label(),
                    error = %e,
                    "No strategy for hospital"
                );
                JobOutcome::Misconfigured
            }
        }
    }

    async fn execute(
        &self,
        hospital: &HospitalIdentity,
        scraper: &dyn HospitalScraper,
    ) -> JobOutcome {
        let label = hospital.label();
        let source = scraper.source_code();
        let clock = Instant::now();

        let fetched =
            tokio::time::timeout(self.settings.job_timeout, validate_then_scrape(scraper, &label))
                .await;

        let outcome = match fetched {
            Ok(Ok(status)) => self.persist(&status, &label).await,
            Ok(Err(outcome)) => outcome,
            Err(_) => {
                tracing::warn!(
                    hospital_id = hospital.id,
                    hospital = %label,
                    timeout_secs = self.settings.job_timeout.as_secs(),
                    "Job timed out"
                );
                JobOutcome::TimedOut
            }
        };

        metrics::record_job(source.as_str(), outcome.as_str(), clock.elapsed());
        outcome
    }

    async fn persist(&self, status: &HospitalStatusCreate, label: &str) -> JobOutcome {
        match self.storage.persist_status(status).await {
            Ok(_) => {
                tracing::info!(
                    hospital_id = status.hospital_id,
                    hospital = %label,
                    color_code = %status.color_code,
                    patients_waiting = status.patients_waiting,
                    waiting_time = status.waiting_time,
                    "Status persisted"
                );
                JobOutcome::Succeeded
            }
            Err(e) => {
                tracing::error!(
                    hospital_id = status.hospital_id,
                    hospital = %label,
                    error = %format!("{e:#}"),
                    "Failed to persist status"
                );
                JobOutcome::PersistFailed
            }
        }
    }
}

/// One report key per hospital: the display label, suffixed with ` #id`
/// when several hospitals share it
fn report_keys(hospitals: &[HospitalIdentity]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for hospital in hospitals {
        *counts.entry(hospital.label()).or_default() += 1;
    }

    hospitals
        .iter()
        .map(|hospital| {
            let label = hospital.label();
            if counts.get(&label).copied().unwrap_or(0) > 1 {
                format!("{label} #{}", hospital.id)
            } else {
                label
            }
        })
        .collect()
}

async fn validate_then_scrape(
    scraper: &dyn HospitalScraper,
    label: &str,
) -> Result<HospitalStatusCreate, JobOutcome> {
    let hospital_id = scraper.hospital_id();

    match scraper.validate_data().await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(hospital_id, hospital = %label, "Validation failed, skipping");
            return Err(JobOutcome::ValidationFailed);
        }
        Err(e) => {
            tracing::error!(hospital_id, hospital = %label, error = %e, "Validation fetch failed");
            return Err(JobOutcome::ScrapeFailed);
        }
    }

    scraper.scrape().await.map_err(|e| {
        tracing::error!(hospital_id, hospital = %label, error = %e, "Scrape failed");
        JobOutcome::ScrapeFailed
    })
}

#[async_trait]
impl FleetRunner for IngestionService {
    async fn run_fleet(&self) -> Result<FleetReport, IngestError> {
        IngestionService::run_fleet(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColorCode, ColorCodeDistribution, TriageColor};
    use crate::sources::factory::constructor;
    use crate::sources::{SourceBinding, SourceCode, SourceRegistry};
    use crate::storage::MemoryStore;
    use crate::transport::{RequestOptions, Transport};
    use crate::utils::error::{FetchError, ScrapeError};

    struct NoTransport;

    #[async_trait]
    impl Transport for NoTransport {
        async fn get(&self, url: &str, _options: &RequestOptions) -> Result<String, FetchError> {
            Err(FetchError::InvalidUrl(url.to_string()))
        }
    }

    /// Strategy whose behaviour is fixed at construction
    struct Scripted {
        binding: SourceBinding,
        valid: bool,
    }

    #[async_trait]
    impl HospitalScraper for Scripted {
        fn hospital_id(&self) -> i64 {
            self.binding.hospital_id
        }

        fn source_code(&self) -> SourceCode {
            self.binding.code
        }

        async fn scrape(&self) -> Result<HospitalStatusCreate, ScrapeError> {
            Ok(HospitalStatusCreate {
                hospital_id: self.binding.hospital_id,
                color_code: ColorCode::Green,
                waiting_time: 20,
                patients_waiting: 3,
                available_beds: 5,
                color_distribution: ColorCodeDistribution::default().with(TriageColor::Green, 3),
                external_last_update: None,
                observed_at: Utc::now(),
            })
        }

        async fn validate_data(&self) -> Result<bool, FetchError> {
            Ok(self.valid)
        }
    }

    fn hospital(id: i64) -> HospitalIdentity {
        HospitalIdentity {
            id,
            name: format!("Ospedale {id}"),
            department: "Adulti".into(),
            city: "Palermo".into(),
            province: "PA".into(),
            address: None,
            latitude: None,
            longitude: None,
        }
    }

    fn service(store: Arc<MemoryStore>) -> IngestionService {
        let mut registry = SourceRegistry::new();
        registry.register(1, SourceCode::PsSciacca).unwrap();
        registry.register(2, SourceCode::PsRibera).unwrap();
        // 3 has no registry entry

        let mut factory = ScraperFactory::new(Arc::new(registry));
        factory
            .register(
                SourceCode::PsSciacca,
                constructor(|binding, _ctx| Scripted { binding, valid: true }),
            )
            .unwrap();
        factory
            .register(
                SourceCode::PsRibera,
                constructor(|binding, _ctx| Scripted { binding, valid: false }),
            )
            .unwrap();

        IngestionService::new(
            store,
            Arc::new(factory),
            ScraperContext::new(Arc::new(NoTransport)),
            IngestSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_fleet_outcomes() {
        let store = Arc::new(MemoryStore::with_hospitals([hospital(1), hospital(2), hospital(3)]));
        let report = service(store.clone()).run_fleet().await.unwrap();

        assert_eq!(report.total(), 3);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.outcomes["Ospedale 1 (Adulti)"], JobOutcome::Succeeded);
        assert_eq!(report.outcomes["Ospedale 2 (Adulti)"], JobOutcome::ValidationFailed);
        assert_eq!(report.outcomes["Ospedale 3 (Adulti)"], JobOutcome::Misconfigured);

        assert!(store.current_status(1).await.unwrap().is_some());
        assert!(store.current_status(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_shared_label_keeps_one_entry_per_hospital() {
        let twin = HospitalIdentity {
            id: 2,
            name: "Ospedale 1".into(),
            ..hospital(1)
        };
        let store = Arc::new(MemoryStore::with_hospitals([hospital(1), twin]));
        let report = service(store).run_fleet().await.unwrap();

        assert_eq!(report.total(), 2);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.outcomes["Ospedale 1 (Adulti) #1"], JobOutcome::Succeeded);
        assert_eq!(
            report.outcomes["Ospedale 1 (Adulti) #2"],
            JobOutcome::ValidationFailed
        );
    }

    #[test]
    fn test_report_keys_only_suffix_collisions() {
        let mut twin = hospital(4);
        twin.name = "Ospedale 3".into();
        let keys = report_keys(&[hospital(1), hospital(3), twin]);
        assert_eq!(
            keys,
            [
                "Ospedale 1 (Adulti)",
                "Ospedale 3 (Adulti) #3",
                "Ospedale 3 (Adulti) #4"
            ]
        );
    }

    #[tokio::test]
    async fn test_persist_failure_is_contained() {
        let store = Arc::new(MemoryStore::with_hospitals([hospital(1)]));
        store.fail_persist_for(1);

        let report = service(store.clone()).run_fleet().await.unwrap();
        assert_eq!(report.outcomes["Ospedale 1 (Adulti)"], JobOutcome::PersistFailed);
        assert_eq!(store.history_len(), 0);
    }

    #[tokio::test]
    async fn test_run_hospital() {
        let store = Arc::new(MemoryStore::with_hospitals([hospital(1), hospital(2), hospital(3)]));
        let service = service(store);

        assert!(service.run_hospital(1).await.unwrap());
        assert!(!service.run_hospital(2).await.unwrap());
        assert!(matches!(
            service.run_hospital(3).await,
            Err(IngestError::Registry(_))
        ));
        assert!(matches!(
            service.run_hospital(42).await,
            Err(IngestError::HospitalNotFound(42))
        ));
    }
}
