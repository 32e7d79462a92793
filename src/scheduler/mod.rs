//! Periodic fleet runs
//!
//! A [`FleetScheduler`] fires on a fixed interval and hands each firing to a
//! [`FleetRunner`]. At most one run is in flight: a firing that arrives while
//! a run is still executing is skipped, never queued.
//!
//! ```text
//! tick ──► in flight? ──yes──► Tick::Skipped
//!              │
//!              no
//!              ▼
//!        spawn run_fleet ──► log summary ──► release guard
//! ```
//!
//! # Example
//!
//! ```ignore
//! use ercrowd::scheduler::FleetScheduler;
//!
//! let scheduler = Arc::new(FleetScheduler::from_config(service, &config.scraper)?);
//! let handle = scheduler.spawn()?;
//! tokio::signal::ctrl_c().await?;
//! handle.shutdown().await?;
//! ```

pub mod error;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::ScraperConfig;
use crate::ingest::FleetRunner;
use crate::metrics;

pub use error::{SchedulerError, SchedulerResult};

/// What a single firing did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Started,
    /// A previous run was still in flight
    Skipped,
}

pub struct FleetScheduler {
    runner: Arc<dyn FleetRunner>,
    interval: Duration,
    in_flight: Arc<AtomicBool>,
    loop_started: AtomicBool,
}

/// Clears the in-flight flag when the run ends, panics included
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl FleetScheduler {
    pub fn new(runner: Arc<dyn FleetRunner>, interval: Duration) -> SchedulerResult<Self> {
        if interval.is_zero() {
            return Err(SchedulerError::invalid_interval(0));
        }

        Ok(Self {
            runner,
            interval,
            in_flight: Arc::new(AtomicBool::new(false)),
            loop_started: AtomicBool::new(false),
        })
    }

    pub fn from_config(
        runner: Arc<dyn FleetRunner>,
        config: &ScraperConfig,
    ) -> SchedulerResult<Self> {
        if !config.enabled {
            return Err(SchedulerError::Disabled);
        }
        if config.interval_secs == 0 {
            return Err(SchedulerError::invalid_interval(config.interval_secs));
        }
        Self::new(runner, Duration::from_secs(config.interval_secs))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a fleet run is currently executing
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Fire once, outside the periodic loop
    pub fn fire(&self) -> Tick {
        match self.start_run() {
            Some(_) => Tick::Started,
            None => Tick::Skipped,
        }
    }

    fn start_run(&self) -> Option<JoinHandle<()>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("Previous fleet run still in progress, skipping this firing");
            return None;
        }

        let guard = InFlightGuard(self.in_flight.clone());
        let runner = self.runner.clone();
        metrics::record_fleet_run("scheduled");

        Some(tokio::spawn(async move {
            let _guard = guard;
            match runner.run_fleet().await {
                Ok(report) => tracing::info!(
                    succeeded = report.succeeded(),
                    failed = report.failed(),
                    total = report.total(),
                    "Scheduled fleet run completed"
                ),
                Err(e) => tracing::error!(error = %e, "Scheduled fleet run failed"),
            }
        }))
    }

    /// Start the periodic loop
    ///
    /// The first firing happens immediately. Dropping the returned handle
    /// stops the loop as well.
    pub fn spawn(self: Arc<Self>) -> SchedulerResult<SchedulerHandle> {
        if self.loop_started.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRunning);
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let scheduler = self.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scheduler.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut current: Option<JoinHandle<()>> = None;

            tracing::info!(
                interval_secs = scheduler.interval.as_secs(),
                "Fleet scheduler started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Some(run) = scheduler.start_run() {
                            current = Some(run);
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }

            if let Some(run) = current {
                if !run.is_finished() {
                    tracing::info!("Waiting for in-flight fleet run before stopping");
                }
                if let Err(e) = run.await {
                    tracing::error!(error = %e, "Fleet run task ended abnormally");
                }
            }

            scheduler.loop_started.store(false, Ordering::SeqCst);
            tracing::info!("Fleet scheduler stopped");
        });

        Ok(SchedulerHandle { stop_tx, task })
    }
}

/// Handle to a running scheduler loop
pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop firing and wait for any in-flight run to finish
    pub async fn shutdown(self) -> SchedulerResult<()> {
        let _ = self.stop_tx.send(true);
        self.task.await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{FleetReport, IngestError};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;

    /// Runner that sleeps for `run_time` and counts calls
    struct SlowRunner {
        calls: AtomicUsize,
        run_time: Duration,
    }

    impl SlowRunner {
        fn new(run_time: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                run_time,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FleetRunner for SlowRunner {
        async fn run_fleet(&self) -> Result<FleetReport, IngestError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.run_time).await;
            Ok(FleetReport {
                results: BTreeMap::new(),
                outcomes: BTreeMap::new(),
                started_at: Utc::now(),
                duration: self.run_time,
            })
        }
    }

    struct PanickingRunner;

    #[async_trait]
    impl FleetRunner for PanickingRunner {
        async fn run_fleet(&self) -> Result<FleetReport, IngestError> {
            panic!("runner exploded");
        }
    }

    #[test]
    fn test_rejects_zero_interval() {
        let runner = SlowRunner::new(Duration::ZERO);
        assert!(matches!(
            FleetScheduler::new(runner, Duration::ZERO),
            Err(SchedulerError::InvalidInterval { secs: 0 })
        ));
    }

    #[test]
    fn test_disabled_by_config() {
        let config = ScraperConfig {
            enabled: false,
            ..ScraperConfig::default()
        };
        let runner = SlowRunner::new(Duration::ZERO);
        assert!(matches!(
            FleetScheduler::from_config(runner, &config),
            Err(SchedulerError::Disabled)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_firing_is_skipped() {
        let runner = SlowRunner::new(Duration::from_secs(5));
        let scheduler = FleetScheduler::new(runner.clone(), Duration::from_secs(60)).unwrap();

        assert_eq!(scheduler.fire(), Tick::Started);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(scheduler.fire(), Tick::Skipped);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(runner.calls(), 1);
        assert!(!scheduler.is_busy());

        // free again once the run has finished
        assert_eq!(scheduler.fire(), Tick::Started);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_run_releases_guard() {
        let scheduler = FleetScheduler::new(Arc::new(PanickingRunner), Duration::from_secs(60))
            .unwrap();

        assert_eq!(scheduler.fire(), Tick::Started);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!scheduler.is_busy());
        assert_eq!(scheduler.fire(), Tick::Started);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_suppresses_ticks_during_run() {
        let runner = SlowRunner::new(Duration::from_secs(5));
        let scheduler =
            Arc::new(FleetScheduler::new(runner.clone(), Duration::from_secs(1)).unwrap());

        let handle = scheduler.clone().spawn().unwrap();
        assert!(matches!(
            scheduler.clone().spawn(),
            Err(SchedulerError::AlreadyRunning)
        ));

        tokio::time::sleep(Duration::from_millis(4500)).await;
        assert_eq!(runner.calls(), 1);

        handle.shutdown().await.unwrap();
        assert!(!scheduler.is_busy());
    }
}
