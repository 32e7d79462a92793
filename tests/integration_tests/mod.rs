//! Integration tests module

pub mod error_scenarios;
pub mod pipeline_test;

use std::sync::Arc;
use std::time::Duration;

use ercrowd::ingest::{IngestSettings, IngestionService};
use ercrowd::sources::{ScraperContext, ScraperFactory, SourceRegistry};
use ercrowd::storage::Storage;

/// Service over the standard registry with the given limits
pub fn service(
    storage: Arc<dyn Storage>,
    context: ScraperContext,
    max_concurrent_jobs: usize,
    job_timeout: Duration,
) -> IngestionService {
    let factory = ScraperFactory::standard(Arc::new(SourceRegistry::standard()));
    IngestionService::new(
        storage,
        Arc::new(factory),
        context,
        IngestSettings {
            max_concurrent_jobs,
            job_timeout,
        },
    )
}
