//! Error scenario tests
//!
//! Per-hospital failures stay inside their job; limits on concurrency,
//! job duration and manual triggering hold under load.

use std::sync::Arc;
use std::time::Duration;

use ercrowd::cache::MemoryKeyValueStore;
use ercrowd::ingest::{CooldownLimiter, IngestError, JobOutcome, ManualTrigger};
use ercrowd::models::HospitalIdentity;
use ercrowd::sources::{ScraperContext, SourceCode, SourceRegistry};
use ercrowd::storage::{MemoryStore, StatusStore};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::service;
use crate::common::{self, CountingTransport};

fn id_of(code: SourceCode) -> i64 {
    SourceRegistry::standard().id_for(code).unwrap()
}

fn agrigento_hospitals() -> Vec<HospitalIdentity> {
    let ids: Vec<i64> = [
        SourceCode::PsSciacca,
        SourceCode::PsRibera,
        SourceCode::PsAgrigento,
        SourceCode::PsCanicatti,
        SourceCode::PsLicata,
    ]
    .into_iter()
    .map(id_of)
    .collect();

    common::hospitals()
        .into_iter()
        .filter(|h| ids.contains(&h.id))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_never_exceeds_limit() {
    let transport = CountingTransport::new(common::AGRIGENTO_BOARD, Duration::from_secs(2));
    let store = Arc::new(MemoryStore::with_hospitals(common::hospitals()));
    let context = ScraperContext::new(transport.clone());

    let report = service(store, context, 3, Duration::from_secs(60))
        .run_fleet()
        .await
        .unwrap();

    assert_eq!(report.total(), 21);
    assert!(transport.calls() >= 21);
    assert_eq!(transport.max_in_flight(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_slow_sources_time_out() {
    let transport = CountingTransport::new(common::AGRIGENTO_BOARD, Duration::from_secs(120));
    let store = Arc::new(MemoryStore::with_hospitals(agrigento_hospitals()));
    let context = ScraperContext::new(transport.clone());

    let report = service(store.clone(), context, 5, Duration::from_secs(1))
        .run_fleet()
        .await
        .unwrap();

    assert_eq!(report.total(), 5);
    assert!(report.outcomes.values().all(|o| *o == JobOutcome::TimedOut));
    assert_eq!(store.history_len(), 0);
}

#[tokio::test]
async fn test_persist_failure_is_isolated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ps/listaattesa.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string(common::AGRIGENTO_BOARD))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::with_hospitals(agrigento_hospitals()));
    let sciacca = id_of(SourceCode::PsSciacca);
    store.fail_persist_for(sciacca);

    let context = common::mock_context(Arc::new(common::fast_transport()), &server.uri());
    let report = service(store.clone(), context, 5, Duration::from_secs(10))
        .run_fleet()
        .await
        .unwrap();

    assert_eq!(report.succeeded(), 4);
    assert_eq!(
        report
            .outcomes
            .values()
            .filter(|o| **o == JobOutcome::PersistFailed)
            .count(),
        1
    );
    assert_eq!(store.history_len(), 4);
    assert!(store.current_status(sciacca).await.unwrap().is_none());
}

#[tokio::test]
async fn test_inconsistent_totals_write_nothing() {
    let server = MockServer::start().await;
    let payload = common::CATANIA_PAYLOAD.replace(r#""totale": 9"#, r#""totale": 12"#);
    Mock::given(method("GET"))
        .and(path("/api/smarteus/getpsinfo/105"))
        .respond_with(ResponseTemplate::new(200).set_body_string(payload))
        .mount(&server)
        .await;

    let rodolico = id_of(SourceCode::PoRodolico);
    let store = Arc::new(MemoryStore::with_hospitals(
        common::hospitals().into_iter().filter(|h| h.id == rodolico),
    ));
    let context = common::mock_context(Arc::new(common::fast_transport()), &server.uri());

    let report = service(store.clone(), context, 5, Duration::from_secs(10))
        .run_fleet()
        .await
        .unwrap();

    assert_eq!(report.total(), 1);
    assert!(report
        .outcomes
        .values()
        .all(|o| *o == JobOutcome::ValidationFailed));
    assert!(store.current_status(rodolico).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unregistered_hospital_is_misconfigured() {
    let stray = HospitalIdentity {
        id: 500,
        name: "Ospedale di prova".into(),
        department: "Pronto Soccorso".into(),
        city: "Enna".into(),
        province: "EN".into(),
        address: None,
        latitude: None,
        longitude: None,
    };
    let store = Arc::new(MemoryStore::with_hospitals([stray]));
    let context = ScraperContext::new(Arc::new(common::fast_transport()));
    let service = service(store, context, 5, Duration::from_secs(10));

    let report = service.run_fleet().await.unwrap();
    assert_eq!(report.outcomes.values().next(), Some(&JobOutcome::Misconfigured));

    assert!(matches!(
        service.run_hospital(500).await,
        Err(IngestError::Registry(_))
    ));
    assert!(matches!(
        service.run_hospital(501).await,
        Err(IngestError::HospitalNotFound(501))
    ));
}

#[tokio::test]
async fn test_manual_trigger_cooldown() {
    let store = Arc::new(MemoryStore::new());
    let context = ScraperContext::new(Arc::new(common::fast_transport()));
    let service = Arc::new(service(store, context, 5, Duration::from_secs(10)));
    let limiter = CooldownLimiter::new(
        Arc::new(MemoryKeyValueStore::new()),
        "scrape_last_run",
        Duration::from_secs(900),
    );
    let trigger = ManualTrigger::new(service, limiter);

    let first = trigger.run_fleet_now().await.unwrap();
    assert_eq!(first.total(), 0);

    match trigger.run_fleet_now().await {
        Err(IngestError::RateLimited(e)) => {
            assert!(e.remaining() > Duration::ZERO);
            assert!(e.remaining() <= Duration::from_secs(900));
        }
        other => panic!("expected rate limit, got {other:?}"),
    }

    // single-hospital runs bypass the cooldown
    assert!(matches!(
        trigger.run_hospital_now(1).await,
        Err(IngestError::HospitalNotFound(1))
    ));
}
