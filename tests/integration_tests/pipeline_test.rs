//! Pipeline integration tests
//!
//! Fleet runs over the bundled directory with Agrigento and Catania served
//! by a mock server and every other source unreachable.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ercrowd::app::{load_hospitals, seed_directory};
use ercrowd::ingest::JobOutcome;
use ercrowd::models::{ColorCode, TriageColor};
use ercrowd::sources::{SourceCode, SourceRegistry};
use ercrowd::storage::{HospitalDirectory, MemoryStore, SqliteStore, StatusStore, Storage};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::service;
use crate::common;

async fn mock_sources() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ps/listaattesa.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string(common::AGRIGENTO_BOARD))
        .mount(&server)
        .await;
    for ps_id in [105, 106] {
        Mock::given(method("GET"))
            .and(path(format!("/api/smarteus/getpsinfo/{ps_id}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(common::CATANIA_PAYLOAD))
            .mount(&server)
            .await;
    }
    server
}

fn id_of(code: SourceCode) -> i64 {
    SourceRegistry::standard().id_for(code).unwrap()
}

#[tokio::test]
async fn test_fleet_run_reports_every_hospital() {
    let server = mock_sources().await;
    let store = Arc::new(MemoryStore::with_hospitals(common::hospitals()));
    let context = common::mock_context(Arc::new(common::fast_transport()), &server.uri());
    let service = service(store.clone(), context, 5, Duration::from_secs(10));

    let report = service.run_fleet().await.unwrap();

    assert_eq!(report.total(), 21);
    // five Agrigento departments and two Catania departments
    assert_eq!(report.succeeded(), 7);
    assert_eq!(report.failed(), 14);
    assert_eq!(store.history_len(), 7);

    let unreachable = report
        .outcomes
        .values()
        .filter(|o| **o == JobOutcome::ScrapeFailed)
        .count();
    assert_eq!(unreachable, 14);

    let agrigento = store
        .current_status(id_of(SourceCode::PsAgrigento))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(agrigento.color_code, ColorCode::Red);
    assert_eq!(agrigento.patients_waiting, 17);

    let papardo = store.current_status(id_of(SourceCode::AoPapardo)).await.unwrap();
    assert!(papardo.is_none());
}

#[tokio::test]
async fn test_report_keys_are_hospital_labels() {
    let server = mock_sources().await;
    let hospitals = common::hospitals();
    let store = Arc::new(MemoryStore::with_hospitals(hospitals.clone()));
    let context = common::mock_context(Arc::new(common::fast_transport()), &server.uri());

    let report = service(store, context, 3, Duration::from_secs(10))
        .run_fleet()
        .await
        .unwrap();

    for hospital in &hospitals {
        assert!(
            report.results.contains_key(&hospital.label()),
            "missing {}",
            hospital.label()
        );
    }
    let licata = hospitals
        .iter()
        .find(|h| h.id == id_of(SourceCode::PsLicata))
        .unwrap();
    // an empty department is still a valid observation
    assert!(report.results[&licata.label()]);
}

#[tokio::test]
async fn test_sqlite_seed_and_repeated_runs() {
    let server = mock_sources().await;
    let dir = TempDir::new().unwrap();
    let storage: Arc<dyn Storage> =
        Arc::new(SqliteStore::new(dir.path().join("ercrowd.db")).unwrap());

    let seeds = load_hospitals(&Path::new(env!("CARGO_MANIFEST_DIR")).join("hospitals.toml"))
        .unwrap();
    let seeded = seed_directory(storage.as_ref(), &SourceRegistry::standard(), &seeds)
        .await
        .unwrap();
    assert_eq!(seeded, 21);
    assert_eq!(storage.list_hospitals().await.unwrap().len(), 21);

    let context = common::mock_context(Arc::new(common::fast_transport()), &server.uri());
    let service = service(storage.clone(), context, 5, Duration::from_secs(10));

    let sciacca = id_of(SourceCode::PsSciacca);
    assert!(service.run_hospital(sciacca).await.unwrap());
    assert!(service.run_hospital(sciacca).await.unwrap());

    let current = storage.current_status(sciacca).await.unwrap().unwrap();
    assert_eq!(current.patients_waiting, 10);
    assert_eq!(current.color_code, ColorCode::Red);
    assert_eq!(current.color_distribution.get(TriageColor::Green), 6);

    let history = storage.history(sciacca, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].scraped_at >= history[1].scraped_at);
    assert!(history.iter().all(|row| row.patients_waiting == 10));

    // untouched hospitals have neither status nor history
    let ribera = id_of(SourceCode::PsRibera);
    assert!(storage.current_status(ribera).await.unwrap().is_none());
    assert!(storage.history(ribera, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_catania_timestamp_is_carried_through() {
    let server = mock_sources().await;
    let store = Arc::new(MemoryStore::with_hospitals(common::hospitals()));
    let context = common::mock_context(Arc::new(common::fast_transport()), &server.uri());
    let service = service(store.clone(), context, 5, Duration::from_secs(10));

    let rodolico = id_of(SourceCode::PoRodolico);
    assert!(service.run_hospital(rodolico).await.unwrap());

    let status = store.current_status(rodolico).await.unwrap().unwrap();
    let published = status.external_last_update.unwrap();
    assert_eq!(published.format("%d/%m/%Y %H:%M:%S").to_string(), "05/03/2025 08:15:42");
    assert_eq!(status.patients_waiting, 9);
}
