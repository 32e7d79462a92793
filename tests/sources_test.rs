//! Strategies built by the factory, run against mocked source endpoints

mod common;

use std::sync::Arc;

use ercrowd::models::{ColorCode, TriageColor};
use ercrowd::sources::{
    HospitalScraper, ScraperContext, ScraperFactory, SourceCode, SourceFamily, SourceRegistry,
};
use ercrowd::utils::error::{FetchError, ScrapeError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn factory() -> ScraperFactory {
    ScraperFactory::standard(Arc::new(SourceRegistry::standard()))
}

fn context(server: &MockServer) -> ScraperContext {
    common::mock_context(Arc::new(common::fast_transport()), &server.uri())
}

async fn mount(server: &MockServer, at: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[test]
fn test_every_code_has_a_strategy() {
    let factory = factory();
    let available = factory.available_sources();

    for code in SourceCode::ALL {
        assert!(available.contains(&code), "{code} has no strategy");
    }
}

#[tokio::test]
async fn test_factory_binds_hospital_and_code() {
    let server = MockServer::start().await;
    let factory = factory();
    let registry = SourceRegistry::standard();

    for (id, code) in registry.entries() {
        let scraper = factory.create(id, &context(&server)).unwrap();
        assert_eq!(scraper.hospital_id(), id);
        assert_eq!(scraper.source_code(), code);
    }

    assert!(factory.create(99, &context(&server)).is_err());
}

#[tokio::test]
async fn test_agrigento_scrape_through_factory() {
    let server = MockServer::start().await;
    mount(&server, "/ps/listaattesa.php", common::AGRIGENTO_BOARD).await;

    let registry = SourceRegistry::standard();
    let id = registry.id_for(SourceCode::PsAgrigento).unwrap();
    let scraper = factory().create(id, &context(&server)).unwrap();

    assert!(scraper.validate_data().await.unwrap());

    let status = scraper.scrape().await.unwrap();
    assert_eq!(status.hospital_id, id);
    assert_eq!(status.color_code, ColorCode::Red);
    // giallo folds into orange
    assert_eq!(status.color_distribution.get(TriageColor::Orange), 4);
    assert_eq!(status.patients_waiting, 17);
    assert!(status.external_last_update.is_none());
}

#[tokio::test]
async fn test_catania_departments_use_their_own_ids() {
    let server = MockServer::start().await;
    mount(&server, "/api/smarteus/getpsinfo/105", common::CATANIA_PAYLOAD).await;

    let registry = SourceRegistry::standard();
    let factory = factory();

    let rodolico = factory
        .create(registry.id_for(SourceCode::PoRodolico).unwrap(), &context(&server))
        .unwrap();
    assert!(rodolico.validate_data().await.unwrap());
    let status = rodolico.scrape().await.unwrap();
    assert_eq!(status.patients_waiting, 9);
    assert_eq!(status.color_code, ColorCode::Orange);
    assert!(status.external_last_update.is_some());

    // San Marco (106) is not mounted: a transport failure, not a validation failure
    let san_marco = factory
        .create(registry.id_for(SourceCode::PoSanMarco).unwrap(), &context(&server))
        .unwrap();
    assert!(matches!(
        san_marco.validate_data().await,
        Err(FetchError::Status { status: 404, .. })
    ));
}

#[tokio::test]
async fn test_malformed_payload_fails_validation() {
    let server = MockServer::start().await;
    mount(&server, "/api/smarteus/getpsinfo/105", "<html>maintenance</html>").await;

    let registry = SourceRegistry::standard();
    let scraper = factory()
        .create(registry.id_for(SourceCode::PoRodolico).unwrap(), &context(&server))
        .unwrap();

    assert!(!scraper.validate_data().await.unwrap());
    assert!(matches!(scraper.scrape().await, Err(ScrapeError::Parse(_))));
}

#[tokio::test]
async fn test_color_distribution_matches_scrape() {
    let server = MockServer::start().await;
    mount(&server, "/ps/listaattesa.php", common::AGRIGENTO_BOARD).await;

    let registry = SourceRegistry::standard();
    let scraper = factory()
        .create(registry.id_for(SourceCode::PsSciacca).unwrap(), &context(&server))
        .unwrap();

    let distribution = scraper.color_distribution().await.unwrap();
    let status = scraper.scrape().await.unwrap();
    assert_eq!(distribution, status.color_distribution);
    assert_eq!(distribution.total(), 10);
}

#[test]
fn test_endpoint_override() {
    let transport = Arc::new(common::fast_transport());
    let context = ScraperContext::new(transport)
        .with_endpoint(SourceFamily::AoPapardo, "http://127.0.0.1:8080/ps");

    assert_eq!(context.base_url(SourceFamily::AoPapardo), "http://127.0.0.1:8080/ps");
    assert_eq!(
        context.base_url(SourceFamily::AspAgrigento),
        SourceFamily::AspAgrigento.default_base_url()
    );
}
