//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ercrowd::app::load_hospitals;
use ercrowd::models::HospitalIdentity;
use ercrowd::sources::{ScraperContext, SourceFamily};
use ercrowd::transport::{HttpTransport, RequestOptions, Transport};
use ercrowd::utils::error::FetchError;
use ercrowd::utils::retry::RetryConfig;

/// ASP Agrigento board listing all five provincial departments
pub const AGRIGENTO_BOARD: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Attese Pronto Soccorso</title></head>
<body>
<table>
  <tr><th>Presidio</th><th>Rosso</th><th>Arancione</th><th>Giallo</th><th>Verde</th><th>Azzurro</th><th>Bianco</th></tr>
  <tr><td>PS SCIACCA</td><td>1</td><td>0</td><td>2</td><td>6</td><td>1</td><td>0</td></tr>
  <tr><td>PS RIBERA</td><td>0</td><td>0</td><td>0</td><td>2</td><td>0</td><td>1</td></tr>
  <tr><td>PS AGRIGENTO</td><td>2</td><td>3</td><td>1</td><td>9</td><td>2</td><td>0</td></tr>
  <tr><td>PS CANICATTI'</td><td>0</td><td>1</td><td>0</td><td>3</td><td>0</td><td>2</td></tr>
  <tr><td>PS LICATA</td><td>0</td><td>0</td><td>0</td><td>0</td><td>0</td><td>0</td></tr>
</table>
</body>
</html>"#;

/// Policlinico Catania department payload (consistent totals)
pub const CATANIA_PAYLOAD: &str = r#"{
    "dataOraInviante": "05/03/2025 08:15:42",
    "pazientiInAttesa": {"rossi": 0, "gialli": 3, "verdi": 5, "bianchi": 1, "totale": 9},
    "pazientiInTrattamento": {"rossi": 1, "gialli": 2, "verdi": 4, "bianchi": 0, "totale": 7},
    "pazientiInObi": {"rossi": 0, "gialli": 1, "verdi": 0, "bianchi": 0, "totale": 1}
}"#;

/// The bundled hospital directory
pub fn hospitals() -> Vec<HospitalIdentity> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("hospitals.toml");
    load_hospitals(&path)
        .expect("bundled hospitals.toml")
        .into_iter()
        .map(|seed| seed.hospital)
        .collect()
}

/// Real HTTP transport with short retry delays
pub fn fast_transport() -> HttpTransport {
    HttpTransport::with_config(
        100,
        RetryConfig::with_delays(2, 10, 50),
        Duration::from_secs(5),
        "ercrowd-test",
    )
    .expect("transport")
}

/// Context pointing every family at a mock server
///
/// Agrigento and Catania resolve to their real paths; every other family
/// lands on an unmatched path and gets a 404.
pub fn mock_context(transport: Arc<dyn Transport>, server_uri: &str) -> ScraperContext {
    let mut context = ScraperContext::new(transport);
    for family in [
        SourceFamily::OspedaliRiuniti,
        SourceFamily::PoliclinicoPalermo,
        SourceFamily::AspCaltanissetta,
        SourceFamily::AspPalermo,
        SourceFamily::ArnasCivico,
        SourceFamily::AoPapardo,
        SourceFamily::PoliclinicoMessina,
    ] {
        context = context.with_endpoint(family, format!("{server_uri}/down/{}", family.as_str()));
    }
    context
        .with_endpoint(
            SourceFamily::AspAgrigento,
            format!("{server_uri}/ps/listaattesa.php"),
        )
        .with_endpoint(SourceFamily::PoliclinicoCatania, server_uri)
}

/// Transport that answers every request with a fixed body after a delay,
/// tracking how many requests are in flight at once
pub struct CountingTransport {
    body: String,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl CountingTransport {
    pub fn new(body: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            body: body.to_string(),
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for CountingTransport {
    async fn get(&self, _url: &str, _options: &RequestOptions) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.body.clone())
    }
}
