//! Policlinico "Paolo Giaccone" Palermo REST API
//!
//! Two endpoints: `/ProntoSoccorso` publishes waiting patients and average
//! waits per colour, `/ProntoSoccorsoIndici` publishes staffed places and
//! current stays. Counts sometimes arrive as numeric strings. The API
//! publishes no update timestamp.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::{parse_json, ScraperContext, SnapshotSource, SourceBinding, SourceSnapshot};
use crate::parser::{parse_wait_time, resolve_color};
use crate::transport::{RequestOptions, Transport};
use crate::utils::error::{ParseError, ScrapeError};
use crate::utils::{coerce_json_count, first_integer};

pub const BASE_URL: &str = "https://www.policlinico.pa.it/o/PoliclinicoPaRestBuilder/v1.0";

const SOURCE: &str = "policlinico_palermo";

pub struct PoliclinicoPalermoScraper {
    binding: SourceBinding,
    transport: Arc<dyn Transport>,
    base_url: String,
}

impl PoliclinicoPalermoScraper {
    pub fn new(binding: SourceBinding, ctx: &ScraperContext) -> Self {
        Self {
            binding,
            transport: ctx.transport.clone(),
            base_url: ctx
                .base_url(binding.code.family())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl SnapshotSource for PoliclinicoPalermoScraper {
    fn binding(&self) -> SourceBinding {
        self.binding
    }

    fn requires_timestamp(&self) -> bool {
        false
    }

    async fn fetch_snapshot(&self) -> Result<SourceSnapshot, ScrapeError> {
        let options = RequestOptions::new().header("Accept", "application/json");

        let status = self
            .transport
            .get(&self.endpoint("/ProntoSoccorso"), &options)
            .await?;
        let indices = self
            .transport
            .get(&self.endpoint("/ProntoSoccorsoIndici"), &options)
            .await?;

        Ok(parse_payloads(&parse_json(&status)?, &parse_json(&indices)?)?)
    }
}

/// Build a snapshot from the status and indices payloads
pub fn parse_payloads(status: &Value, indices: &Value) -> Result<SourceSnapshot, ParseError> {
    let waiting = object_field(status, "pazientiInAttesa")?;
    let waits = object_field(status, "tempiMediAttesa")?;
    let places = indices
        .get("postiTecniciPresidiati")
        .ok_or_else(|| ParseError::MissingField("postiTecniciPresidiati".into()))?;

    let mut snapshot = SourceSnapshot::new();

    for (label, value) in waiting {
        if let Some(color) = resolve_color(label, SOURCE) {
            snapshot.waiting.add(color, coerce_json_count(Some(value)));
        }
    }

    let averages: Vec<_> = waits
        .iter()
        .filter_map(|(label, value)| {
            let color = resolve_color(label, SOURCE)?;
            let minutes = match value {
                Value::String(s) => parse_wait_time(s),
                other => coerce_json_count(Some(other)),
            };
            Some((color, minutes))
        })
        .collect();
    snapshot.average_waits = Some(averages);

    snapshot.total_beds = Some(coerce_json_count(Some(places)));
    snapshot.occupied_beds =
        Some(stay_count(indices, "permanenza24H") + stay_count(indices, "permanenzaOltre24H"));

    Ok(snapshot)
}

fn object_field<'a>(value: &'a Value, key: &str) -> Result<&'a Map<String, Value>, ParseError> {
    value
        .get(key)
        .and_then(Value::as_object)
        .ok_or_else(|| ParseError::MissingField(key.to_string()))
}

/// Stay counters come as `"12 pazienti"` or as plain numbers
fn stay_count(indices: &Value, key: &str) -> u32 {
    match indices.get(key) {
        Some(Value::String(s)) => first_integer(s).unwrap_or(0),
        other => coerce_json_count(other),
    }
}
