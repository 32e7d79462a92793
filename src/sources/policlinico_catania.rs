//! Policlinico "G. Rodolico - San Marco" Catania
//!
//! Both departments share one JSON API keyed by a numeric department id.
//! Each patient state is an object of per-colour counts plus a declared
//! `totale`. The portal still uses the legacy yellow code; `gialli` folds
//! into orange.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde_json::Value;
use std::sync::Arc;

use super::{
    parse_json, PatientState, ScraperContext, SnapshotSource, SourceBinding, SourceCode,
    SourceSnapshot,
};
use crate::parser::resolve_color;
use crate::transport::{RequestOptions, Transport};
use crate::utils::coerce_json_count;
use crate::utils::error::{ParseError, ScrapeError};

pub const BASE_URL: &str = "https://www.policlinicorodolicosanmarco.it";

const SOURCE: &str = "policlinico_catania";

const UPDATE_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

const STATES: [(&str, PatientState); 3] = [
    ("pazientiInAttesa", PatientState::Waiting),
    ("pazientiInTrattamento", PatientState::InTreatment),
    ("pazientiInObi", PatientState::Observation),
];

/// API department id and estimated capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Department {
    pub ps_id: u32,
    pub total_beds: u32,
}

pub fn department(code: SourceCode) -> Option<Department> {
    match code {
        SourceCode::PoRodolico => Some(Department {
            ps_id: 105,
            total_beds: 40,
        }),
        SourceCode::PoSanMarco => Some(Department {
            ps_id: 106,
            total_beds: 35,
        }),
        _ => None,
    }
}

pub struct PoliclinicoCataniaScraper {
    binding: SourceBinding,
    transport: Arc<dyn Transport>,
    base_url: String,
}

impl PoliclinicoCataniaScraper {
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
}

#[async_trait]
impl SnapshotSource for PoliclinicoCataniaScraper {
    fn binding(&self) -> SourceBinding {
        self.binding
    }

    async fn fetch_snapshot(&self) -> Result<SourceSnapshot, ScrapeError> {
        let department = department(self.binding.code).ok_or_else(|| {
            ParseError::MissingElement(format!("Catania department for {}", self.binding.code))
        })?;

        let url = format!("{}/api/smarteus/getpsinfo/{}", self.base_url, department.ps_id);
        let options = RequestOptions::new().header("Accept", "application/json");
        let body = self.transport.get(&url, &options).await?;

        Ok(parse_payload(&parse_json(&body)?, department)?)
    }
}

pub fn parse_payload(data: &Value, department: Department) -> Result<SourceSnapshot, ParseError> {
    let mut snapshot = SourceSnapshot::new();
    snapshot.total_beds = Some(department.total_beds);
    snapshot.source_updated_at = data
        .get("dataOraInviante")
        .and_then(Value::as_str)
        .and_then(parse_update);

    for (key, state) in STATES {
        let counts = data
            .get(key)
            .and_then(Value::as_object)
            .ok_or_else(|| ParseError::MissingField(key.to_string()))?;

        for (label, value) in counts {
            if label == "totale" {
                snapshot
                    .declared_totals
                    .push((state, coerce_json_count(Some(value))));
            } else if let Some(color) = resolve_color(label, SOURCE) {
                snapshot
                    .state_mut(state)
                    .add(color, coerce_json_count(Some(value)));
            }
        }
    }

    Ok(snapshot)
}

fn parse_update(text: &str) -> Option<NaiveDateTime> {
    match NaiveDateTime::parse_from_str(text.trim(), UPDATE_FORMAT) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!(source = SOURCE, value = text, error = %e, "Unparseable update stamp");
            None
        }
    }
}
