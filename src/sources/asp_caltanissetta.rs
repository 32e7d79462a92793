//! ASP Caltanissetta dashboard (P.O. Sant'Elia)

use async_trait::async_trait;
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use std::sync::Arc;

use super::{PatientState, ScraperContext, SnapshotSource, SourceBinding, SourceSnapshot};
use crate::models::TriageColor;
use crate::parser::html::{count_cell, parse_selector, text_of};
use crate::parser::DateGrammar;
use crate::transport::{RequestOptions, Transport};
use crate::utils::error::{ParseError, ScrapeError};

pub const BASE_URL: &str = "https://cruscottops.asp.cl.it/caltanissetta.php";

const SOURCE: &str = "asp_caltanissetta";

/// Estimated capacity; the dashboard publishes none
const TOTAL_BEDS: u32 = 30;

const COLUMNS: [TriageColor; 5] = [
    TriageColor::Red,
    TriageColor::Orange,
    TriageColor::Blue,
    TriageColor::Green,
    TriageColor::White,
];

lazy_static! {
    static ref ROW: Selector = parse_selector!("tr");
    static ref DATA_CELL: Selector = parse_selector!("td");
    static ref UPDATE_TIME: Selector = parse_selector!(".update-time");
}

pub struct AspCaltanissettaScraper {
    binding: SourceBinding,
    transport: Arc<dyn Transport>,
    url: String,
}

impl AspCaltanissettaScraper {
    pub fn new(binding: SourceBinding, ctx: &ScraperContext) -> Self {
        Self {
            binding,
            transport: ctx.transport.clone(),
            url: ctx.base_url(binding.code.family()),
        }
    }
}

#[async_trait]
impl SnapshotSource for AspCaltanissettaScraper {
    fn binding(&self) -> SourceBinding {
        self.binding
    }

    async fn fetch_snapshot(&self) -> Result<SourceSnapshot, ScrapeError> {
        let body = self.transport.get(&self.url, &RequestOptions::new()).await?;
        Ok(parse_dashboard(&body)?)
    }
}

pub fn parse_dashboard(html: &str) -> Result<SourceSnapshot, ParseError> {
    let document = Html::parse_document(html);

    let mut snapshot = SourceSnapshot::new();
    snapshot.total_beds = Some(TOTAL_BEDS);
    snapshot.source_updated_at = document
        .select(&UPDATE_TIME)
        .next()
        .and_then(|el| DateGrammar::DashedDayMonthYear.parse(&text_of(el)));

    let mut recognised = 0;
    for row in document.select(&ROW) {
        let row_text = text_of(row);
        let state = if row_text.contains("In attesa") {
            PatientState::Waiting
        } else if row_text.contains("In trattamento") {
            PatientState::InTreatment
        } else {
            continue;
        };

        let mut cells: Vec<String> = row.select(&DATA_CELL).map(text_of).collect();
        if cells.is_empty() {
            continue;
        }
        // Label rendered as a data cell
        if cells.len() > COLUMNS.len() && !cells[0].chars().any(|c| c.is_ascii_digit()) {
            cells.remove(0);
        }

        let distribution = snapshot.state_mut(state);
        for (cell, color) in cells.iter().zip(COLUMNS) {
            distribution.add(color, count_cell(cell, SOURCE, color.as_str()));
        }
        recognised += 1;
    }

    if recognised == 0 {
        return Err(ParseError::MissingElement("waiting / in treatment rows".into()));
    }

    Ok(snapshot)
}
