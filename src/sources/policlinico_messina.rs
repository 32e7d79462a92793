//! Policlinico "G. Martino" Messina
//!
//! A bordered table with one row per patient state and one column per
//! colour, ordered from least to most critical.

use async_trait::async_trait;
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use std::sync::Arc;

use super::{PatientState, ScraperContext, SnapshotSource, SourceBinding, SourceSnapshot};
use crate::models::TriageColor;
use crate::parser::html::{count_cell, parse_selector, require, text_of};
use crate::parser::DateGrammar;
use crate::transport::{RequestOptions, Transport};
use crate::utils::error::{ParseError, ScrapeError};

pub const BASE_URL: &str = "https://www.polime.it/ps_view.php?PS=1";

const SOURCE: &str = "policlinico_messina";

/// Bianco, verde, azzurro, arancione, rosso
const COLUMNS: [TriageColor; 5] = [
    TriageColor::White,
    TriageColor::Green,
    TriageColor::Blue,
    TriageColor::Orange,
    TriageColor::Red,
];

lazy_static! {
    static ref STAMP: Selector = parse_selector!(r#"td[style="font-size:30px;"]"#);
    static ref TABLE: Selector = parse_selector!(r#"table[border="1"]"#);
    static ref ROW: Selector = parse_selector!("tr");
    static ref DATA_CELL: Selector = parse_selector!("td");
}

pub struct PoliclinicoMessinaScraper {
    binding: SourceBinding,
    transport: Arc<dyn Transport>,
    url: String,
}

impl PoliclinicoMessinaScraper {
    pub fn new(binding: SourceBinding, ctx: &ScraperContext) -> Self {
        Self {
            binding,
            transport: ctx.transport.clone(),
            url: ctx.base_url(binding.code.family()),
        }
    }
}

#[async_trait]
impl SnapshotSource for PoliclinicoMessinaScraper {
    fn binding(&self) -> SourceBinding {
        self.binding
    }

    async fn fetch_snapshot(&self) -> Result<SourceSnapshot, ScrapeError> {
        let body = self.transport.get(&self.url, &RequestOptions::new()).await?;
        Ok(parse_page(&body)?)
    }
}

pub fn parse_page(html: &str) -> Result<SourceSnapshot, ParseError> {
    let document = Html::parse_document(html);
    let table = require(document.root_element(), &TABLE, "patient table")?;

    let mut snapshot = SourceSnapshot::new();
    snapshot.source_updated_at = document
        .select(&STAMP)
        .next()
        .and_then(|el| DateGrammar::DayMonthYear.parse(&text_of(el)));

    for row in table.select(&ROW).skip(1) {
        let cells: Vec<String> = row.select(&DATA_CELL).map(text_of).collect();
        if cells.len() <= COLUMNS.len() {
            continue;
        }

        let state = PatientState::from_header(&cells[0]).unwrap_or(PatientState::Waiting);
        let distribution = snapshot.state_mut(state);
        for (cell, color) in cells[1..].iter().zip(COLUMNS) {
            distribution.add(color, count_cell(cell, SOURCE, color.as_str()));
        }
    }

    Ok(snapshot)
}
