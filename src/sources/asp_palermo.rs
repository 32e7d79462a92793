//! ASP Palermo emergency departments
//!
//! One page lists every provincial emergency department in its own
//! `div.container`. Each container carries an `.alert-dark` update stamp and
//! a table whose rows (waiting, in treatment, in observation) are named by a
//! row header and whose columns are the five triage colours.

use async_trait::async_trait;
use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;

use super::{PatientState, ScraperContext, SnapshotSource, SourceBinding, SourceCode, SourceSnapshot};
use crate::models::TriageColor;
use crate::parser::html::{column_colors, count_cell, parse_selector, require, text_of};
use crate::parser::DateGrammar;
use crate::transport::{RequestOptions, Transport};
use crate::utils::error::{ParseError, ScrapeError};
use crate::utils::normalize_whitespace;

pub const BASE_URL: &str = "https://www.asppalermo.org/attese_ps/index_mod2.php";

const SOURCE: &str = "asp_palermo";

/// Column order used when the header row names no colours
const DEFAULT_COLUMNS: [TriageColor; 5] = [
    TriageColor::Red,
    TriageColor::Orange,
    TriageColor::Blue,
    TriageColor::Green,
    TriageColor::White,
];

lazy_static! {
    static ref CONTAINER: Selector = parse_selector!("div.container");
    static ref UPDATE_STAMP: Selector = parse_selector!(".alert-dark");
    static ref TABLE: Selector = parse_selector!("table");
    static ref ROW: Selector = parse_selector!("tr");
    static ref HEADER_CELL: Selector = parse_selector!("th");
    static ref DATA_CELL: Selector = parse_selector!("td");
}

/// Container heading and bed capacity of one department
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Department {
    pub display_name: &'static str,
    pub total_beds: u32,
}

/// Department published for a code
pub fn department(code: SourceCode) -> Option<Department> {
    let (display_name, total_beds) = match code {
        SourceCode::PsIngrassia => ("PRONTO SOCCORSO - INGRASSIA DI PALERMO", 13),
        SourceCode::PsPartinico => ("PRONTO SOCCORSO - CIVICO DI PARTINICO", 11),
        SourceCode::PsCorleone => ("PRONTO SOCCORSO - P.O. 'DEI BIANCHI' DI CORLEONE", 6),
        SourceCode::PsPetralia => {
            ("PRONTO SOCCORSO - MADONNA SS. DELL'ALTO DI PETRALIA SOTTANA", 10)
        }
        SourceCode::PsTermini => ("PRONTO SOCCORSO - CIMINO DI TERMINI IMERESE", 8),
        _ => return None,
    };
    Some(Department {
        display_name,
        total_beds,
    })
}

pub struct AspPalermoScraper {
    binding: SourceBinding,
    transport: Arc<dyn Transport>,
    url: String,
}

impl AspPalermoScraper {
    pub fn new(binding: SourceBinding, ctx: &ScraperContext) -> Self {
        Self {
            binding,
            transport: ctx.transport.clone(),
            url: ctx.base_url(binding.code.family()),
        }
    }
}

#[async_trait]
impl SnapshotSource for AspPalermoScraper {
    fn binding(&self) -> SourceBinding {
        self.binding
    }

    async fn fetch_snapshot(&self) -> Result<SourceSnapshot, ScrapeError> {
        let department = department(self.binding.code).ok_or_else(|| {
            ParseError::MissingElement(format!("ASP Palermo department for {}", self.binding.code))
        })?;

        let body = self.transport.get(&self.url, &RequestOptions::new()).await?;
        Ok(parse_page(&body, department)?)
    }
}

/// Extract one department's snapshot from the shared page
pub fn parse_page(html: &str, department: Department) -> Result<SourceSnapshot, ParseError> {
    let document = Html::parse_document(html);
    let wanted = normalize_whitespace(department.display_name);

    // Nested containers all contain the name; the innermost comes last
    let section = document
        .select(&CONTAINER)
        .filter(|c| text_of(*c).contains(&wanted))
        .last()
        .ok_or_else(|| ParseError::MissingElement(format!("container '{wanted}'")))?;

    let mut snapshot = SourceSnapshot::new();
    snapshot.total_beds = Some(department.total_beds);
    snapshot.source_updated_at = section
        .select(&UPDATE_STAMP)
        .next()
        .and_then(|stamp| DateGrammar::ShortYearDash.parse(&text_of(stamp)));

    let table = require(section, &TABLE, "department table")?;
    let mut rows = table.select(&ROW);
    let header = rows
        .next()
        .ok_or_else(|| ParseError::MissingElement("table header".into()))?;
    let columns = header_columns(header);

    let mut recognised = 0;
    for row in rows {
        let label = match row.select(&HEADER_CELL).next() {
            Some(th) => text_of(th),
            None => continue,
        };
        let Some(state) = PatientState::from_header(&label) else {
            continue;
        };

        let distribution = snapshot.state_mut(state);
        for (cell, color) in row.select(&DATA_CELL).zip(columns.iter()) {
            if let Some(color) = color {
                distribution.add(*color, count_cell(&text_of(cell), SOURCE, color.as_str()));
            }
        }
        recognised += 1;
    }

    if recognised == 0 {
        return Err(ParseError::MissingElement("patient state rows".into()));
    }

    Ok(snapshot)
}

fn header_columns(header: ElementRef<'_>) -> Vec<Option<TriageColor>> {
    let labels: Vec<String> = header
        .select(&HEADER_CELL)
        .chain(header.select(&DATA_CELL))
        .map(text_of)
        .collect();

    column_colors(&labels).unwrap_or_else(|| DEFAULT_COLUMNS.iter().map(|c| Some(*c)).collect())
}
