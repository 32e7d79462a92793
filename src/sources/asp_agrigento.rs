//! ASP Agrigento wall board
//!
//! A single table lists every provincial emergency department, one row per
//! hospital. Cells after the name hold the waiting count per colour, often
//! prefixed by a label (`"Rossi 2"`). The board still publishes the legacy
//! yellow code, which folds into orange. No timestamp and no bed data.

use async_trait::async_trait;
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use std::sync::Arc;

use super::{ScraperContext, SnapshotSource, SourceBinding, SourceCode, SourceSnapshot};
use crate::models::TriageColor;
use crate::parser::html::{column_colors, parse_selector, text_of, trailing_count};
use crate::transport::{RequestOptions, Transport};
use crate::utils::error::{ParseError, ScrapeError};

pub const BASE_URL: &str = "http://pswall.aspag.it/ps/listaattesa.php";

const SOURCE: &str = "asp_agrigento";

/// Rosso, arancione, giallo, verde, azzurro, bianco
const DEFAULT_COLUMNS: [TriageColor; 6] = [
    TriageColor::Red,
    TriageColor::Orange,
    TriageColor::Orange,
    TriageColor::Green,
    TriageColor::Blue,
    TriageColor::White,
];

lazy_static! {
    static ref ROW: Selector = parse_selector!("tr");
    static ref HEADER_CELL: Selector = parse_selector!("th");
    static ref DATA_CELL: Selector = parse_selector!("td");
}

/// Name of the hospital's row on the board
pub fn board_name(code: SourceCode) -> Option<&'static str> {
    match code {
        SourceCode::PsSciacca => Some("PS SCIACCA"),
        SourceCode::PsRibera => Some("PS RIBERA"),
        SourceCode::PsAgrigento => Some("PS AGRIGENTO"),
        SourceCode::PsCanicatti => Some("PS CANICATTI'"),
        SourceCode::PsLicata => Some("PS LICATA"),
        _ => None,
    }
}

pub struct AspAgrigentoScraper {
    binding: SourceBinding,
    transport: Arc<dyn Transport>,
    url: String,
}

impl AspAgrigentoScraper {
    pub fn new(binding: SourceBinding, ctx: &ScraperContext) -> Self {
        Self {
            binding,
            transport: ctx.transport.clone(),
            url: ctx.base_url(binding.code.family()),
        }
    }
}

#[async_trait]
impl SnapshotSource for AspAgrigentoScraper {
    fn binding(&self) -> SourceBinding {
        self.binding
    }

    fn requires_timestamp(&self) -> bool {
        false
    }

    async fn fetch_snapshot(&self) -> Result<SourceSnapshot, ScrapeError> {
        let name = board_name(self.binding.code).ok_or_else(|| {
            ParseError::MissingElement(format!("ASP Agrigento row for {}", self.binding.code))
        })?;

        let body = self.transport.get(&self.url, &RequestOptions::new()).await?;
        Ok(parse_board(&body, name)?)
    }
}

/// Extract one hospital's row from the board
pub fn parse_board(html: &str, name: &str) -> Result<SourceSnapshot, ParseError> {
    let document = Html::parse_document(html);
    let wanted = fold_name(name);

    let mut columns: Vec<Option<TriageColor>> = DEFAULT_COLUMNS.iter().map(|c| Some(*c)).collect();

    for row in document.select(&ROW) {
        let headers: Vec<String> = row.select(&HEADER_CELL).map(text_of).collect();
        if !headers.is_empty() {
            if let Some(found) = column_colors(&headers) {
                columns = found;
            }
            continue;
        }

        let cells: Vec<String> = row.select(&DATA_CELL).map(text_of).collect();
        let Some((first, counts)) = cells.split_first() else {
            continue;
        };
        if fold_name(first) != wanted {
            continue;
        }

        let mut snapshot = SourceSnapshot::new();
        for (cell, color) in counts.iter().zip(columns.iter()) {
            if let Some(color) = color {
                snapshot
                    .waiting
                    .add(*color, trailing_count(cell, SOURCE, color.as_str()));
            }
        }
        return Ok(snapshot);
    }

    Err(ParseError::MissingElement(format!("board row '{name}'")))
}

/// Case, accent and apostrophe insensitive hospital name
fn fold_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
        .chars()
        .filter_map(|c| match c {
            '\'' | '’' | '`' => None,
            'À' => Some('A'),
            'È' | 'É' => Some('E'),
            'Ì' => Some('I'),
            'Ò' => Some('O'),
            'Ù' => Some('U'),
            other => Some(other),
        })
        .collect()
}
