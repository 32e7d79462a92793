//! ARNAS Civico Palermo
//!
//! The article body holds two `table.gridtable` elements, adult first and
//! paediatric second. Rows between the header and the totals row are one
//! colour each, with waiting / in treatment / in observation columns.

use async_trait::async_trait;
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use std::sync::Arc;

use super::{ScraperContext, SnapshotSource, SourceBinding, SourceCode, SourceSnapshot};
use crate::parser::dates::parse_any;
use crate::parser::html::{count_cell, parse_selector, require, text_of};
use crate::parser::{resolve_color, DateGrammar};
use crate::transport::{RequestOptions, Transport};
use crate::utils::error::{ParseError, ScrapeError};

pub const BASE_URL: &str =
    "https://www.arnascivico.it/index.php/assistenza-ospedaliera/3415-attesa-al-pronto-soccorso";

const SOURCE: &str = "arnas_civico";

lazy_static! {
    static ref ARTICLE_BODY: Selector = parse_selector!("div[itemprop=articleBody]");
    static ref GRID_TABLE: Selector = parse_selector!("table.gridtable");
    static ref ROW: Selector = parse_selector!("tr");
    static ref DATA_CELL: Selector = parse_selector!("td");
}

/// Position of the unit's table and its estimated capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unit {
    pub table_index: usize,
    pub total_beds: u32,
}

pub fn unit(code: SourceCode) -> Option<Unit> {
    match code {
        SourceCode::PoCivicoAdulti => Some(Unit {
            table_index: 0,
            total_beds: 30,
        }),
        SourceCode::PoCivicoPediatrico => Some(Unit {
            table_index: 1,
            total_beds: 15,
        }),
        _ => None,
    }
}

pub struct ArnasCivicoScraper {
    binding: SourceBinding,
    transport: Arc<dyn Transport>,
    url: String,
}

impl ArnasCivicoScraper {
    pub fn new(binding: SourceBinding, ctx: &ScraperContext) -> Self {
        Self {
            binding,
            transport: ctx.transport.clone(),
            url: ctx.base_url(binding.code.family()),
        }
    }
}

#[async_trait]
impl SnapshotSource for ArnasCivicoScraper {
    fn binding(&self) -> SourceBinding {
        self.binding
    }

    async fn fetch_snapshot(&self) -> Result<SourceSnapshot, ScrapeError> {
        let unit = unit(self.binding.code).ok_or_else(|| {
            ParseError::MissingElement(format!("ARNAS Civico table for {}", self.binding.code))
        })?;

        let body = self.transport.get(&self.url, &RequestOptions::new()).await?;
        Ok(parse_page(&body, unit)?)
    }
}

pub fn parse_page(html: &str, unit: Unit) -> Result<SourceSnapshot, ParseError> {
    let document = Html::parse_document(html);
    let article = require(document.root_element(), &ARTICLE_BODY, "article body")?;

    let table = article
        .select(&GRID_TABLE)
        .nth(unit.table_index)
        .ok_or_else(|| ParseError::MissingElement(format!("grid table #{}", unit.table_index)))?;

    let mut snapshot = SourceSnapshot::new();
    snapshot.total_beds = Some(unit.total_beds);
    snapshot.source_updated_at = parse_any(
        &text_of(article),
        &[DateGrammar::DayMonthYear, DateGrammar::TimeBeforeDate],
    );

    let rows: Vec<_> = table.select(&ROW).collect();
    // Skip the header and the totals row
    let body_rows = rows.get(1..rows.len().saturating_sub(1)).unwrap_or_default();

    let mut recognised = 0;
    for row in body_rows {
        let cells: Vec<String> = row.select(&DATA_CELL).map(text_of).collect();
        if cells.len() < 4 {
            continue;
        }
        let Some(color) = resolve_color(&cells[0], SOURCE) else {
            continue;
        };

        snapshot.waiting.add(color, count_cell(&cells[1], SOURCE, "attesa"));
        snapshot
            .in_treatment
            .add(color, count_cell(&cells[2], SOURCE, "trattamento"));
        snapshot
            .observation
            .add(color, count_cell(&cells[3], SOURCE, "osservazione"));
        recognised += 1;
    }

    if recognised == 0 {
        return Err(ParseError::MissingElement("colour rows".into()));
    }

    Ok(snapshot)
}
