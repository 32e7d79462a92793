//! AO Papardo Messina home page widget
//!
//! Each triage colour is a `div.semaforo_ps` swatch identified only by its
//! inline background colour; the count sits in a `span` of the following
//! `div`.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;

use super::{ScraperContext, SnapshotSource, SourceBinding, SourceSnapshot};
use crate::models::TriageColor;
use crate::parser::html::{count_cell, parse_selector, text_of};
use crate::parser::DateGrammar;
use crate::transport::{RequestOptions, Transport};
use crate::utils::error::{ParseError, ScrapeError};

pub const BASE_URL: &str = "https://www.aopapardo.it/";

const SOURCE: &str = "ao_papardo";

/// Estimated capacity; the site publishes none
const TOTAL_BEDS: u32 = 30;

lazy_static! {
    static ref SWATCH: Selector = parse_selector!("div.semaforo_ps");
    static ref SPAN: Selector = parse_selector!("span");
    static ref UPDATED_AT: Selector = parse_selector!("div.hidden-sm.hidden-xs.pull-right.small");
    static ref BACKGROUND: Regex =
        Regex::new(r"(?i)background-color:\s*(#[0-9a-f]{6})").expect("Invalid regex pattern");
}

/// Triage colour of a swatch's hex background
pub fn swatch_color(hex: &str) -> Option<TriageColor> {
    match hex.to_ascii_uppercase().as_str() {
        "#FF0000" => Some(TriageColor::Red),
        "#F77A04" => Some(TriageColor::Orange),
        "#04E1F7" => Some(TriageColor::Blue),
        "#36DB00" => Some(TriageColor::Green),
        "#FFFFFF" => Some(TriageColor::White),
        _ => None,
    }
}

pub struct AoPapardoScraper {
    binding: SourceBinding,
    transport: Arc<dyn Transport>,
    url: String,
}

impl AoPapardoScraper {
    pub fn new(binding: SourceBinding, ctx: &ScraperContext) -> Self {
        Self {
            binding,
            transport: ctx.transport.clone(),
            url: ctx.base_url(binding.code.family()),
        }
    }
}

#[async_trait]
impl SnapshotSource for AoPapardoScraper {
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

    let mut snapshot = SourceSnapshot::new();
    snapshot.total_beds = Some(TOTAL_BEDS);
    snapshot.source_updated_at = document
        .select(&UPDATED_AT)
        .next()
        .and_then(|el| DateGrammar::DayMonthYear.parse(&text_of(el)));

    let mut recognised = 0;
    for swatch in document.select(&SWATCH) {
        let style = swatch.value().attr("style").unwrap_or_default();
        let Some(hex) = BACKGROUND.captures(style).map(|c| c[1].to_string()) else {
            continue;
        };
        let Some(color) = swatch_color(&hex) else {
            tracing::warn!(source = SOURCE, colour = %hex, "Unrecognized swatch colour");
            continue;
        };
        let Some(count) = swatch_count(swatch) else {
            continue;
        };

        snapshot.waiting.add(color, count_cell(&count, SOURCE, color.as_str()));
        recognised += 1;
    }

    if recognised == 0 {
        return Err(ParseError::MissingElement("semaforo_ps swatches".into()));
    }

    Ok(snapshot)
}

/// Text of the span inside the first `div` after the swatch
fn swatch_count(swatch: ElementRef<'_>) -> Option<String> {
    swatch
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "div")
        .and_then(|div| div.select(&SPAN).next())
        .map(text_of)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn swatch(hex: &str, count: &str) -> String {
        format!(
            r#"<div class="semaforo_ps" style="background-color: {hex};"></div>
               <div><span>{count}</span></div>"#
        )
    }

    fn page(swatches: &[(&str, &str)]) -> String {
        let body: String = swatches.iter().map(|(h, c)| swatch(h, c)).collect();
        format!(
            r#"<html><body>
               <div class="hidden-sm hidden-xs pull-right small">Aggiornato il 11/02/2025 alle 12:19</div>
               {body}
               </body></html>"#
        )
    }

    #[test]
    fn test_parse_swatches() {
        let html = page(&[
            ("#FF0000", "1"),
            ("#f77a04", "2"),
            ("#04E1F7", "0"),
            ("#36DB00", "8"),
            ("#FFFFFF", "3"),
        ]);
        let snapshot = parse_page(&html).unwrap();

        assert_eq!(snapshot.waiting.red, 1);
        assert_eq!(snapshot.waiting.orange, 2);
        assert_eq!(snapshot.waiting.green, 8);
        assert_eq!(snapshot.patients_waiting(), 14);
        assert_eq!(snapshot.available_beds(), 16);
        assert_eq!(snapshot.source_updated_at.unwrap().hour(), 12);
    }

    #[test]
    fn test_unknown_swatch_is_skipped() {
        let snapshot = parse_page(&page(&[("#123456", "9"), ("#36DB00", "2")])).unwrap();
        assert_eq!(snapshot.patients_waiting(), 2);
    }

    #[test]
    fn test_no_swatches() {
        let err = parse_page("<html><body><p>manutenzione</p></body></html>").unwrap_err();
        assert!(matches!(err, ParseError::MissingElement(_)));
    }
}
