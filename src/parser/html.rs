//! Small helpers over `scraper` for table-shaped pages

use scraper::{ElementRef, Selector};

use super::color::{normalize_color_label, ColorLabel};
use crate::models::TriageColor;
use crate::utils::error::ParseError;
use crate::utils::{coerce_count, normalize_whitespace};

// Helper macro to parse static selectors
macro_rules! parse_selector {
    ($s:expr) => {
        scraper::Selector::parse($s).expect(concat!("Invalid CSS selector: ", $s))
    };
}
pub(crate) use parse_selector;

/// Compile a selector built at runtime
pub fn compile(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|_| ParseError::InvalidSelector(css.to_string()))
}

/// Whitespace-normalized text content of an element
pub fn text_of(element: ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}

/// First descendant matching `selector`, or a structural error naming `what`
pub fn require<'a>(
    root: ElementRef<'a>,
    selector: &Selector,
    what: &str,
) -> Result<ElementRef<'a>, ParseError> {
    root.select(selector)
        .next()
        .ok_or_else(|| ParseError::MissingElement(what.to_string()))
}

/// Parse a count cell, zero-filling blanks
///
/// Non-numeric, non-empty cells also become 0 but are logged, since they
/// usually mean the layout shifted.
pub fn count_cell(text: &str, source: &str, field: &str) -> u32 {
    let trimmed = text.trim();
    if !trimmed.is_empty() && !trimmed.chars().any(|c| c.is_ascii_digit()) {
        tracing::warn!(source = source, field = field, value = trimmed, "Non-numeric count cell");
    }
    coerce_count(trimmed)
}

/// Parse the last whitespace-separated token of a cell as a count
///
/// Used where cells carry a label before the number (`"Rossi 3"`).
pub fn trailing_count(text: &str, source: &str, field: &str) -> u32 {
    let last = text.split_whitespace().last().unwrap_or_default();
    count_cell(last, source, field)
}

/// Colour of each data column, read from a header row
///
/// Leading label cells are skipped; every cell after the first colour must
/// be a known label. Ignored labels (`nero`) map to `None`.
pub fn column_colors(headers: &[String]) -> Option<Vec<Option<TriageColor>>> {
    let start = headers
        .iter()
        .position(|h| normalize_color_label(h).is_some())?;

    headers[start..]
        .iter()
        .map(|h| match normalize_color_label(h)? {
            ColorLabel::Counted(color) => Some(Some(color)),
            ColorLabel::Ignored => Some(None),
        })
        .collect()
}
