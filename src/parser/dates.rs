//! Source timestamp grammars
//!
//! Portals publish "last updated" stamps in a handful of formats. Each
//! source names the grammar it uses; parsing is lenient about surrounding
//! text and returns `None` rather than failing the scrape.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::sync::OnceLock;

/// Known update-stamp formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateGrammar {
    /// `20/01/25 - 14:05:33`
    ShortYearDash,
    /// `20/01/2025 14:05[:33]`, also with `-`, `ore` or `alle` between parts
    DayMonthYear,
    /// `20-01-2025 14:05`
    DashedDayMonthYear,
    /// `1 Febbraio 2025 19:27`
    ItalianLongForm,
    /// `alle ore 14:05 del 20/01/2025`
    TimeBeforeDate,
}

impl DateGrammar {
    /// Extract the first timestamp matching this grammar
    pub fn parse(self, text: &str) -> Option<NaiveDateTime> {
        match self {
            Self::ShortYearDash => parse_short_year_dash(text),
            Self::DayMonthYear => parse_day_month_year(text),
            Self::DashedDayMonthYear => parse_dashed(text),
            Self::ItalianLongForm => parse_italian_long(text),
            Self::TimeBeforeDate => parse_time_before_date(text),
        }
    }
}

/// Try several grammars in order
pub fn parse_any(text: &str, grammars: &[DateGrammar]) -> Option<NaiveDateTime> {
    grammars.iter().find_map(|g| g.parse(text))
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("Invalid regex pattern"))
}

fn build(
    day: &str,
    month: u32,
    year: &str,
    hour: &str,
    minute: &str,
    second: Option<&str>,
) -> Option<NaiveDateTime> {
    let mut year: i32 = year.parse().ok()?;
    if year < 100 {
        year += 2000;
    }
    let date = NaiveDate::from_ymd_opt(year, month, day.parse().ok()?)?;
    let second = second.and_then(|s| s.parse().ok()).unwrap_or(0);
    let time = NaiveTime::from_hms_opt(hour.parse().ok()?, minute.parse().ok()?, second)?;
    Some(date.and_time(time))
}

fn parse_short_year_dash(text: &str) -> Option<NaiveDateTime> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let caps = regex(
        &RE,
        r"(\d{2})/(\d{2})/(\d{2})\s*-\s*(\d{2}):(\d{2}):(\d{2})",
    )
    .captures(text)?;
    build(
        &caps[1],
        caps[2].parse().ok()?,
        &caps[3],
        &caps[4],
        &caps[5],
        Some(&caps[6]),
    )
}

fn parse_day_month_year(text: &str) -> Option<NaiveDateTime> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let caps = regex(
        &RE,
        r"(?i)(\d{1,2})/(\d{1,2})/(\d{4})\s*(?:-|alle|ore|,)?\s*(?:ore\s*)?(\d{1,2})[:.](\d{2})(?:[:.](\d{2}))?",
    )
    .captures(text)?;
    build(
        &caps[1],
        caps[2].parse().ok()?,
        &caps[3],
        &caps[4],
        &caps[5],
        caps.get(6).map(|m| m.as_str()),
    )
}

fn parse_dashed(text: &str) -> Option<NaiveDateTime> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let caps = regex(&RE, r"(\d{2})-(\d{2})-(\d{4})\s+(\d{2}):(\d{2})").captures(text)?;
    build(
        &caps[1],
        caps[2].parse().ok()?,
        &caps[3],
        &caps[4],
        &caps[5],
        None,
    )
}

fn parse_italian_long(text: &str) -> Option<NaiveDateTime> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let caps = regex(
        &RE,
        r"(\d{1,2})\s+([A-Za-zÀ-ÿ]+)\s+(\d{4})\s+(?:ore\s+)?(\d{1,2})[:.](\d{2})",
    )
    .captures(text)?;
    let month = italian_month(&caps[2])?;
    build(&caps[1], month, &caps[3], &caps[4], &caps[5], None)
}

fn parse_time_before_date(text: &str) -> Option<NaiveDateTime> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let caps = regex(
        &RE,
        r"(?i)(\d{1,2})[:.](\d{2})(?:[:.](\d{2}))?\s+del\s+(\d{1,2})/(\d{1,2})/(\d{4})",
    )
    .captures(text)?;
    build(
        &caps[4],
        caps[5].parse().ok()?,
        &caps[6],
        &caps[1],
        &caps[2],
        caps.get(3).map(|m| m.as_str()),
    )
}

fn italian_month(name: &str) -> Option<u32> {
    let month = match name.to_lowercase().as_str() {
        "gennaio" => 1,
        "febbraio" => 2,
        "marzo" => 3,
        "aprile" => 4,
        "maggio" => 5,
        "giugno" => 6,
        "luglio" => 7,
        "agosto" => 8,
        "settembre" => 9,
        "ottobre" => 10,
        "novembre" => 11,
        "dicembre" => 12,
        _ => return None,
    };
    Some(month)
}
