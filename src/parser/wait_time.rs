//! Wait-time parsing and estimation

use regex::Regex;
use std::sync::OnceLock;

use crate::models::{ColorCodeDistribution, TriageColor};

/// Parse a published wait string into minutes
///
/// Accepts `"2h 30m"`, `"3h  13m"`, `"1h"`, `"45m"`, `"45 min"`,
/// `"2 ore e 30 minuti"`, `"2:30"` and bare minutes (`"90"`).
/// Anything else yields 0.
pub fn parse_wait_time(text: &str) -> u32 {
    static CLOCK_RE: OnceLock<Regex> = OnceLock::new();
    static HOURS_RE: OnceLock<Regex> = OnceLock::new();
    static MINUTES_RE: OnceLock<Regex> = OnceLock::new();

    let text = text.trim().to_lowercase();
    if text.is_empty() {
        return 0;
    }

    if let Ok(minutes) = text.parse::<u32>() {
        return minutes;
    }

    let clock = CLOCK_RE
        .get_or_init(|| Regex::new(r"^(\d{1,3}):(\d{2})$").expect("Invalid regex pattern"));
    if let Some(caps) = clock.captures(&text) {
        let hours: u32 = caps[1].parse().unwrap_or(0);
        let minutes: u32 = caps[2].parse().unwrap_or(0);
        return hours.saturating_mul(60).saturating_add(minutes);
    }

    let hours_re = HOURS_RE
        .get_or_init(|| Regex::new(r"(\d+)\s*(?:ore|ora|hrs|hr|h)").expect("Invalid regex pattern"));
    let minutes_re = MINUTES_RE.get_or_init(|| {
        Regex::new(r"(\d+)\s*(?:minuti|minuto|mins|min|m)").expect("Invalid regex pattern")
    });

    let hours = hours_re
        .captures(&text)
        .and_then(|c| c[1].parse::<u32>().ok());
    let minutes = minutes_re
        .captures(&text)
        .and_then(|c| c[1].parse::<u32>().ok());

    match (hours, minutes) {
        (None, None) => {
            tracing::debug!(input = %text, "Unrecognized wait time format");
            0
        }
        (h, m) => h
            .unwrap_or(0)
            .saturating_mul(60)
            .saturating_add(m.unwrap_or(0)),
    }
}

/// Fallback minutes per patient by colour when a source publishes no waits
pub fn default_weight(color: TriageColor) -> u32 {
    match color {
        TriageColor::Red => 60,
        TriageColor::Orange => 45,
        TriageColor::Blue => 30,
        TriageColor::Green => 20,
        TriageColor::White => 10,
    }
}

/// Patient-weighted average of per-colour waits
///
/// Colours without a published wait, or without waiting patients, do not
/// contribute. Returns 0 when nobody contributes.
pub fn weighted_wait(waiting: &ColorCodeDistribution, waits: &[(TriageColor, u32)]) -> u32 {
    let mut weighted: u64 = 0;
    let mut patients: u64 = 0;

    for (color, minutes) in waits {
        let count = waiting.get(*color) as u64;
        if count == 0 {
            continue;
        }
        weighted += count * *minutes as u64;
        patients += count;
    }

    if patients == 0 {
        return 0;
    }

    (weighted as f64 / patients as f64).round() as u32
}

/// Estimate from the fixed weight table
pub fn estimate_from_weights(waiting: &ColorCodeDistribution) -> u32 {
    let table: Vec<(TriageColor, u32)> = TriageColor::ALL
        .iter()
        .map(|c| (*c, default_weight(*c)))
        .collect();
    weighted_wait(waiting, &table)
}
