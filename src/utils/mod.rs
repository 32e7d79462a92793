//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;
pub mod retry;

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

    let re = WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex pattern"));

    re.replace_all(text.trim(), " ").to_string()
}

/// Extract the first unsigned integer appearing in `text`
///
/// `"12 (3h)"` yields 12, `"n.d."` yields `None`.
pub fn first_integer(text: &str) -> Option<u32> {
    static NUMBER_RE: OnceLock<Regex> = OnceLock::new();

    let re = NUMBER_RE.get_or_init(|| Regex::new(r"\d+").expect("Invalid regex pattern"));

    re.find(text).and_then(|m| m.as_str().parse().ok())
}

/// Coerce a cell or field into a patient count
///
/// Empty or unparseable input yields 0; the caller decides whether that is
/// worth a warning. Negative numbers are clamped to 0.
pub fn coerce_count(text: &str) -> u32 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0;
    }

    if let Ok(n) = trimmed.parse::<i64>() {
        return n.clamp(0, u32::MAX as i64) as u32;
    }

    // Some APIs publish counts as "3.0"
    if let Ok(f) = trimmed.replace(',', ".").parse::<f64>() {
        if f.is_finite() && f > 0.0 {
            return f.trunc().min(u32::MAX as f64) as u32;
        }
        return 0;
    }

    0
}

/// Coerce a JSON value (number or numeric string) into a patient count
pub fn coerce_json_count(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|v| v.min(u32::MAX as u64) as u32)
            .or_else(|| n.as_f64().map(|f| coerce_count(&f.to_string())))
            .unwrap_or(0),
        Some(Value::String(s)) => coerce_count(s),
        _ => 0,
    }
}
