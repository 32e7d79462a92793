//! Triage colour vocabulary normalization
//!
//! Sources label buckets in Italian or English, singular or plural,
//! sometimes with a numeric suffix (`"Rosso (1)"`). The regional "giallo"
//! (yellow) code predates the 2019 five-colour reform and maps to orange.

use crate::models::TriageColor;

/// Meaning of a source colour label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorLabel {
    /// Counts toward a canonical bucket
    Counted(TriageColor),
    /// Known label deliberately left out of the distribution (e.g. deceased)
    Ignored,
}

/// Map a raw label onto the canonical vocabulary
///
/// Returns `None` for labels outside the vocabulary.
pub fn normalize_color_label(label: &str) -> Option<ColorLabel> {
    let cleaned = clean_label(label);

    let color = match cleaned.as_str() {
        "rosso" | "rossi" | "red" => TriageColor::Red,
        "arancione" | "arancioni" | "arancio" | "orange" | "giallo" | "gialli" | "yellow" => {
            TriageColor::Orange
        }
        "azzurro" | "azzurri" | "blu" | "blue" | "azure" => TriageColor::Blue,
        "verde" | "verdi" | "green" => TriageColor::Green,
        "bianco" | "bianchi" | "white" | "grigio" | "grey" | "gray" => TriageColor::White,
        "nero" | "neri" | "black" => return Some(ColorLabel::Ignored),
        _ => return None,
    };

    Some(ColorLabel::Counted(color))
}

/// Resolve a label to a bucket, logging anything the vocabulary does not know
///
/// Unknown labels are dropped rather than guessed.
pub fn resolve_color(label: &str, source: &str) -> Option<TriageColor> {
    match normalize_color_label(label) {
        Some(ColorLabel::Counted(color)) => Some(color),
        Some(ColorLabel::Ignored) => None,
        None => {
            tracing::warn!(source = source, label = label, "Unrecognized triage colour label");
            None
        }
    }
}

fn clean_label(label: &str) -> String {
    let lower = label.to_lowercase();
    let head = lower.split('(').next().unwrap_or_default();
    let head = head.trim().trim_start_matches("codice").trim_start_matches("codici");
    head.trim_matches(|c: char| !c.is_alphabetic()).to_string()
}
