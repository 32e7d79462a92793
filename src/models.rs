//! Canonical data model shared by every source
//!
//! Sources speak different vocabularies; everything they produce is folded
//! into the types below before it reaches storage.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Triage colours
// ============================================================================

/// Canonical triage severity, most to least urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriageColor {
    Red,
    Orange,
    Blue,
    Green,
    White,
}

impl TriageColor {
    /// All colours in priority order
    pub const ALL: [TriageColor; 5] = [
        TriageColor::Red,
        TriageColor::Orange,
        TriageColor::Blue,
        TriageColor::Green,
        TriageColor::White,
    ];

    /// Priority rank, 0 being the most critical
    pub fn priority(self) -> u8 {
        match self {
            Self::Red => 0,
            Self::Orange => 1,
            Self::Blue => 2,
            Self::Green => 3,
            Self::White => 4,
        }
    }

    /// Canonical lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Orange => "orange",
            Self::Blue => "blue",
            Self::Green => "green",
            Self::White => "white",
        }
    }
}

impl fmt::Display for TriageColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Headline colour of a status record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorCode {
    Red,
    Orange,
    Blue,
    Green,
    White,
    /// No patient in any bucket
    Unknown,
}

impl ColorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Orange => "orange",
            Self::Blue => "blue",
            Self::Green => "green",
            Self::White => "white",
            Self::Unknown => "unknown",
        }
    }
}

impl From<TriageColor> for ColorCode {
    fn from(color: TriageColor) -> Self {
        match color {
            TriageColor::Red => Self::Red,
            TriageColor::Orange => Self::Orange,
            TriageColor::Blue => Self::Blue,
            TriageColor::Green => Self::Green,
            TriageColor::White => Self::White,
        }
    }
}

impl From<Option<TriageColor>> for ColorCode {
    fn from(color: Option<TriageColor>) -> Self {
        color.map(Self::from).unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for ColorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColorCode {
    type Err = std::convert::Infallible;

    /// Stored values round-trip; anything else reads back as `Unknown`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "red" => Self::Red,
            "orange" => Self::Orange,
            "blue" => Self::Blue,
            "green" => Self::Green,
            "white" => Self::White,
            _ => Self::Unknown,
        })
    }
}

// ============================================================================
// Colour distribution
// ============================================================================

/// Patient counts per canonical triage colour
///
/// Every field is always present; missing source data is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorCodeDistribution {
    pub red: u32,
    pub orange: u32,
    pub blue: u32,
    pub green: u32,
    pub white: u32,
}

impl ColorCodeDistribution {
    /// Count for one colour
    pub fn get(&self, color: TriageColor) -> u32 {
        match color {
            TriageColor::Red => self.red,
            TriageColor::Orange => self.orange,
            TriageColor::Blue => self.blue,
            TriageColor::Green => self.green,
            TriageColor::White => self.white,
        }
    }

    /// Add patients to one colour, saturating
    pub fn add(&mut self, color: TriageColor, count: u32) {
        let slot = match color {
            TriageColor::Red => &mut self.red,
            TriageColor::Orange => &mut self.orange,
            TriageColor::Blue => &mut self.blue,
            TriageColor::Green => &mut self.green,
            TriageColor::White => &mut self.white,
        };
        *slot = slot.saturating_add(count);
    }

    /// Builder-style variant of [`add`](Self::add)
    #[must_use]
    pub fn with(mut self, color: TriageColor, count: u32) -> Self {
        self.add(color, count);
        self
    }

    /// Total patients across all colours
    pub fn total(&self) -> u32 {
        TriageColor::ALL
            .iter()
            .fold(0u32, |acc, c| acc.saturating_add(self.get(*c)))
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Most critical colour with at least one patient
    pub fn most_critical(&self) -> Option<TriageColor> {
        TriageColor::ALL.into_iter().find(|c| self.get(*c) > 0)
    }

    /// Per-colour sum of two distributions
    #[must_use]
    pub fn merge(mut self, other: &ColorCodeDistribution) -> Self {
        for color in TriageColor::ALL {
            self.add(color, other.get(color));
        }
        self
    }
}

// ============================================================================
// Hospitals and status records
// ============================================================================

/// Static metadata of one emergency department
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HospitalIdentity {
    pub id: i64,
    pub name: String,
    pub department: String,
    pub city: String,
    pub province: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl HospitalIdentity {
    /// Human-readable label; unique across units sharing a site name
    pub fn label(&self) -> String {
        if self.department.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.department)
        }
    }
}

/// Result of one successful scrape, before persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HospitalStatusCreate {
    pub hospital_id: i64,
    pub color_code: ColorCode,
    /// Estimated wait in minutes
    pub waiting_time: u32,
    pub patients_waiting: u32,
    pub available_beds: u32,
    pub color_distribution: ColorCodeDistribution,
    /// Last update published by the source, in its local wall-clock time
    pub external_last_update: Option<NaiveDateTime>,
    /// When the pipeline observed the data
    pub observed_at: DateTime<Utc>,
}

/// Latest known state of one hospital (one row per hospital)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HospitalStatus {
    pub hospital_id: i64,
    pub color_code: ColorCode,
    pub waiting_time: u32,
    pub patients_waiting: u32,
    pub available_beds: u32,
    pub color_distribution: ColorCodeDistribution,
    pub external_last_update: Option<NaiveDateTime>,
    pub last_updated: DateTime<Utc>,
}

impl HospitalStatus {
    /// Current-state row produced by persisting `create`
    pub fn from_create(create: &HospitalStatusCreate) -> Self {
        Self {
            hospital_id: create.hospital_id,
            color_code: create.color_code,
            waiting_time: create.waiting_time,
            patients_waiting: create.patients_waiting,
            available_beds: create.available_beds,
            color_distribution: create.color_distribution,
            external_last_update: create.external_last_update,
            last_updated: create.observed_at,
        }
    }
}

/// Append-only time-series row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HospitalHistory {
    pub id: i64,
    pub hospital_id: i64,
    pub color_code: ColorCode,
    pub waiting_time: u32,
    pub patients_waiting: u32,
    pub available_beds: u32,
    pub color_distribution: ColorCodeDistribution,
    pub external_last_update: Option<NaiveDateTime>,
    pub scraped_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        let mut colors = TriageColor::ALL.to_vec();
        colors.reverse();
        colors.sort();
        assert_eq!(colors, TriageColor::ALL.to_vec());
        assert!(TriageColor::Red.priority() < TriageColor::White.priority());
    }

    #[test]
    fn test_distribution_most_critical() {
        let dist = ColorCodeDistribution::default()
            .with(TriageColor::Green, 4)
            .with(TriageColor::Blue, 1);
        assert_eq!(dist.most_critical(), Some(TriageColor::Blue));
        assert_eq!(dist.total(), 5);

        assert_eq!(ColorCodeDistribution::default().most_critical(), None);
    }

    #[test]
    fn test_distribution_merge() {
        let a = ColorCodeDistribution {
            red: 1,
            orange: 2,
            blue: 0,
            green: 3,
            white: 0,
        };
        let b = ColorCodeDistribution {
            red: 0,
            orange: 1,
            blue: 2,
            green: 0,
            white: 5,
        };
        let merged = a.merge(&b);
        assert_eq!(merged.orange, 3);
        assert_eq!(merged.white, 5);
        assert_eq!(merged.total(), 14);
    }

    #[test]
    fn test_color_code_conversion() {
        assert_eq!(ColorCode::from(Some(TriageColor::Orange)), ColorCode::Orange);
        assert_eq!(ColorCode::from(None), ColorCode::Unknown);
        assert_eq!("unknown".parse::<ColorCode>().unwrap(), ColorCode::Unknown);
        assert_eq!("blue".parse::<ColorCode>().unwrap(), ColorCode::Blue);
        assert_eq!(
            serde_json::to_string(&ColorCode::Unknown).unwrap(),
            "\"unknown\""
        );
    }

    #[test]
    fn test_hospital_label() {
        let hospital = HospitalIdentity {
            id: 1,
            name: "P.O. Cervello".into(),
            department: "Pronto Soccorso Pediatrico".into(),
            city: "Palermo".into(),
            province: "PA".into(),
            address: None,
            latitude: None,
            longitude: None,
        };
        assert_eq!(hospital.label(), "P.O. Cervello (Pronto Soccorso Pediatrico)");
    }
}
