//! Raw per-source extraction result and its conversion to the canonical record

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::models::{ColorCode, ColorCodeDistribution, HospitalStatusCreate, TriageColor};
use crate::parser::{estimate_from_weights, weighted_wait};

/// Where a patient is in the emergency department flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatientState {
    Waiting,
    InTreatment,
    Observation,
}

impl PatientState {
    /// Classify a row header (`"In attesa"`, `"In trattamento"`, `"OBI"`, ...)
    pub fn from_header(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        if lower.contains("attesa") {
            Some(Self::Waiting)
        } else if lower.contains("trattam") || lower.contains("visita") {
            Some(Self::InTreatment)
        } else if lower.contains("osservaz") || lower.contains("obi") {
            Some(Self::Observation)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::InTreatment => "in_treatment",
            Self::Observation => "observation",
        }
    }
}

/// Everything a source publishes for one hospital, before normalization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceSnapshot {
    pub waiting: ColorCodeDistribution,
    pub in_treatment: ColorCodeDistribution,
    pub observation: ColorCodeDistribution,

    /// Per-colour average wait in minutes, when the source publishes it
    pub average_waits: Option<Vec<(TriageColor, u32)>>,

    pub total_beds: Option<u32>,
    /// Published occupancy; falls back to all patients present
    pub occupied_beds: Option<u32>,

    pub source_updated_at: Option<NaiveDateTime>,

    /// Totals the source states alongside its per-colour counts
    pub declared_totals: Vec<(PatientState, u32)>,
}

impl SourceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Distribution for one patient state
    pub fn state(&self, state: PatientState) -> &ColorCodeDistribution {
        match state {
            PatientState::Waiting => &self.waiting,
            PatientState::InTreatment => &self.in_treatment,
            PatientState::Observation => &self.observation,
        }
    }

    pub fn state_mut(&mut self, state: PatientState) -> &mut ColorCodeDistribution {
        match state {
            PatientState::Waiting => &mut self.waiting,
            PatientState::InTreatment => &mut self.in_treatment,
            PatientState::Observation => &mut self.observation,
        }
    }

    /// Sum of all patient states
    pub fn distribution(&self) -> ColorCodeDistribution {
        self.waiting
            .merge(&self.in_treatment)
            .merge(&self.observation)
    }

    /// Most critical waiting colour, else most critical overall
    ///
    /// `Unknown` only when the department is empty.
    pub fn headline_color(&self) -> ColorCode {
        self.waiting
            .most_critical()
            .or_else(|| self.distribution().most_critical())
            .into()
    }

    pub fn patients_waiting(&self) -> u32 {
        self.waiting.total()
    }

    /// Estimated wait in minutes
    pub fn wait_time(&self) -> u32 {
        match &self.average_waits {
            Some(waits) if !waits.is_empty() => weighted_wait(&self.waiting, waits),
            _ => estimate_from_weights(&self.waiting),
        }
    }

    pub fn available_beds(&self) -> u32 {
        match self.total_beds {
            Some(total) => {
                let occupied = self
                    .occupied_beds
                    .unwrap_or_else(|| self.distribution().total());
                total.saturating_sub(occupied)
            }
            None => 0,
        }
    }

    /// Fold into the canonical record
    pub fn into_status(self, hospital_id: i64, observed_at: DateTime<Utc>) -> HospitalStatusCreate {
        HospitalStatusCreate {
            hospital_id,
            color_code: self.headline_color(),
            waiting_time: self.wait_time(),
            patients_waiting: self.patients_waiting(),
            available_beds: self.available_beds(),
            color_distribution: self.distribution(),
            external_last_update: self.source_updated_at,
            observed_at,
        }
    }

    /// Consistency checks run before a scrape is trusted
    ///
    /// Logs the first failing check and returns false.
    pub fn validate(&self, requires_timestamp: bool, source: &str) -> bool {
        if requires_timestamp && self.source_updated_at.is_none() {
            tracing::warn!(source = source, "Source timestamp missing");
            return false;
        }

        for (state, declared) in &self.declared_totals {
            let counted = self.state(*state).total();
            if counted != *declared {
                tracing::warn!(
                    source = source,
                    state = state.as_str(),
                    declared = declared,
                    counted = counted,
                    "Declared total disagrees with colour counts"
                );
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> SourceSnapshot {
        let mut snapshot = SourceSnapshot::new();
        snapshot.waiting = ColorCodeDistribution::default()
            .with(TriageColor::Green, 4)
            .with(TriageColor::White, 2);
        snapshot.in_treatment = ColorCodeDistribution::default().with(TriageColor::Red, 1);
        snapshot.observation = ColorCodeDistribution::default().with(TriageColor::Blue, 3);
        snapshot
    }

    #[test]
    fn test_distribution_sums_states() {
        let dist = sample().distribution();
        assert_eq!(dist.red, 1);
        assert_eq!(dist.blue, 3);
        assert_eq!(dist.green, 4);
        assert_eq!(dist.white, 2);
        assert_eq!(dist.total(), 10);
    }

    #[test]
    fn test_headline_prefers_waiting() {
        let snapshot = sample();
        assert_eq!(snapshot.headline_color(), ColorCode::Green);

        let mut only_treated = SourceSnapshot::new();
        only_treated.in_treatment = ColorCodeDistribution::default().with(TriageColor::Orange, 2);
        assert_eq!(only_treated.headline_color(), ColorCode::Orange);

        assert_eq!(SourceSnapshot::new().headline_color(), ColorCode::Unknown);
    }

    #[test]
    fn test_wait_time_sources() {
        let mut snapshot = sample();
        // (4 * 20 + 2 * 10) / 6
        assert_eq!(snapshot.wait_time(), 17);

        snapshot.average_waits = Some(vec![(TriageColor::Green, 60), (TriageColor::White, 30)]);
        assert_eq!(snapshot.wait_time(), 50);
    }

    #[test]
    fn test_available_beds() {
        let mut snapshot = sample();
        assert_eq!(snapshot.available_beds(), 0);

        snapshot.total_beds = Some(13);
        assert_eq!(snapshot.available_beds(), 3);

        snapshot.total_beds = Some(6);
        assert_eq!(snapshot.available_beds(), 0);

        snapshot.total_beds = Some(20);
        snapshot.occupied_beds = Some(5);
        assert_eq!(snapshot.available_beds(), 15);
    }

    #[test]
    fn test_validate() {
        let mut snapshot = sample();
        assert!(snapshot.validate(false, "test"));
        assert!(!snapshot.validate(true, "test"));

        snapshot.source_updated_at = NaiveDate::from_ymd_opt(2025, 3, 1)
            .and_then(|d| d.and_hms_opt(10, 30, 0));
        assert!(snapshot.validate(true, "test"));

        snapshot.declared_totals = vec![(PatientState::Waiting, 6)];
        assert!(snapshot.validate(true, "test"));

        snapshot.declared_totals = vec![(PatientState::Observation, 4)];
        assert!(!snapshot.validate(true, "test"));
    }

    #[test]
    fn test_into_status() {
        let observed = Utc::now();
        let status = sample().into_status(11, observed);
        assert_eq!(status.hospital_id, 11);
        assert_eq!(status.patients_waiting, 6);
        assert_eq!(status.color_code, ColorCode::Green);
        assert_eq!(status.color_distribution.total(), 10);
        assert_eq!(status.observed_at, observed);
    }

    #[test]
    fn test_state_headers() {
        assert_eq!(PatientState::from_header("In attesa"), Some(PatientState::Waiting));
        assert_eq!(
            PatientState::from_header("Pazienti in trattamento"),
            Some(PatientState::InTreatment)
        );
        assert_eq!(
            PatientState::from_header("In osservazione"),
            Some(PatientState::Observation)
        );
        assert_eq!(PatientState::from_header("Totale"), None);
    }
}
