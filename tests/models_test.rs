//! Tests for models module

use ercrowd::models::{
    ColorCode, ColorCodeDistribution, HospitalIdentity, HospitalStatus, HospitalStatusCreate,
    TriageColor,
};
use proptest::prelude::*;

fn distribution(counts: [u32; 5]) -> ColorCodeDistribution {
    TriageColor::ALL
        .iter()
        .zip(counts)
        .fold(ColorCodeDistribution::default(), |d, (c, n)| d.with(*c, n))
}

#[test]
fn test_priority_order() {
    let priorities: Vec<u8> = TriageColor::ALL.iter().map(|c| c.priority()).collect();
    let mut sorted = priorities.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), 5);
    assert!(TriageColor::Red.priority() < TriageColor::White.priority());
}

#[test]
fn test_color_code_serde_names() {
    assert_eq!(serde_json::to_string(&ColorCode::Unknown).unwrap(), "\"unknown\"");
    assert_eq!(serde_json::to_string(&ColorCode::Orange).unwrap(), "\"orange\"");
    assert_eq!("blue".parse::<ColorCode>().unwrap(), ColorCode::Blue);
    assert_eq!("purple".parse::<ColorCode>().unwrap(), ColorCode::Unknown);
    assert_eq!(ColorCode::from(None), ColorCode::Unknown);
}

#[test]
fn test_hospital_label_separates_departments() {
    let adults = HospitalIdentity {
        id: 1,
        name: "P.O. Cervello".into(),
        department: "Pronto Soccorso Adulti".into(),
        city: "Palermo".into(),
        province: "PA".into(),
        address: None,
        latitude: None,
        longitude: None,
    };
    let children = HospitalIdentity {
        id: 3,
        department: "Pronto Soccorso Pediatrico".into(),
        ..adults.clone()
    };

    assert_ne!(adults.label(), children.label());
    assert_eq!(adults.label(), "P.O. Cervello (Pronto Soccorso Adulti)");
}

#[test]
fn test_status_from_create() {
    let observed_at = chrono::Utc::now();
    let create = HospitalStatusCreate {
        hospital_id: 7,
        color_code: ColorCode::Green,
        waiting_time: 20,
        patients_waiting: 4,
        available_beds: 0,
        color_distribution: distribution([0, 0, 0, 4, 0]),
        external_last_update: None,
        observed_at,
    };

    let status = HospitalStatus::from_create(&create);
    assert_eq!(status.hospital_id, 7);
    assert_eq!(status.last_updated, observed_at);
    assert_eq!(status.color_distribution.green, 4);
}

proptest! {
    #[test]
    fn total_is_sum_of_buckets(counts in proptest::array::uniform5(0u32..10_000)) {
        let d = distribution(counts);
        prop_assert_eq!(d.total(), counts.iter().sum::<u32>());
    }

    #[test]
    fn merge_adds_per_colour(
        a in proptest::array::uniform5(0u32..10_000),
        b in proptest::array::uniform5(0u32..10_000),
    ) {
        let merged = distribution(a).merge(&distribution(b));
        prop_assert_eq!(merged.total(), distribution(a).total() + distribution(b).total());
        for color in TriageColor::ALL {
            prop_assert_eq!(merged.get(color), distribution(a).get(color) + distribution(b).get(color));
        }
    }

    #[test]
    fn most_critical_has_patients_and_nothing_above(counts in proptest::array::uniform5(0u32..5)) {
        let d = distribution(counts);
        match d.most_critical() {
            None => prop_assert!(d.is_empty()),
            Some(color) => {
                prop_assert!(d.get(color) > 0);
                for above in TriageColor::ALL.iter().filter(|c| c.priority() < color.priority()) {
                    prop_assert_eq!(d.get(*above), 0);
                }
            }
        }
    }
}
