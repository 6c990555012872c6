//! Device display-name derivation.
//!
//! Diagnostics rarely carry one authoritative name field; instead the name
//! hides in whichever record holds the "Custom name" or "Product name"
//! attribute. Candidates are scored and the best one wins, with ties broken
//! lexicographically so the result is deterministic.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::canonical::{canonical_type, instance_of, CanonicalType};

/// Brand/model/category tokens that make a value look like a device name.
const NAME_HINTS: [&str; 8] = [
    "skylla",
    "charger",
    "mppt",
    "multiplus",
    "inverter",
    "battery",
    "sensor",
    "alternator",
];

fn name_description_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(custom\s*name|^name$|product\s*name|device\s*name)")
            .expect("name pattern is valid")
    })
}

/// Derive a display name for the device identified by `(instance,
/// expected_type)` from its diagnostics records.
///
/// Scoring: +3 for a name-like description, +2 for a hint keyword in the
/// value, +1 for whitespace, +1 for length >= 4. Highest score wins, ties
/// resolve to the lexicographically smaller value. Returns `None` when no
/// record qualifies.
pub fn derive_device_name(
    records: &[&Value],
    instance: i64,
    expected_type: &CanonicalType,
) -> Option<String> {
    let mut candidates: Vec<(i32, &str)> = Vec::new();

    for rec in records {
        if instance_of(rec) != instance || &canonical_type(rec) != expected_type {
            continue;
        }
        let Some(formatted) = rec
            .get("formattedValue")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
        else {
            continue;
        };
        let description = rec.get("description").and_then(Value::as_str).unwrap_or("");

        let mut score = 0;
        if name_description_pattern().is_match(description) {
            score += 3;
        }
        let lc = formatted.to_lowercase();
        if NAME_HINTS.iter().any(|hint| lc.contains(hint)) {
            score += 2;
        }
        if formatted.chars().any(char::is_whitespace) {
            score += 1;
        }
        if formatted.len() >= 4 {
            score += 1;
        }
        candidates.push((score, formatted));
    }

    candidates.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    candidates.first().map(|(_, value)| (*value).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_custom_name_beats_product_name() {
        let records = [
            json!({
                "dbusServiceType": "battery",
                "instance": 2,
                "dbusPath": "/CustomName",
                "description": "Custom name",
                "formattedValue": "House Bank",
            }),
            json!({
                "dbusServiceType": "battery",
                "instance": 2,
                "dbusPath": "/ProductName",
                "description": "Product name",
                "formattedValue": "SmartShunt",
            }),
        ];
        let refs: Vec<&serde_json::Value> = records.iter().collect();
        let name = derive_device_name(&refs, 2, &CanonicalType::BatteryMonitor);
        assert_eq!(name, Some("House Bank".to_string()));
    }

    #[test]
    fn test_filters_by_instance_and_type() {
        let records = [
            json!({
                "dbusServiceType": "battery",
                "instance": 1,
                "dbusPath": "/CustomName",
                "description": "Custom name",
                "formattedValue": "Starter",
            }),
            json!({
                "dbusServiceType": "solarcharger",
                "instance": 2,
                "dbusPath": "/CustomName",
                "description": "Custom name",
                "formattedValue": "Roof MPPT",
            }),
        ];
        let refs: Vec<&serde_json::Value> = records.iter().collect();
        assert_eq!(
            derive_device_name(&refs, 2, &CanonicalType::BatteryMonitor),
            None
        );
        assert_eq!(
            derive_device_name(&refs, 2, &CanonicalType::SolarCharger),
            Some("Roof MPPT".to_string())
        );
    }

    #[test]
    fn test_tie_breaks_lexicographically() {
        let records = [
            json!({
                "dbusServiceType": "battery",
                "instance": 0,
                "dbusPath": "/A",
                "description": "misc",
                "formattedValue": "Bravo Bank",
            }),
            json!({
                "dbusServiceType": "battery",
                "instance": 0,
                "dbusPath": "/B",
                "description": "misc",
                "formattedValue": "Alpha Bank",
            }),
        ];
        let refs: Vec<&serde_json::Value> = records.iter().collect();
        assert_eq!(
            derive_device_name(&refs, 0, &CanonicalType::BatteryMonitor),
            Some("Alpha Bank".to_string())
        );
    }

    #[test]
    fn test_no_qualifying_records() {
        let records = [json!({
            "dbusServiceType": "battery",
            "instance": 0,
            "dbusPath": "/Soc",
            "description": "State of charge",
        })];
        let refs: Vec<&serde_json::Value> = records.iter().collect();
        assert_eq!(derive_device_name(&refs, 0, &CanonicalType::BatteryMonitor), None);
    }
}
