//! Diagnostics tree scanning.
//!
//! The diagnostics endpoint returns an arbitrarily nested JSON tree whose
//! leaf objects carry the attribute fields. The scanner flattens that tree
//! into a list of attribute records without assuming anything about its
//! shape: nulls, primitives, and missing fields are tolerated, and an
//! unusable tree simply yields no records.

use std::collections::{BTreeSet, HashSet};

use serde_json::Value;

/// Collect every object in `tree` that carries a string `dbusPath` starting
/// with `/`.
///
/// The walk uses an explicit work stack so that server-controlled nesting
/// depth never translates into native stack depth. Collection order is not a
/// contract; downstream stages re-sort.
pub fn scan_attributes(tree: &Value) -> Vec<&Value> {
    let mut records = Vec::new();
    let mut work = vec![tree];

    while let Some(node) = work.pop() {
        match node {
            Value::Array(items) => {
                work.extend(items.iter().filter(|v| v.is_object() || v.is_array()));
            }
            Value::Object(map) => {
                let is_record = map
                    .get("dbusPath")
                    .and_then(Value::as_str)
                    .is_some_and(|p| p.starts_with('/'));
                if is_record {
                    records.push(node);
                }
                work.extend(map.values().filter(|v| v.is_object() || v.is_array()));
            }
            _ => {}
        }
    }

    records
}

/// Resolve time-series attribute codes for a set of `dbus:<path>` signal
/// ids by scanning the diagnostics tree for records that carry a matching
/// `dbusPath` together with a `code` (or `vrmCode`) field.
///
/// Returns the codes sorted and deduplicated.
pub fn collect_attribute_codes(tree: &Value, signal_ids: &[String]) -> BTreeSet<String> {
    let wanted: HashSet<&str> = signal_ids
        .iter()
        .filter_map(|sid| sid.strip_prefix("dbus:"))
        .filter(|p| p.starts_with('/'))
        .collect();

    let mut codes = BTreeSet::new();
    if wanted.is_empty() {
        return codes;
    }

    for rec in scan_attributes(tree) {
        let Some(path) = rec.get("dbusPath").and_then(Value::as_str) else {
            continue;
        };
        if !wanted.contains(path) {
            continue;
        }
        let code = rec
            .get("code")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .or_else(|| {
                rec.get("vrmCode")
                    .and_then(Value::as_str)
                    .filter(|c| !c.is_empty())
            });
        if let Some(code) = code {
            codes.insert(code.to_string());
        }
    }
    codes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scan_collects_nested_records() {
        let tree = json!({
            "records": [
                { "dbusPath": "/Dc/0/Voltage", "rawValue": 13.2 },
                { "nested": { "deeper": { "dbusPath": "/Soc", "rawValue": 82 } } },
            ],
            "meta": { "dbusPath": "/Ac/Out/P" }
        });
        let records = scan_attributes(&tree);
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_scan_requires_leading_slash() {
        let tree = json!([
            { "dbusPath": "Dc/0/Voltage" },
            { "dbusPath": 42 },
            { "dbusPath": "/Ok" },
        ]);
        let records = scan_attributes(&tree);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["dbusPath"], "/Ok");
    }

    #[test]
    fn test_scan_tolerates_primitives_and_null() {
        assert!(scan_attributes(&Value::Null).is_empty());
        assert!(scan_attributes(&json!(42)).is_empty());
        assert!(scan_attributes(&json!("text")).is_empty());
        assert!(scan_attributes(&json!([null, 1, "x", []])).is_empty());
    }

    #[test]
    fn test_scan_deeply_nested_does_not_overflow() {
        // A pathological single-branch tree far deeper than any native stack
        // would allow with recursive descent.
        let mut tree = json!({ "dbusPath": "/Leaf" });
        for _ in 0..100_000 {
            tree = json!({ "child": tree });
        }
        let records = scan_attributes(&tree);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_collect_attribute_codes() {
        let tree = json!({
            "records": [
                { "dbusPath": "/Pv/V", "code": "PVV" },
                { "dbusPath": "/Pv/P", "vrmCode": "PVP" },
                { "dbusPath": "/Soc", "code": "" },
                { "dbusPath": "/Other", "code": "OTH" },
            ]
        });
        let signals = vec![
            "dbus:/Pv/V".to_string(),
            "dbus:/Pv/P".to_string(),
            "dbus:/Soc".to_string(),
        ];
        let codes = collect_attribute_codes(&tree, &signals);
        assert_eq!(
            codes.into_iter().collect::<Vec<_>>(),
            vec!["PVP".to_string(), "PVV".to_string()]
        );
    }

    #[test]
    fn test_collect_attribute_codes_ignores_non_dbus_signals() {
        let tree = json!({ "records": [{ "dbusPath": "/Pv/V", "code": "PVV" }] });
        let codes = collect_attribute_codes(&tree, &["PVV".to_string()]);
        assert!(codes.is_empty());
    }
}
