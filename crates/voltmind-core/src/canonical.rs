//! Canonical device typing, identity, and value coercion.
//!
//! Raw attribute records name their device in several inconsistent ways
//! (`dbusServiceType`, numeric `idDeviceType`, free-text `Device` labels).
//! This module collapses them into a single canonical type, builds the
//! stable `type:instance` device id and `dbus:<path>` signal id, and coerces
//! the loosely typed value fields into a scalar-or-state record.

use std::borrow::Cow;
use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Number, Value};

/// Canonical device classification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CanonicalType {
    Vebus,
    BatteryMonitor,
    SolarCharger,
    TempSensor,
    Alternator,
    System,
    Charger,
    Gateway,
    Gps,
    /// Numeric fallback (`type_<N>`) for services the dictionary does not cover
    Code(i64),
    Unknown,
}

impl CanonicalType {
    /// The wire name of this type (`battery_monitor`, `type_106`, ...).
    pub fn name(&self) -> Cow<'static, str> {
        match self {
            Self::Vebus => Cow::Borrowed("vebus"),
            Self::BatteryMonitor => Cow::Borrowed("battery_monitor"),
            Self::SolarCharger => Cow::Borrowed("solar_charger"),
            Self::TempSensor => Cow::Borrowed("temp_sensor"),
            Self::Alternator => Cow::Borrowed("alternator"),
            Self::System => Cow::Borrowed("system"),
            Self::Charger => Cow::Borrowed("charger"),
            Self::Gateway => Cow::Borrowed("gateway"),
            Self::Gps => Cow::Borrowed("gps"),
            Self::Code(n) => Cow::Owned(format!("type_{n}")),
            Self::Unknown => Cow::Borrowed("unknown"),
        }
    }
}

impl fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Serialize for CanonicalType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name())
    }
}

/// Stable device key: `<type>:<instance>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(device_type: &CanonicalType, instance: i64) -> Self {
        Self(format!("{device_type}:{instance}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable signal key: `dbus:<dbusPath>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SignalId(String);

impl SignalId {
    pub fn from_dbus_path(path: &str) -> Self {
        Self(format!("dbus:{path}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical type of a raw attribute record.
///
/// `dbusServiceType` (case-insensitive) wins; otherwise numeric
/// `idDeviceType` yields `type_<N>`, then the free-text `Device` label is
/// tried, and finally `unknown`.
pub fn canonical_type(attr: &Value) -> CanonicalType {
    let service = attr
        .get("dbusServiceType")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_lowercase();

    match service.as_str() {
        "vebus" => CanonicalType::Vebus,
        "battery" | "bms" => CanonicalType::BatteryMonitor,
        "solarcharger" | "solar_charger" | "solar" => CanonicalType::SolarCharger,
        "temperature" | "tempsensor" | "temperature_sensor" => CanonicalType::TempSensor,
        "alternator" => CanonicalType::Alternator,
        "system" | "supervisor" | "settings" => CanonicalType::System,
        _ => {
            if let Some(n) = attr.get("idDeviceType").and_then(json_to_i64) {
                return CanonicalType::Code(n);
            }
            if let Some(label) = attr.get("Device").and_then(Value::as_str) {
                if let Some(mapped) = type_from_device_label(label) {
                    return mapped;
                }
            }
            CanonicalType::Unknown
        }
    }
}

/// Ordered keyword rules over the free-text `Device` label.
fn type_from_device_label(label: &str) -> Option<CanonicalType> {
    let lc = label.to_lowercase();
    if lc.contains("ve.bus") || lc == "vebus" {
        return Some(CanonicalType::Vebus);
    }
    if lc.contains("solar charger") {
        return Some(CanonicalType::SolarCharger);
    }
    if lc.contains("battery monitor") {
        return Some(CanonicalType::BatteryMonitor);
    }
    if lc.contains("temperature") {
        return Some(CanonicalType::TempSensor);
    }
    if lc.contains("alternator") {
        return Some(CanonicalType::Alternator);
    }
    if lc.contains("charger") {
        return Some(CanonicalType::Charger);
    }
    if lc == "system" {
        return Some(CanonicalType::System);
    }
    None
}

/// Device instance of a record; defaults to 0.
pub fn instance_of(attr: &Value) -> i64 {
    match attr.get("instance") {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Provenance of a coerced value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueSource {
    #[serde(rename = "dbusPath")]
    pub dbus_path: String,
    #[serde(rename = "vrmCode", skip_serializing_if = "Option::is_none")]
    pub vrm_code: Option<String>,
}

/// A coerced measurement: either a scalar (numeric or text) with an optional
/// unit, or a numeric state paired with its display text.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueRecord {
    Scalar {
        value: Value,
        unit: Option<String>,
        ts: Option<i64>,
        source: ValueSource,
    },
    State {
        value: Number,
        text: String,
        ts: Option<i64>,
        source: ValueSource,
    },
}

impl ValueRecord {
    pub fn ts(&self) -> Option<i64> {
        match self {
            Self::Scalar { ts, .. } | Self::State { ts, .. } => *ts,
        }
    }
}

/// Unit extracted from a `formatWithUnit` string: the last whitespace-
/// delimited token, requiring at least one preceding token. Tokens starting
/// with `%` are discarded.
pub fn unit_from_format(format_with_unit: Option<&str>) -> Option<String> {
    let parts: Vec<&str> = format_with_unit?.split_whitespace().collect();
    if parts.len() < 2 {
        return None;
    }
    let unit = parts[parts.len() - 1];
    if unit.starts_with('%') {
        return None;
    }
    Some(unit.to_string())
}

/// Coerce a raw attribute record into a [`ValueRecord`].
///
/// The numeric candidate is the first of `rawValue`, `value` that is a
/// number or a finite numeric string. When a numeric candidate coexists with
/// a non-numeric display text the record becomes a state; otherwise it is a
/// scalar carrying whichever representation exists.
pub fn coerce_value(attr: &Value) -> ValueRecord {
    let ts = attr.get("timestamp").and_then(json_to_i64);
    let source = source_of(attr);

    let num = attr
        .get("rawValue")
        .and_then(as_number)
        .or_else(|| attr.get("value").and_then(as_number));

    let unit = unit_from_format(attr.get("formatWithUnit").and_then(Value::as_str)).or_else(|| {
        attr.get("unit")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    });

    let text = attr
        .get("formattedValue")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            attr.get("textValue")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        });

    match num {
        None => {
            let value = match text {
                Some(t) => Value::String(t.to_string()),
                None => attr
                    .get("rawValue")
                    .filter(|v| !v.is_null())
                    .or_else(|| attr.get("value").filter(|v| !v.is_null()))
                    .cloned()
                    .unwrap_or(Value::Null),
            };
            ValueRecord::Scalar {
                value,
                unit,
                ts,
                source,
            }
        }
        Some(n) => match text {
            Some(t) if !parses_as_number(t) => ValueRecord::State {
                value: n,
                text: t.to_string(),
                ts,
                source,
            },
            _ => ValueRecord::Scalar {
                value: Value::Number(n),
                unit,
                ts,
                source,
            },
        },
    }
}

fn source_of(attr: &Value) -> ValueSource {
    ValueSource {
        dbus_path: attr
            .get("dbusPath")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        vrm_code: attr
            .get("code")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .map(str::to_string),
    }
}

/// Numeric candidate: a JSON number, or a non-empty string parsing to a
/// finite float. Integral strings stay integral.
pub fn as_number(v: &Value) -> Option<Number> {
    match v {
        Value::Number(n) => Some(n.clone()),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            if let Ok(i) = trimmed.parse::<i64>() {
                return Some(Number::from(i));
            }
            let f = trimmed.parse::<f64>().ok().filter(|f| f.is_finite())?;
            Number::from_f64(f)
        }
        _ => None,
    }
}

/// Whether a display text reads as a plain number (and therefore carries no
/// extra information next to the numeric candidate).
fn parses_as_number(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || trimmed.parse::<f64>().is_ok()
}

pub(crate) fn json_to_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_type_from_service() {
        for (svc, expected) in [
            ("vebus", CanonicalType::Vebus),
            ("BATTERY", CanonicalType::BatteryMonitor),
            ("bms", CanonicalType::BatteryMonitor),
            ("solarcharger", CanonicalType::SolarCharger),
            ("solar_charger", CanonicalType::SolarCharger),
            ("solar", CanonicalType::SolarCharger),
            ("temperature", CanonicalType::TempSensor),
            ("tempsensor", CanonicalType::TempSensor),
            ("alternator", CanonicalType::Alternator),
            ("system", CanonicalType::System),
            ("supervisor", CanonicalType::System),
            ("settings", CanonicalType::System),
        ] {
            assert_eq!(canonical_type(&json!({ "dbusServiceType": svc })), expected);
        }
    }

    #[test]
    fn test_canonical_type_numeric_fallback() {
        let ty = canonical_type(&json!({ "idDeviceType": 106 }));
        assert_eq!(ty, CanonicalType::Code(106));
        assert_eq!(ty.name(), "type_106");
    }

    #[test]
    fn test_canonical_type_label_fallback() {
        assert_eq!(
            canonical_type(&json!({ "Device": "VE.Bus System" })),
            CanonicalType::Vebus
        );
        assert_eq!(
            canonical_type(&json!({ "Device": "Solar Charger" })),
            CanonicalType::SolarCharger
        );
        assert_eq!(
            canonical_type(&json!({ "Device": "Battery Monitor" })),
            CanonicalType::BatteryMonitor
        );
        assert_eq!(
            canonical_type(&json!({ "Device": "Skylla Charger" })),
            CanonicalType::Charger
        );
        assert_eq!(canonical_type(&json!({ "Device": "system" })), CanonicalType::System);
        assert_eq!(canonical_type(&json!({ "Device": "Gizmo" })), CanonicalType::Unknown);
    }

    #[test]
    fn test_canonical_type_is_deterministic() {
        let attr = json!({ "dbusServiceType": "solarcharger", "rawValue": 1.0 });
        assert_eq!(canonical_type(&attr), canonical_type(&attr));
        // Value fields do not influence the type.
        let attr2 = json!({ "dbusServiceType": "solarcharger", "rawValue": 99.9, "unit": "V" });
        assert_eq!(canonical_type(&attr), canonical_type(&attr2));
    }

    #[test]
    fn test_device_id_defaults_instance_to_zero() {
        assert_eq!(instance_of(&json!({})), 0);
        assert_eq!(instance_of(&json!({ "instance": 5 })), 5);
        assert_eq!(instance_of(&json!({ "instance": "7" })), 7);
        let id = DeviceId::new(&CanonicalType::SolarCharger, 1);
        assert_eq!(id.as_str(), "solar_charger:1");
    }

    #[test]
    fn test_device_id_identity_per_type_instance() {
        let a = DeviceId::new(&CanonicalType::BatteryMonitor, 2);
        let b = DeviceId::new(&CanonicalType::BatteryMonitor, 2);
        assert_eq!(a, b);
    }

    #[test]
    fn test_unit_from_format() {
        assert_eq!(unit_from_format(Some("13.2 V")), Some("V".to_string()));
        assert_eq!(unit_from_format(Some("230 V AC")), Some("AC".to_string()));
        assert_eq!(unit_from_format(Some("82 %")), None);
        assert_eq!(unit_from_format(Some("solo")), None);
        assert_eq!(unit_from_format(None), None);
    }

    #[test]
    fn test_coerce_numeric_scalar() {
        let attr = json!({
            "dbusPath": "/Dc/0/Voltage",
            "rawValue": 13.2,
            "formatWithUnit": "13.2 V",
            "timestamp": 1700000000,
        });
        let rec = coerce_value(&attr);
        match rec {
            ValueRecord::Scalar { value, unit, ts, source } => {
                assert_eq!(value, json!(13.2));
                assert_eq!(unit, Some("V".to_string()));
                assert_eq!(ts, Some(1700000000));
                assert_eq!(source.dbus_path, "/Dc/0/Voltage");
                assert_eq!(source.vrm_code, None);
            }
            other => panic!("expected scalar, got {other:?}"),
        }
    }

    #[test]
    fn test_coerce_numeric_string_candidate() {
        let attr = json!({ "dbusPath": "/Soc", "value": "82" });
        match coerce_value(&attr) {
            ValueRecord::Scalar { value, .. } => assert_eq!(value, json!(82)),
            other => panic!("expected scalar, got {other:?}"),
        }
    }

    #[test]
    fn test_coerce_state_record() {
        let attr = json!({
            "dbusPath": "/State",
            "rawValue": 3,
            "formattedValue": "Bulk",
            "code": "SS",
        });
        match coerce_value(&attr) {
            ValueRecord::State { value, text, source, .. } => {
                assert_eq!(value, Number::from(3));
                assert_eq!(text, "Bulk");
                assert_eq!(source.vrm_code, Some("SS".to_string()));
            }
            other => panic!("expected state, got {other:?}"),
        }
    }

    #[test]
    fn test_coerce_numeric_text_stays_scalar() {
        // A text alternative that is itself numeric adds nothing.
        let attr = json!({ "dbusPath": "/Soc", "rawValue": 82, "formattedValue": "82" });
        assert!(matches!(coerce_value(&attr), ValueRecord::Scalar { .. }));
    }

    #[test]
    fn test_coerce_text_only_scalar() {
        let attr = json!({ "dbusPath": "/Serial", "formattedValue": "HQ2133ABCDE" });
        match coerce_value(&attr) {
            ValueRecord::Scalar { value, ts, .. } => {
                assert_eq!(value, json!("HQ2133ABCDE"));
                assert_eq!(ts, None);
            }
            other => panic!("expected scalar, got {other:?}"),
        }
    }

    #[test]
    fn test_coerce_empty_record_yields_null_scalar() {
        let attr = json!({ "dbusPath": "/Empty" });
        match coerce_value(&attr) {
            ValueRecord::Scalar { value, unit, .. } => {
                assert_eq!(value, Value::Null);
                assert_eq!(unit, None);
            }
            other => panic!("expected scalar, got {other:?}"),
        }
    }

    #[test]
    fn test_coerce_percent_unit_discarded_but_explicit_unit_kept() {
        let attr = json!({ "dbusPath": "/Soc", "rawValue": 82, "formatWithUnit": "82 %", "unit": "pct" });
        match coerce_value(&attr) {
            ValueRecord::Scalar { unit, .. } => assert_eq!(unit, Some("pct".to_string())),
            other => panic!("expected scalar, got {other:?}"),
        }
    }

    #[test]
    fn test_non_numeric_timestamp_is_null() {
        let attr = json!({ "dbusPath": "/X", "rawValue": 1, "timestamp": "yesterday" });
        assert_eq!(coerce_value(&attr).ts(), None);
    }
}
