//! Device catalog aggregation.
//!
//! Collapses scanned attribute records into one entry per device id,
//! applies the optional type/device/signal/timestamp filters, and
//! establishes the deterministic ordering every response relies on:
//! devices by (type, instance, name), children by signal id.

use std::collections::HashMap;

use regex::Regex;
use serde::Serialize;
use serde_json::{Number, Value};

use crate::canonical::{
    canonical_type, coerce_value, instance_of, CanonicalType, DeviceId, SignalId, ValueRecord,
    ValueSource,
};
use crate::error::Result;
use crate::glob::glob_to_regex;
use crate::name::derive_device_name;
use crate::scan::scan_attributes;

/// What the per-device child arrays carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogMode {
    /// No child arrays, just device identity and name
    Inventory,
    /// Signal descriptors (id, unit, provenance, last timestamp)
    Signals,
    /// Coerced current values
    Values,
}

/// Optional, independently combinable catalog filters.
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    /// Canonical-type membership (case-insensitive)
    pub types: Option<Vec<String>>,
    /// Device-id globs, matched against the full `type:instance` string
    pub devices: Option<Vec<String>>,
    /// Signal-id globs, matched against `dbus:<path>`
    pub include: Option<Vec<String>>,
    /// Strictly-greater lower bound on value timestamps (values mode only)
    pub since_ts: Option<i64>,
}

/// One signal descriptor in signals mode.
#[derive(Debug, Clone, Serialize)]
pub struct SignalEntry {
    #[serde(rename = "signalId")]
    pub signal_id: SignalId,
    pub unit: Option<String>,
    pub source: ValueSource,
    #[serde(rename = "lastTs", skip_serializing_if = "Option::is_none")]
    pub last_ts: Option<i64>,
}

/// State payload of a values-mode entry.
#[derive(Debug, Clone, Serialize)]
pub struct StateValue {
    pub value: Number,
    pub text: String,
}

/// One entry in a values-mode array.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ValueEntry {
    Scalar {
        #[serde(rename = "signalId")]
        signal_id: SignalId,
        value: Value,
        unit: Option<String>,
        ts: Option<i64>,
        source: ValueSource,
    },
    State {
        #[serde(rename = "signalId")]
        signal_id: SignalId,
        state: StateValue,
        ts: Option<i64>,
        source: ValueSource,
    },
}

impl ValueEntry {
    fn from_record(signal_id: SignalId, record: ValueRecord) -> Self {
        match record {
            ValueRecord::Scalar {
                value,
                unit,
                ts,
                source,
            } => Self::Scalar {
                signal_id,
                value,
                unit,
                ts,
                source,
            },
            ValueRecord::State {
                value,
                text,
                ts,
                source,
            } => Self::State {
                signal_id,
                state: StateValue { value, text },
                ts,
                source,
            },
        }
    }

    pub fn signal_id(&self) -> &SignalId {
        match self {
            Self::Scalar { signal_id, .. } | Self::State { signal_id, .. } => signal_id,
        }
    }
}

/// Aggregated device entry.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceEntry {
    #[serde(rename = "deviceId")]
    pub device_id: DeviceId,
    #[serde(rename = "type")]
    pub device_type: CanonicalType,
    pub name: Option<String>,
    pub instance: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signals: Option<Vec<SignalEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<ValueEntry>>,
}

/// A built catalog plus the newest timestamp observed while building it
/// (0 when no record carried one).
#[derive(Debug, Clone)]
pub struct Catalog {
    pub devices: Vec<DeviceEntry>,
    pub max_ts: i64,
}

struct DeviceBuild {
    device_id: DeviceId,
    device_type: CanonicalType,
    instance: i64,
    device_name: Option<String>,
    custom_name: Option<String>,
    signals: Vec<SignalEntry>,
    values: Vec<ValueEntry>,
}

struct CompiledFilter {
    types: Option<Vec<String>>,
    devices: Option<Vec<Regex>>,
    include: Option<Vec<Regex>>,
    since_ts: i64,
}

fn compile_filter(filter: &CatalogFilter) -> Result<CompiledFilter> {
    let compile_globs = |globs: &Option<Vec<String>>| -> Result<Option<Vec<Regex>>> {
        match globs {
            Some(list) if !list.is_empty() => Ok(Some(
                list.iter()
                    .map(|g| glob_to_regex(g))
                    .collect::<Result<Vec<_>>>()?,
            )),
            _ => Ok(None),
        }
    };
    Ok(CompiledFilter {
        types: filter.types.as_ref().filter(|t| !t.is_empty()).map(|types| {
            types.iter().map(|t| t.to_lowercase()).collect()
        }),
        devices: compile_globs(&filter.devices)?,
        include: compile_globs(&filter.include)?,
        since_ts: filter.since_ts.unwrap_or(0),
    })
}

/// Build a catalog from a diagnostics tree.
pub fn build_catalog(tree: &Value, mode: CatalogMode, filter: &CatalogFilter) -> Result<Catalog> {
    let compiled = compile_filter(filter)?;
    let records = scan_attributes(tree);

    let mut builds: HashMap<DeviceId, DeviceBuild> = HashMap::new();
    let mut order: Vec<DeviceId> = Vec::new();
    let mut max_ts = 0i64;

    for attr in &records {
        let device_type = canonical_type(attr);
        if let Some(types) = &compiled.types {
            if !types.iter().any(|t| t == device_type.name().as_ref()) {
                continue;
            }
        }
        let instance = instance_of(attr);
        let device_id = DeviceId::new(&device_type, instance);

        let Some(path) = attr.get("dbusPath").and_then(Value::as_str) else {
            continue;
        };
        let signal_id = SignalId::from_dbus_path(path);
        if let Some(include) = &compiled.include {
            if !include.iter().any(|rx| rx.is_match(signal_id.as_str())) {
                continue;
            }
        }

        // Values mode coerces before grouping so the sinceTs bound can
        // reject a record without creating its device.
        let value_entry = if mode == CatalogMode::Values {
            let record = coerce_value(attr);
            let ts = record.ts().unwrap_or(0);
            if compiled.since_ts > 0 && ts <= compiled.since_ts {
                continue;
            }
            if ts > max_ts {
                max_ts = ts;
            }
            Some(ValueEntry::from_record(signal_id.clone(), record))
        } else {
            None
        };

        let build = builds.entry(device_id.clone()).or_insert_with(|| {
            order.push(device_id.clone());
            DeviceBuild {
                device_id,
                device_type,
                instance,
                device_name: None,
                custom_name: None,
                signals: Vec::new(),
                values: Vec::new(),
            }
        });

        // Explicit names on any contributing record beat the derived name.
        if build.device_name.is_none() {
            build.device_name = attr
                .get("deviceName")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
        }
        if build.custom_name.is_none() {
            build.custom_name = attr
                .get("customName")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
        }

        match mode {
            CatalogMode::Inventory => {}
            CatalogMode::Signals => {
                let unit = crate::canonical::unit_from_format(
                    attr.get("formatWithUnit").and_then(Value::as_str),
                )
                .or_else(|| {
                    attr.get("unit")
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                });
                let last_ts = attr
                    .get("timestamp")
                    .and_then(crate::canonical::json_to_i64)
                    .filter(|ts| *ts != 0);
                if let Some(ts) = last_ts {
                    if ts > max_ts {
                        max_ts = ts;
                    }
                }
                build.signals.push(SignalEntry {
                    signal_id,
                    unit,
                    source: source_of(attr),
                    last_ts,
                });
            }
            CatalogMode::Values => {
                if let Some(entry) = value_entry {
                    build.values.push(entry);
                }
            }
        }
    }

    let mut devices: Vec<DeviceEntry> = Vec::with_capacity(order.len());
    for device_id in order {
        let Some(build) = builds.remove(&device_id) else {
            continue;
        };
        if let Some(device_globs) = &compiled.devices {
            if !device_globs
                .iter()
                .any(|rx| rx.is_match(build.device_id.as_str()))
            {
                continue;
            }
        }
        let name = build
            .device_name
            .or(build.custom_name)
            .or_else(|| derive_device_name(&records, build.instance, &build.device_type));

        let (signals, values) = match mode {
            CatalogMode::Inventory => (None, None),
            CatalogMode::Signals => {
                let mut signals = build.signals;
                signals.sort_by(|a, b| a.signal_id.cmp(&b.signal_id));
                (Some(signals), None)
            }
            CatalogMode::Values => {
                let mut values = build.values;
                values.sort_by(|a, b| a.signal_id().cmp(b.signal_id()));
                (None, Some(values))
            }
        };

        devices.push(DeviceEntry {
            device_id: build.device_id,
            device_type: build.device_type,
            name,
            instance: build.instance,
            signals,
            values,
        });
    }

    sort_devices(&mut devices);
    Ok(Catalog { devices, max_ts })
}

/// Stable device ordering: type, then instance, then name (absent sorts as
/// the empty string).
pub fn sort_devices(devices: &mut [DeviceEntry]) {
    devices.sort_by(|a, b| {
        a.device_type
            .name()
            .cmp(&b.device_type.name())
            .then_with(|| a.instance.cmp(&b.instance))
            .then_with(|| a.name.as_deref().unwrap_or("").cmp(b.name.as_deref().unwrap_or("")))
    });
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_tree() -> Value {
        json!({
            "records": [
                {
                    "dbusServiceType": "solarcharger",
                    "instance": 1,
                    "dbusPath": "/Dc/0/Voltage",
                    "rawValue": 13.2,
                    "formatWithUnit": "13.2 V",
                    "timestamp": 1700000100,
                },
                {
                    "dbusServiceType": "solarcharger",
                    "instance": 1,
                    "dbusPath": "/CustomName",
                    "description": "Custom name",
                    "formattedValue": "Roof MPPT",
                    "timestamp": 1700000050,
                },
                {
                    "dbusServiceType": "battery",
                    "instance": 2,
                    "dbusPath": "/Soc",
                    "rawValue": 82,
                    "formatWithUnit": "82 %",
                    "timestamp": 1700000200,
                },
                {
                    "dbusServiceType": "battery",
                    "instance": 2,
                    "dbusPath": "/CustomName",
                    "description": "Custom name",
                    "formattedValue": "House Bank",
                },
            ]
        })
    }

    #[test]
    fn test_builds_one_entry_per_device() {
        let catalog =
            build_catalog(&sample_tree(), CatalogMode::Signals, &CatalogFilter::default()).unwrap();
        assert_eq!(catalog.devices.len(), 2);
        // battery_monitor sorts before solar_charger
        assert_eq!(catalog.devices[0].device_id.as_str(), "battery_monitor:2");
        assert_eq!(catalog.devices[1].device_id.as_str(), "solar_charger:1");
        assert_eq!(catalog.devices[0].name.as_deref(), Some("House Bank"));
        assert_eq!(catalog.devices[1].name.as_deref(), Some("Roof MPPT"));
        assert_eq!(catalog.max_ts, 1700000200);
    }

    #[test]
    fn test_signals_sorted_by_signal_id() {
        let catalog =
            build_catalog(&sample_tree(), CatalogMode::Signals, &CatalogFilter::default()).unwrap();
        let solar = &catalog.devices[1];
        let ids: Vec<&str> = solar
            .signals
            .as_ref()
            .unwrap()
            .iter()
            .map(|s| s.signal_id.as_str())
            .collect();
        assert_eq!(ids, vec!["dbus:/CustomName", "dbus:/Dc/0/Voltage"]);
    }

    #[test]
    fn test_type_filter_is_case_insensitive() {
        let filter = CatalogFilter {
            types: Some(vec!["Battery_Monitor".to_string()]),
            ..Default::default()
        };
        let catalog = build_catalog(&sample_tree(), CatalogMode::Signals, &filter).unwrap();
        assert_eq!(catalog.devices.len(), 1);
        assert_eq!(catalog.devices[0].device_id.as_str(), "battery_monitor:2");
    }

    #[test]
    fn test_device_glob_filter() {
        let filter = CatalogFilter {
            devices: Some(vec!["solar*".to_string()]),
            ..Default::default()
        };
        let catalog = build_catalog(&sample_tree(), CatalogMode::Signals, &filter).unwrap();
        assert_eq!(catalog.devices.len(), 1);
        assert_eq!(catalog.devices[0].device_id.as_str(), "solar_charger:1");
    }

    #[test]
    fn test_include_glob_filters_signals() {
        let filter = CatalogFilter {
            include: Some(vec!["dbus:/Soc".to_string()]),
            ..Default::default()
        };
        let catalog = build_catalog(&sample_tree(), CatalogMode::Signals, &filter).unwrap();
        assert_eq!(catalog.devices.len(), 1);
        assert_eq!(catalog.devices[0].signals.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_since_ts_is_strictly_greater() {
        let filter = CatalogFilter {
            since_ts: Some(1700000100),
            ..Default::default()
        };
        let catalog = build_catalog(&sample_tree(), CatalogMode::Values, &filter).unwrap();
        // Only the /Soc record at 1700000200 survives; the voltage record
        // sits exactly on the bound and is excluded.
        assert_eq!(catalog.devices.len(), 1);
        let values = catalog.devices[0].values.as_ref().unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].signal_id().as_str(), "dbus:/Soc");
    }

    #[test]
    fn test_explicit_custom_name_field_wins() {
        let tree = json!({
            "records": [
                {
                    "dbusServiceType": "battery",
                    "instance": 0,
                    "dbusPath": "/Soc",
                    "customName": "Override",
                },
                {
                    "dbusServiceType": "battery",
                    "instance": 0,
                    "dbusPath": "/CustomName",
                    "description": "Custom name",
                    "formattedValue": "Derived",
                },
            ]
        });
        let catalog =
            build_catalog(&tree, CatalogMode::Inventory, &CatalogFilter::default()).unwrap();
        assert_eq!(catalog.devices[0].name.as_deref(), Some("Override"));
    }

    #[test]
    fn test_empty_tree_yields_empty_catalog() {
        let catalog = build_catalog(
            &Value::Null,
            CatalogMode::Signals,
            &CatalogFilter::default(),
        )
        .unwrap();
        assert!(catalog.devices.is_empty());
        assert_eq!(catalog.max_ts, 0);
    }

    #[test]
    fn test_inventory_mode_has_no_children() {
        let catalog =
            build_catalog(&sample_tree(), CatalogMode::Inventory, &CatalogFilter::default())
                .unwrap();
        assert!(catalog.devices.iter().all(|d| d.signals.is_none() && d.values.is_none()));
        let text = serde_json::to_string(&catalog.devices[0]).unwrap();
        assert!(!text.contains("\"signals\""));
        assert!(!text.contains("\"values\""));
    }

    #[test]
    fn test_values_state_and_scalar_shapes() {
        let tree = json!({
            "records": [
                {
                    "dbusServiceType": "vebus",
                    "instance": 0,
                    "dbusPath": "/State",
                    "rawValue": 3,
                    "formattedValue": "Bulk",
                },
                {
                    "dbusServiceType": "vebus",
                    "instance": 0,
                    "dbusPath": "/Ac/Out/P",
                    "rawValue": 1200,
                    "formatWithUnit": "1200 W",
                },
            ]
        });
        let catalog =
            build_catalog(&tree, CatalogMode::Values, &CatalogFilter::default()).unwrap();
        let values = catalog.devices[0].values.as_ref().unwrap();
        let json = serde_json::to_value(values).unwrap();
        assert_eq!(json[0]["value"], json!(1200));
        assert_eq!(json[0]["unit"], json!("W"));
        assert_eq!(json[1]["state"], json!({ "value": 3, "text": "Bulk" }));
        assert!(json[1].get("unit").is_none());
    }
}
