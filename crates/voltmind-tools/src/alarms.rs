//! Active alarms tool.
//!
//! The primary path asks the official alarms endpoint. When that fails the
//! tool degrades to scanning diagnostics for `/Alarms/` signals and keeping
//! the ones whose value reads as active.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use voltmind_core::{
    canonical_type, coerce_value, instance_of, scan_attributes, DeviceId, SignalId, ValueRecord,
    SCHEMA_VERSION,
};
use voltmind_vrm::VrmClient;

use crate::error::Result;
use crate::tool::{object_schema, parse_args, Tool, ToolOutput};
use crate::widgets::tag_source;

fn inactive_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\s*(ok|no alarm)\s*$").expect("inactive pattern is valid")
    })
}

/// Active alarms for the installation.
pub struct AlarmsTool {
    client: Arc<VrmClient>,
}

impl AlarmsTool {
    pub fn new(client: Arc<VrmClient>) -> Self {
        Self { client }
    }

    async fn from_diagnostics(&self) -> Result<Value> {
        let tree = self.client.get_site_json("/diagnostics").await?;
        let mut active: Vec<Value> = Vec::new();

        for rec in scan_attributes(&tree) {
            let Some(path) = rec.get("dbusPath").and_then(Value::as_str) else {
                continue;
            };
            if !path.to_lowercase().contains("/alarms/") {
                continue;
            }
            let device_type = canonical_type(rec);
            let instance = instance_of(rec);
            let device_id = DeviceId::new(&device_type, instance);
            let signal_id = SignalId::from_dbus_path(path);
            let record = coerce_value(rec);

            let is_alarm = match &record {
                ValueRecord::State { value, .. } => value.as_f64().is_some_and(|v| v != 0.0),
                ValueRecord::Scalar { value, .. } => match value {
                    Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
                    Value::String(s) => !inactive_pattern().is_match(s),
                    _ => false,
                },
            };
            if !is_alarm {
                continue;
            }

            let entry = match record {
                ValueRecord::State {
                    value,
                    text,
                    ts,
                    source,
                } => json!({
                    "deviceId": device_id,
                    "type": device_type,
                    "instance": instance,
                    "signalId": signal_id,
                    "state": { "value": value, "text": text },
                    "ts": ts,
                    "source": source,
                }),
                ValueRecord::Scalar {
                    value,
                    unit,
                    ts,
                    source,
                } => json!({
                    "deviceId": device_id,
                    "type": device_type,
                    "instance": instance,
                    "signalId": signal_id,
                    "value": value,
                    "unit": unit,
                    "ts": ts,
                    "source": source,
                }),
            };
            active.push(entry);
        }

        active.sort_by(|a, b| {
            let key = |v: &Value| {
                (
                    v["type"].as_str().unwrap_or("").to_string(),
                    v["instance"].as_i64().unwrap_or(0),
                    v["signalId"].as_str().unwrap_or("").to_string(),
                )
            };
            key(a).cmp(&key(b))
        });

        Ok(json!({
            "ok": true,
            "schemaVersion": SCHEMA_VERSION,
            "capture": {
                "siteId": self.client.site_id(),
                "ts": chrono::Utc::now().timestamp(),
            },
            "count": active.len(),
            "alarms": active,
            "source": "diagnostics",
        }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AlarmsArgs {
    #[serde(rename = "sinceTs")]
    since_ts: Option<u64>,
}

#[async_trait]
impl Tool for AlarmsTool {
    fn name(&self) -> &str {
        "alarms"
    }

    fn description(&self) -> &str {
        "Active alarms for the installation. Falls back to scanning diagnostics /Alarms/* if unavailable. Optional: sinceTs."
    }

    fn parameters(&self) -> Value {
        object_schema(json!({ "sinceTs": { "type": "number" } }))
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let args: AlarmsArgs = parse_args(args)?;
        let suffix = match args.since_ts {
            Some(since) => format!("/alarms?since={since}"),
            None => "/alarms".to_string(),
        };
        match self.client.get_site_json(&suffix).await {
            Ok(payload) => Ok(ToolOutput::single(tag_source(payload, "vrm"))),
            Err(err) => {
                debug!(error = %err, "alarms endpoint failed, scanning diagnostics");
                Ok(ToolOutput::single(self.from_diagnostics().await?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_pattern() {
        for text in ["ok", "OK", " No Alarm ", "no alarm"] {
            assert!(inactive_pattern().is_match(text), "{text:?}");
        }
        for text in ["Low voltage", "alarm", "warning"] {
            assert!(!inactive_pattern().is_match(text), "{text:?}");
        }
    }
}
