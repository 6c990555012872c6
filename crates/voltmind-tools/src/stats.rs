//! Time-series statistics tools.
//!
//! `historical_values` maps `dbus:<path>` signal ids to attribute codes via
//! diagnostics and queries the stats endpoint with them; zero resolvable
//! codes is a fatal, typed failure. `energy_stats_quick` is a convenience
//! wrapper with sensible defaults and an automatic widening fallback for
//! empty result windows.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use voltmind_core::{collect_attribute_codes, CoreError};
use voltmind_vrm::VrmClient;

use crate::error::{Result, ToolError};
use crate::tool::{object_schema, parse_args, Tool, ToolOutput};

fn encode_query(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(key, value)| {
            format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Time-series values via the stats endpoint (`type=custom`).
pub struct HistoricalValuesTool {
    client: Arc<VrmClient>,
}

impl HistoricalValuesTool {
    pub fn new(client: Arc<VrmClient>) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HistoricalArgs {
    signals: Vec<String>,
    /// Accepted for forward compatibility with per-device scoping.
    #[allow(dead_code)]
    device: Option<String>,
    #[serde(rename = "startTs")]
    start_ts: u64,
    #[serde(rename = "endTs")]
    end_ts: u64,
    resolution: Option<String>,
}

#[async_trait]
impl Tool for HistoricalValuesTool {
    fn name(&self) -> &str {
        "historical_values"
    }

    fn description(&self) -> &str {
        "Time-series via stats type=custom. Accepts attribute codes (e.g., PVP, PVV) and dbus:/... signals (auto-mapped). Provide startTs, endTs, resolution (e.g., 15mins, hours, days)."
    }

    fn parameters(&self) -> Value {
        object_schema(json!({
            "signals": { "type": "array", "items": { "type": "string" } },
            "device": { "type": "string" },
            "startTs": { "type": "number" },
            "endTs": { "type": "number" },
            "resolution": { "type": "string" },
        }))
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let args: HistoricalArgs = parse_args(args)?;

        let mut codes: Vec<String> = Vec::new();
        let mut dbus_signals: Vec<String> = Vec::new();
        for signal in &args.signals {
            if signal.starts_with("dbus:") {
                dbus_signals.push(signal.clone());
            } else if !signal.trim().is_empty() {
                let code = signal.trim().to_string();
                if !codes.contains(&code) {
                    codes.push(code);
                }
            }
        }

        if !dbus_signals.is_empty() {
            let tree = self.client.get_site_json("/diagnostics").await?;
            for code in collect_attribute_codes(&tree, &dbus_signals) {
                if !codes.contains(&code) {
                    codes.push(code);
                }
            }
        }

        if codes.is_empty() {
            return Err(ToolError::Core(CoreError::UnresolvedSignals {
                signals: args.signals,
            }));
        }

        let mut params: Vec<(&str, String)> = vec![
            ("type", "custom".to_string()),
            ("show_instance", "true".to_string()),
            ("start", args.start_ts.to_string()),
            ("end", args.end_ts.to_string()),
        ];
        if let Some(resolution) = &args.resolution {
            params.push(("interval", resolution.clone()));
        }
        for code in &codes {
            params.push(("attributeCodes[]", code.clone()));
        }

        let payload = self
            .client
            .get_site_json(&format!("/stats?{}", encode_query(&params)))
            .await?;
        Ok(ToolOutput::single(payload))
    }
}

/// Convenience wrapper over stats for common summaries.
pub struct EnergyStatsQuickTool {
    client: Arc<VrmClient>,
}

impl EnergyStatsQuickTool {
    pub fn new(client: Arc<VrmClient>) -> Self {
        Self { client }
    }

    async fn fetch_stats(
        &self,
        kind: &str,
        start: i64,
        end: i64,
        interval: &str,
        show_instances: bool,
    ) -> Result<Value> {
        let mut params: Vec<(&str, String)> = vec![
            ("type", kind.to_string()),
            ("interval", interval.to_string()),
            ("start", start.to_string()),
            ("end", end.to_string()),
        ];
        if show_instances {
            params.push(("show_instance", "true".to_string()));
        }
        let payload = self
            .client
            .get_site_json(&format!("/stats?{}", encode_query(&params)))
            .await?;
        Ok(payload)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct QuickArgs {
    kind: Option<String>,
    #[serde(rename = "startTs")]
    start_ts: Option<u64>,
    #[serde(rename = "endTs")]
    end_ts: Option<u64>,
    interval: Option<String>,
    #[serde(rename = "showInstances")]
    show_instances: Option<bool>,
    #[serde(rename = "autoFallback")]
    auto_fallback: Option<bool>,
}

/// Whether a stats result has no records and no totals.
fn is_empty_result(result: &Value) -> bool {
    let empty_array = |key: &str| {
        result
            .get(key)
            .and_then(Value::as_array)
            .is_some_and(Vec::is_empty)
    };
    empty_array("records") && empty_array("totals")
}

const DAY_SECS: i64 = 24 * 3600;

#[async_trait]
impl Tool for EnergyStatsQuickTool {
    fn name(&self) -> &str {
        "energy_stats_quick"
    }

    fn description(&self) -> &str {
        "Convenience wrapper over stats for common summaries (kind: solar|consumption). Defaults: interval=days, last 7 days, show_instance=true. Optional: autoFallback."
    }

    fn parameters(&self) -> Value {
        object_schema(json!({
            "kind": { "type": "string", "enum": ["solar", "consumption"] },
            "startTs": { "type": "number" },
            "endTs": { "type": "number" },
            "interval": { "type": "string", "enum": ["hours", "days"] },
            "showInstances": { "type": "boolean" },
            "autoFallback": { "type": "boolean" },
        }))
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let args: QuickArgs = parse_args(args)?;
        let kind_given = args.kind.is_some();
        let kind = match args.kind.as_deref() {
            None | Some("solar") => "solar",
            Some("consumption") => "consumption",
            Some(other) => {
                return Err(ToolError::InvalidArguments(format!(
                    "kind must be solar or consumption, got {other:?}"
                )))
            }
        };
        let interval = match args.interval.as_deref() {
            None | Some("days") => "days",
            Some("hours") => "hours",
            Some(other) => {
                return Err(ToolError::InvalidArguments(format!(
                    "interval must be hours or days, got {other:?}"
                )))
            }
        };
        let show_instances = args.show_instances.unwrap_or(true);
        let auto_fallback = args.auto_fallback.unwrap_or(true);

        let now = chrono::Utc::now().timestamp();
        let end_ts = args.end_ts.filter(|ts| *ts != 0).map_or(now, |ts| ts as i64);
        let default_window = if interval == "days" {
            7 * DAY_SECS
        } else {
            DAY_SECS
        };
        let start_ts = args
            .start_ts
            .filter(|ts| *ts != 0)
            .map_or(end_ts - default_window, |ts| ts as i64);

        let mut result = self
            .fetch_stats(kind, start_ts, end_ts, interval, show_instances)
            .await?;

        if is_empty_result(&result) && auto_fallback {
            let wider_start = end_ts
                - if interval == "days" {
                    30 * DAY_SECS
                } else {
                    7 * DAY_SECS
                };
            debug!(kind, wider_start, "empty stats window, widening");
            result = self
                .fetch_stats(kind, wider_start, end_ts, interval, show_instances)
                .await?;

            if is_empty_result(&result) && !kind_given {
                let other = if kind == "solar" { "consumption" } else { "solar" };
                result = self
                    .fetch_stats(other, wider_start, end_ts, interval, show_instances)
                    .await?;
            }
        }

        Ok(ToolOutput::single(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_query_escapes_brackets() {
        let query = encode_query(&[
            ("type", "custom".to_string()),
            ("attributeCodes[]", "PVP".to_string()),
        ]);
        assert_eq!(query, "type=custom&attributeCodes%5B%5D=PVP");
    }

    #[test]
    fn test_is_empty_result() {
        assert!(is_empty_result(&json!({ "records": [], "totals": [] })));
        assert!(!is_empty_result(&json!({ "records": [1], "totals": [] })));
        assert!(!is_empty_result(&json!({ "records": [] })));
        assert!(!is_empty_result(&json!({})));
    }
}
