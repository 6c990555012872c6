//! Widget-backed tools.
//!
//! The remote API exposes pre-aggregated "widgets" per installation
//! (BatterySummary, GPS, Overview, ...). These tools wrap them: fetch one,
//! probe availability, and the two dedicated wrappers for battery and GPS.
//! GPS additionally falls back to scanning diagnostics position signals
//! when the widget is unavailable.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use voltmind_core::{as_number, scan_attributes};
use voltmind_vrm::VrmClient;

use crate::error::Result;
use crate::tool::{object_schema, parse_args, Tool, ToolOutput};

/// Widget endpoint suffix: `/widgets/<name>[?instance=N]`.
fn widget_suffix(widget: &str, instance: Option<u64>) -> String {
    let encoded = urlencoding::encode(widget);
    match instance {
        Some(instance) => format!("/widgets/{encoded}?instance={instance}"),
        None => format!("/widgets/{encoded}"),
    }
}

/// Tag a widget response with its source, keeping any source field the
/// response itself carries.
pub(crate) fn tag_source(payload: Value, source: &str) -> Value {
    let mut map = match payload {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
    };
    map.entry("source".to_string())
        .or_insert_with(|| Value::String(source.to_string()));
    Value::Object(map)
}

/// Battery summary via the BatterySummary widget.
pub struct BatterySummaryTool {
    client: Arc<VrmClient>,
}

impl BatterySummaryTool {
    pub fn new(client: Arc<VrmClient>) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct InstanceArgs {
    instance: Option<u64>,
}

#[async_trait]
impl Tool for BatterySummaryTool {
    fn name(&self) -> &str {
        "battery_summary"
    }

    fn description(&self) -> &str {
        "Battery summary widget. Returns SoC, voltage, current, power, time-to-go, and alarm flags. Optional: instance."
    }

    fn parameters(&self) -> Value {
        object_schema(json!({ "instance": { "type": "number" } }))
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let args: InstanceArgs = parse_args(args)?;
        let payload = self
            .client
            .get_site_json(&widget_suffix("BatterySummary", args.instance))
            .await?;
        Ok(ToolOutput::single(tag_source(payload, "vrm")))
    }
}

/// Last-known GPS position.
pub struct GpsTool {
    client: Arc<VrmClient>,
}

impl GpsTool {
    pub fn new(client: Arc<VrmClient>) -> Self {
        Self { client }
    }

    /// Fallback: scan diagnostics for position signals when the widget is
    /// unavailable.
    async fn from_diagnostics(&self) -> Result<Value> {
        let tree = self.client.get_site_json("/diagnostics").await?;
        let mut data = Map::new();
        let mut latest_ts = 0i64;

        for rec in scan_attributes(&tree) {
            let Some(path) = rec.get("dbusPath").and_then(Value::as_str) else {
                continue;
            };
            let ts = rec
                .get("timestamp")
                .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)));
            let formatted = rec
                .get("formattedValue")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .or_else(|| {
                    rec.get("textValue")
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty())
                });
            let raw = rec
                .get("rawValue")
                .filter(|v| !v.is_null())
                .or_else(|| rec.get("value").filter(|v| !v.is_null()));
            let num = raw.and_then(as_number);

            let entry: Option<(&str, Value)> = match path {
                "/Position/Latitude" => num.clone().map(|n| ("lat", Value::Number(n))),
                "/Position/Longitude" => num.clone().map(|n| ("lng", Value::Number(n))),
                "/Position/Altitude" => num
                    .clone()
                    .map(Value::Number)
                    .or_else(|| formatted.map(|s| Value::String(s.to_string())))
                    .map(|v| ("altitude", v)),
                "/Speed" => num.clone().map(|n| ("speed", Value::Number(n))),
                "/Course" => num
                    .clone()
                    .map(Value::Number)
                    .or_else(|| formatted.map(|s| Value::String(s.to_string())))
                    .map(|v| ("course", v)),
                _ => None,
            };
            if let Some((key, value)) = entry {
                data.insert(key.to_string(), value);
                if let Some(ts) = ts {
                    if ts > latest_ts {
                        latest_ts = ts;
                    }
                }
            }
        }

        let mut out = json!({ "source": "diagnostics", "data": data });
        if latest_ts > 0 {
            out["ts"] = json!(latest_ts);
        }
        Ok(out)
    }
}

#[async_trait]
impl Tool for GpsTool {
    fn name(&self) -> &str {
        "gps"
    }

    fn description(&self) -> &str {
        "Last-known GPS position. Returns lat, lon, speed, course, altitude. Falls back to diagnostics GPS signals if the widget is unavailable. Optional: instance."
    }

    fn parameters(&self) -> Value {
        object_schema(json!({ "instance": { "type": "number" } }))
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let args: InstanceArgs = parse_args(args)?;
        match self
            .client
            .get_site_json(&widget_suffix("GPS", args.instance))
            .await
        {
            Ok(payload) => Ok(ToolOutput::single(tag_source(payload, "vrm"))),
            Err(err) => {
                debug!(error = %err, "GPS widget unavailable, scanning diagnostics");
                Ok(ToolOutput::single(self.from_diagnostics().await?))
            }
        }
    }
}

/// Fetch an arbitrary widget by name.
pub struct WidgetFetchTool {
    client: Arc<VrmClient>,
}

impl WidgetFetchTool {
    pub fn new(client: Arc<VrmClient>) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WidgetFetchArgs {
    widget: String,
    instance: Option<u64>,
}

#[async_trait]
impl Tool for WidgetFetchTool {
    fn name(&self) -> &str {
        "widget_fetch"
    }

    fn description(&self) -> &str {
        "Fetch widgets by name (e.g., BatterySummary, GPS). Optional: instance. Returns notAvailable=true for unsupported widgets."
    }

    fn parameters(&self) -> Value {
        object_schema(json!({
            "widget": { "type": "string" },
            "instance": { "type": "number" },
        }))
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let args: WidgetFetchArgs = parse_args(args)?;
        if args.widget.is_empty() {
            return Err(crate::error::ToolError::InvalidArguments(
                "widget must not be empty".to_string(),
            ));
        }
        match self
            .client
            .get_site_json(&widget_suffix(&args.widget, args.instance))
            .await
        {
            Ok(payload) => Ok(ToolOutput::single(tag_source(payload, "vrm"))),
            Err(err) if err.is_not_found() => Ok(ToolOutput::single(json!({
                "source": "vrm",
                "success": false,
                "notAvailable": true,
                "widget": args.widget,
                "message": "Widget not available for this site.",
            }))),
            Err(err) => Err(err.into()),
        }
    }
}

/// Probe availability of selected widgets.
pub struct WidgetListAvailableTool {
    client: Arc<VrmClient>,
}

impl WidgetListAvailableTool {
    pub fn new(client: Arc<VrmClient>) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WidgetListArgs {
    widgets: Option<Vec<String>>,
}

const DEFAULT_WIDGET_CANDIDATES: [&str; 3] = ["BatterySummary", "GPS", "Overview"];

#[async_trait]
impl Tool for WidgetListAvailableTool {
    fn name(&self) -> &str {
        "widget_list_available"
    }

    fn description(&self) -> &str {
        "Probe availability of selected widgets. Defaults to BatterySummary, GPS, Overview, or pass a custom list."
    }

    fn parameters(&self) -> Value {
        object_schema(json!({
            "widgets": { "type": "array", "items": { "type": "string" } },
        }))
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let args: WidgetListArgs = parse_args(args)?;
        let candidates: Vec<String> = match args.widgets {
            Some(list) if !list.is_empty() => list,
            _ => DEFAULT_WIDGET_CANDIDATES
                .iter()
                .map(|w| (*w).to_string())
                .collect(),
        };

        let probes = candidates.iter().map(|widget| {
            let client = self.client.clone();
            async move {
                match client.get_site_json(&widget_suffix(widget, None)).await {
                    Ok(payload) => json!({
                        "widget": widget,
                        "available": true,
                        "sample": { "success": payload.get("success").cloned().unwrap_or(Value::Null) },
                    }),
                    Err(err) => json!({
                        "widget": widget,
                        "available": false,
                        "reason": if err.is_not_found() { "not_found" } else { "error" },
                    }),
                }
            }
        });
        let results = join_all(probes).await;

        Ok(ToolOutput::single(json!({ "ok": true, "widgets": results })))
    }
}
