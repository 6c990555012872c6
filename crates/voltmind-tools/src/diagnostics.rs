//! Chunked diagnostics listing tools.
//!
//! `diagnostics_index` discovers devices and signals; `diagnostics_values`
//! returns their coerced current values. Both share the scan → canonicalize
//! → catalog pipeline and split their device arrays across byte-bounded
//! envelopes.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use voltmind_core::{
    build_catalog, chunk_envelopes, Capture, CatalogFilter, CatalogMode, DeviceEntry, Envelope,
};
use voltmind_vrm::VrmClient;

use crate::error::Result;
use crate::tool::{object_schema, parse_args, Tool, ToolOutput};

fn chunked_payloads(
    devices: Vec<DeviceEntry>,
    site_id: u64,
    max_ts: i64,
    max_chunk_bytes: usize,
) -> Result<Vec<Value>> {
    let ts = if max_ts > 0 {
        max_ts
    } else {
        chrono::Utc::now().timestamp()
    };
    let capture = Capture { site_id, ts };
    let envelopes = chunk_envelopes(
        devices,
        |index, of| Envelope::skeleton(capture, index, of),
        max_chunk_bytes,
    )?;
    envelopes
        .into_iter()
        .map(|env| serde_json::to_value(env).map_err(Into::into))
        .collect()
}

/// Discover devices and dbus signals from diagnostics (chunked).
pub struct DiagnosticsIndexTool {
    client: Arc<VrmClient>,
}

impl DiagnosticsIndexTool {
    pub fn new(client: Arc<VrmClient>) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct IndexArgs {
    include: Option<Vec<String>>,
    devices: Option<Vec<String>>,
    types: Option<Vec<String>>,
    #[serde(rename = "maxChunkBytes")]
    max_chunk_bytes: Option<usize>,
}

#[async_trait]
impl Tool for DiagnosticsIndexTool {
    fn name(&self) -> &str {
        "diagnostics_index"
    }

    fn description(&self) -> &str {
        "Discover devices and dbus signals from diagnostics (chunked). Filters: include (signal globs: \"dbus:/Pv/V\"), devices (deviceId globs), types. Use before diagnostics_values."
    }

    fn parameters(&self) -> Value {
        object_schema(serde_json::json!({
            "include": { "type": "array", "items": { "type": "string" } },
            "devices": { "type": "array", "items": { "type": "string" } },
            "types": { "type": "array", "items": { "type": "string" } },
            "maxChunkBytes": { "type": "number" },
        }))
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let args: IndexArgs = parse_args(args)?;
        let max_chunk_bytes = args
            .max_chunk_bytes
            .unwrap_or_else(|| self.client.default_max_chunk_bytes());

        let tree = self.client.get_site_json("/diagnostics").await?;
        let filter = CatalogFilter {
            types: args.types,
            devices: args.devices,
            include: args.include,
            since_ts: None,
        };
        let catalog = build_catalog(&tree, CatalogMode::Signals, &filter)?;

        let payloads = chunked_payloads(
            catalog.devices,
            self.client.site_id(),
            catalog.max_ts,
            max_chunk_bytes,
        )?;
        Ok(ToolOutput::chunked(payloads))
    }
}

/// Current values for diagnostics signals (chunked).
pub struct DiagnosticsValuesTool {
    client: Arc<VrmClient>,
}

impl DiagnosticsValuesTool {
    pub fn new(client: Arc<VrmClient>) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ValuesArgs {
    include: Option<Vec<String>>,
    devices: Option<Vec<String>>,
    types: Option<Vec<String>>,
    #[serde(rename = "sinceTs")]
    since_ts: Option<u64>,
    #[serde(rename = "maxChunkBytes")]
    max_chunk_bytes: Option<usize>,
}

#[async_trait]
impl Tool for DiagnosticsValuesTool {
    fn name(&self) -> &str {
        "diagnostics_values"
    }

    fn description(&self) -> &str {
        "Current values for diagnostics signals (chunked). Filters: include, devices, types, sinceTs. Deterministic ordering; includes units and timestamps."
    }

    fn parameters(&self) -> Value {
        object_schema(serde_json::json!({
            "include": { "type": "array", "items": { "type": "string" } },
            "devices": { "type": "array", "items": { "type": "string" } },
            "types": { "type": "array", "items": { "type": "string" } },
            "sinceTs": { "type": "number" },
            "maxChunkBytes": { "type": "number" },
        }))
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let args: ValuesArgs = parse_args(args)?;
        let max_chunk_bytes = args
            .max_chunk_bytes
            .unwrap_or_else(|| self.client.default_max_chunk_bytes());

        let tree = self.client.get_site_json("/diagnostics").await?;
        let filter = CatalogFilter {
            types: args.types,
            devices: args.devices,
            include: args.include,
            since_ts: args.since_ts.map(|ts| ts as i64),
        };
        let catalog = build_catalog(&tree, CatalogMode::Values, &filter)?;

        let payloads = chunked_payloads(
            catalog.devices,
            self.client.site_id(),
            catalog.max_ts,
            max_chunk_bytes,
        )?;
        Ok(ToolOutput::chunked(payloads))
    }
}
