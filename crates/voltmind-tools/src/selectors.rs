//! Selector resolution tool.
//!
//! Builds the unfiltered device catalog, backfills missing names from a
//! second inventory pass, enriches the alias table and catalog from the
//! site overview and GPS-widget probe (best effort, concurrent), then runs
//! the tiered matcher for every selector.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use voltmind_core::{
    build_catalog, enrich_from_site, resolve_selectors, AliasTable, CatalogFilter, CatalogMode,
    DeviceRef, SCHEMA_VERSION,
};
use voltmind_vrm::VrmClient;

use crate::error::Result;
use crate::tool::{object_schema, parse_args, Tool, ToolOutput};

/// Resolve selectors (names/globs/aliases) to device ids.
pub struct ResolveDeviceSelectorsTool {
    client: Arc<VrmClient>,
}

impl ResolveDeviceSelectorsTool {
    pub fn new(client: Arc<VrmClient>) -> Self {
        Self { client }
    }

    /// Primary catalog: every device from diagnostics, no filters.
    async fn base_catalog(&self) -> Result<Vec<DeviceRef>> {
        let tree = self.client.get_site_json("/diagnostics").await?;
        let catalog = build_catalog(&tree, CatalogMode::Signals, &CatalogFilter::default())?;
        Ok(catalog
            .devices
            .into_iter()
            .map(|d| DeviceRef {
                device_id: d.device_id,
                device_type: d.device_type,
                instance: d.instance,
                name: d.name,
            })
            .collect())
    }

    /// Best-effort name backfill from a fresh inventory pass.
    async fn backfill_names(&self, catalog: &mut [DeviceRef]) {
        let inventory = async {
            let tree = self.client.get_site_json("/diagnostics").await?;
            build_catalog(&tree, CatalogMode::Inventory, &CatalogFilter::default())
                .map_err(crate::error::ToolError::from)
        }
        .await;

        match inventory {
            Ok(inventory) => {
                for device in catalog.iter_mut().filter(|d| d.name.is_none()) {
                    if let Some(found) = inventory
                        .devices
                        .iter()
                        .find(|inv| inv.device_id == device.device_id)
                    {
                        device.name.clone_from(&found.name);
                    }
                }
            }
            Err(err) => debug!(error = %err, "inventory backfill skipped"),
        }
    }

    /// Probe GPS-widget availability, shaped for the enrichment step.
    ///
    /// `None` means the probe itself failed (not that the widget is
    /// missing), which degrades enrichment.
    async fn probe_gps_widget(&self) -> Option<Value> {
        match self.client.get_site_json("/widgets/GPS").await {
            Ok(_) => Some(json!({ "widgets": [{ "widget": "GPS", "available": true }] })),
            Err(err) if err.is_not_found() => {
                Some(json!({ "widgets": [{ "widget": "GPS", "available": false }] }))
            }
            Err(err) => {
                debug!(error = %err, "GPS widget probe failed");
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SelectorsArgs {
    selectors: Vec<String>,
}

#[async_trait]
impl Tool for ResolveDeviceSelectorsTool {
    fn name(&self) -> &str {
        "resolve_device_selectors"
    }

    fn description(&self) -> &str {
        "Resolve selectors (names/globs/aliases) to deviceIds. Priority: exact deviceId → exact name → strict glob (id/name) → substring/aliases → product-class aliases."
    }

    fn parameters(&self) -> Value {
        object_schema(json!({
            "selectors": { "type": "array", "items": { "type": "string" } },
        }))
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let args: SelectorsArgs = parse_args(args)?;

        let mut catalog = self.base_catalog().await?;
        self.backfill_names(&mut catalog).await;

        let mut aliases = AliasTable::seeded();

        // Best-effort enrichment: both site fetches run concurrently and a
        // failure of either degrades the outcome without failing the call.
        let (overview, widgets) = tokio::join!(
            self.client.get_site_json("/system-overview"),
            self.probe_gps_widget(),
        );
        let overview = match overview {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(error = %err, "system overview fetch failed");
                None
            }
        };
        let enrichment = enrich_from_site(
            &mut catalog,
            &mut aliases,
            overview.as_ref(),
            widgets.as_ref(),
        );
        if !enrichment.complete {
            debug!(?enrichment, "resolving with degraded enrichment");
        }

        let resolution = resolve_selectors(&args.selectors, &catalog, &aliases)?;

        let payload = json!({
            "ok": true,
            "schemaVersion": SCHEMA_VERSION,
            "capture": {
                "siteId": self.client.site_id(),
                "ts": chrono::Utc::now().timestamp(),
            },
            "resolved": resolution.resolved,
            "unmatched": resolution.unmatched,
        });
        Ok(ToolOutput::single(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_require_selectors() {
        let result: crate::error::Result<SelectorsArgs> = parse_args(json!({}));
        assert!(result.is_err());
        let ok: SelectorsArgs = parse_args(json!({ "selectors": ["mppt"] })).unwrap();
        assert_eq!(ok.selectors, vec!["mppt".to_string()]);
    }
}
