//! Device inventory tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use voltmind_core::{build_catalog, CatalogFilter, CatalogMode, SCHEMA_VERSION};
use voltmind_vrm::VrmClient;

use crate::error::Result;
use crate::tool::{object_schema, parse_args, Tool, ToolOutput};

/// List devices discovered from diagnostics (type, instance, name).
pub struct DeviceInventoryTool {
    client: Arc<VrmClient>,
}

impl DeviceInventoryTool {
    pub fn new(client: Arc<VrmClient>) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct InventoryArgs {
    types: Option<Vec<String>>,
    devices: Option<Vec<String>>,
}

#[async_trait]
impl Tool for DeviceInventoryTool {
    fn name(&self) -> &str {
        "device_inventory"
    }

    fn description(&self) -> &str {
        "List devices discovered from diagnostics (type, instance, name). Optional filters: types, devices. Good for selector resolution."
    }

    fn parameters(&self) -> Value {
        object_schema(json!({
            "types": { "type": "array", "items": { "type": "string" } },
            "devices": { "type": "array", "items": { "type": "string" } },
        }))
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let args: InventoryArgs = parse_args(args)?;
        let tree = self.client.get_site_json("/diagnostics").await?;

        let filter = CatalogFilter {
            types: args.types,
            devices: args.devices,
            ..Default::default()
        };
        let catalog = build_catalog(&tree, CatalogMode::Inventory, &filter)?;

        let payload = json!({
            "ok": true,
            "schemaVersion": SCHEMA_VERSION,
            "capture": {
                "siteId": self.client.site_id(),
                "ts": chrono::Utc::now().timestamp(),
            },
            "devices": catalog.devices,
        });
        Ok(ToolOutput::single(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_schema() {
        let client = Arc::new(
            voltmind_vrm::VrmClient::new(voltmind_vrm::VrmConfig::for_base_url(
                "http://127.0.0.1:1",
                "tok",
                7,
            ))
            .unwrap(),
        );
        let def = DeviceInventoryTool::new(client).definition();
        assert_eq!(def.name, "device_inventory");
        assert!(def.input_schema["properties"]["types"].is_object());
    }
}
