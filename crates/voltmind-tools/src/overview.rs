//! High-level site overview passthrough.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use voltmind_vrm::VrmClient;

use crate::error::Result;
use crate::tool::{object_schema, parse_args, Tool, ToolOutput};

/// High-level site snapshot from the remote system overview.
pub struct GetSystemOverviewTool {
    client: Arc<VrmClient>,
}

impl GetSystemOverviewTool {
    pub fn new(client: Arc<VrmClient>) -> Self {
        Self { client }
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct NoArgs {}

#[async_trait]
impl Tool for GetSystemOverviewTool {
    fn name(&self) -> &str {
        "get_system_overview"
    }

    fn description(&self) -> &str {
        "High-level site snapshot from the system overview. Use first to understand device connectivity and key states."
    }

    fn parameters(&self) -> Value {
        object_schema(serde_json::json!({}))
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let _: NoArgs = parse_args(args)?;
        let data = self.client.get_site_json("/system-overview").await?;
        Ok(ToolOutput::single(data))
    }
}
