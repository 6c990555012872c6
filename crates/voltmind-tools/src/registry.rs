//! Tool registry for managing available tools.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use voltmind_vrm::VrmClient;

use crate::alarms::AlarmsTool;
use crate::diagnostics::{DiagnosticsIndexTool, DiagnosticsValuesTool};
use crate::error::{Result, ToolError};
use crate::inventory::DeviceInventoryTool;
use crate::overview::GetSystemOverviewTool;
use crate::selectors::ResolveDeviceSelectorsTool;
use crate::stats::{EnergyStatsQuickTool, HistoricalValuesTool};
use crate::tool::{DynTool, ToolDefinition, ToolOutput};
use crate::widgets::{BatterySummaryTool, GpsTool, WidgetFetchTool, WidgetListAvailableTool};

/// Tool registry for managing available tools.
pub struct ToolRegistry {
    tools: HashMap<String, DynTool>,
}

impl ToolRegistry {
    /// Create a new tool registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool.
    pub fn register(&mut self, tool: DynTool) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&DynTool> {
        self.tools.get(name)
    }

    /// Check if a tool exists.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// List all tool names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get all tool definitions, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Execute a tool by name.
    pub async fn execute(&self, name: &str, args: Value) -> Result<ToolOutput> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.execute(args).await
    }

    /// Get the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for assembling a registry.
pub struct ToolRegistryBuilder {
    registry: ToolRegistry,
}

impl ToolRegistryBuilder {
    pub fn new() -> Self {
        Self {
            registry: ToolRegistry::new(),
        }
    }

    /// Register an arbitrary tool.
    pub fn with_tool(mut self, tool: DynTool) -> Self {
        self.registry.register(tool);
        self
    }

    /// Register the full standard tool set over one shared client.
    pub fn with_standard_tools(mut self, client: Arc<VrmClient>) -> Self {
        let tools: Vec<DynTool> = vec![
            Arc::new(GetSystemOverviewTool::new(client.clone())),
            Arc::new(BatterySummaryTool::new(client.clone())),
            Arc::new(DiagnosticsIndexTool::new(client.clone())),
            Arc::new(DiagnosticsValuesTool::new(client.clone())),
            Arc::new(DeviceInventoryTool::new(client.clone())),
            Arc::new(AlarmsTool::new(client.clone())),
            Arc::new(HistoricalValuesTool::new(client.clone())),
            Arc::new(EnergyStatsQuickTool::new(client.clone())),
            Arc::new(GpsTool::new(client.clone())),
            Arc::new(ResolveDeviceSelectorsTool::new(client.clone())),
            Arc::new(WidgetFetchTool::new(client.clone())),
            Arc::new(WidgetListAvailableTool::new(client)),
        ];
        for tool in tools {
            self.registry.register(tool);
        }
        self
    }

    pub fn build(self) -> ToolRegistry {
        self.registry
    }
}

impl Default for ToolRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voltmind_vrm::VrmConfig;

    fn test_client() -> Arc<VrmClient> {
        Arc::new(
            VrmClient::new(VrmConfig::for_base_url("http://127.0.0.1:1", "tok", 7))
                .expect("client"),
        )
    }

    #[test]
    fn test_registry_empty() {
        let registry = ToolRegistryBuilder::new().build();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_standard_tools_registered() {
        let registry = ToolRegistryBuilder::new()
            .with_standard_tools(test_client())
            .build();
        assert_eq!(registry.len(), 12);
        for name in [
            "get_system_overview",
            "battery_summary",
            "diagnostics_index",
            "diagnostics_values",
            "device_inventory",
            "alarms",
            "historical_values",
            "energy_stats_quick",
            "gps",
            "resolve_device_selectors",
            "widget_fetch",
            "widget_list_available",
        ] {
            assert!(registry.has(name), "missing tool {name}");
        }
    }

    #[test]
    fn test_definitions_sorted() {
        let registry = ToolRegistryBuilder::new()
            .with_standard_tools(test_client())
            .build();
        let defs = registry.definitions();
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert!(defs.iter().all(|d| d.input_schema["type"] == "object"));
    }

    #[tokio::test]
    async fn test_execute_unknown_tool() {
        let registry = ToolRegistryBuilder::new().build();
        let result = registry.execute("nope", Value::Null).await;
        assert!(matches!(result, Err(ToolError::NotFound(_))));
    }
}
