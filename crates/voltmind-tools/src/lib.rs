//! VoltMind Tools Crate
//!
//! This crate provides the callable operations an automated agent uses to
//! inspect a remote energy-monitoring installation.
//!
//! ## Tool Capabilities
//!
//! - **Tool Trait**: unified interface for tool implementation
//! - **Discovery Tools**: diagnostics index/values, device inventory
//! - **Selector Resolution**: free-form selectors to device ids
//! - **Widget Tools**: battery summary, GPS, fetch, availability probe
//! - **Statistics Tools**: historical values, quick energy stats
//! - **Tool Registry**: manage and execute tools by name
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use voltmind_tools::ToolRegistryBuilder;
//! use voltmind_vrm::{VrmClient, VrmConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(VrmClient::new(VrmConfig::from_env()?)?);
//!     let registry = ToolRegistryBuilder::new()
//!         .with_standard_tools(client)
//!         .build();
//!
//!     let output = registry
//!         .execute(
//!             "resolve_device_selectors",
//!             serde_json::json!({ "selectors": ["mppt", "house bank"] }),
//!         )
//!         .await?;
//!     println!("{}", output.payloads[0]);
//!     Ok(())
//! }
//! ```

pub mod alarms;
pub mod diagnostics;
pub mod error;
pub mod inventory;
pub mod overview;
pub mod registry;
pub mod selectors;
pub mod stats;
pub mod tool;
pub mod widgets;

pub use error::{Result, ToolError};
pub use voltmind_core::CoreError;
pub use registry::{ToolRegistry, ToolRegistryBuilder};
pub use tool::{object_schema, parse_args, DynTool, Tool, ToolDefinition, ToolOutput};

pub use alarms::AlarmsTool;
pub use diagnostics::{DiagnosticsIndexTool, DiagnosticsValuesTool};
pub use inventory::DeviceInventoryTool;
pub use overview::GetSystemOverviewTool;
pub use selectors::ResolveDeviceSelectorsTool;
pub use stats::{EnergyStatsQuickTool, HistoricalValuesTool};
pub use widgets::{BatterySummaryTool, GpsTool, WidgetFetchTool, WidgetListAvailableTool};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
