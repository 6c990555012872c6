//! Core tool trait and types for function calling.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ToolError};

/// Tool definition advertised to the agent host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,
    /// What the tool does, written for the agent
    pub description: String,
    /// Arguments as JSON Schema
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Tool execution result: one or more JSON payloads.
///
/// Chunked tools emit one payload per envelope; everything else emits a
/// single payload.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub payloads: Vec<Value>,
}

impl ToolOutput {
    /// A single-payload output.
    pub fn single(payload: Value) -> Self {
        Self {
            payloads: vec![payload],
        }
    }

    /// A chunked output, one payload per envelope.
    pub fn chunked(payloads: Vec<Value>) -> Self {
        Self { payloads }
    }
}

/// Tool trait for function calling.
///
/// Tools are callable operations an automated agent can invoke by name with
/// JSON arguments.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name.
    fn name(&self) -> &str;

    /// Get the tool description.
    fn description(&self) -> &str;

    /// Get the parameters as JSON Schema.
    fn parameters(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value) -> Result<ToolOutput>;

    /// Get the full tool definition.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.parameters(),
        }
    }
}

/// Dynamic tool wrapper for trait objects.
pub type DynTool = Arc<dyn Tool>;

/// Strictly parse tool arguments into a typed struct.
///
/// `null` counts as the empty object; unknown fields are rejected by the
/// argument structs themselves (`deny_unknown_fields`).
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T> {
    let args = if args.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// Helper function to create a JSON object schema for parameters.
pub fn object_schema(properties: Value) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "additionalProperties": false
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct DemoArgs {
        count: Option<u64>,
    }

    #[test]
    fn test_parse_args_null_is_empty() {
        let args: DemoArgs = parse_args(Value::Null).unwrap();
        assert_eq!(args.count, None);
    }

    #[test]
    fn test_parse_args_rejects_unknown_fields() {
        let result: Result<DemoArgs> = parse_args(json!({ "bogus": 1 }));
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[test]
    fn test_object_schema_shape() {
        let schema = object_schema(json!({ "x": { "type": "number" } }));
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["additionalProperties"], json!(false));
    }
}
