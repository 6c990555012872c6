//! Command-line interface for the VoltMind tool server.
//!
//! The `serve` command speaks line-delimited JSON-RPC 2.0 on stdio so an
//! agent host can list and call tools; logs go to stderr to keep stdout
//! clean for the protocol.

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use voltmind_tools::{CoreError, ToolError, ToolRegistry, ToolRegistryBuilder};
use voltmind_vrm::{VrmClient, VrmConfig, VrmError};

/// VoltMind - energy-monitoring tools for automated agents.
#[derive(Parser, Debug)]
#[command(name = "voltmind")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Serve tools over stdio (JSON-RPC 2.0, one message per line).
    Serve,
    /// Print the tool definitions as JSON and exit.
    Tools,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Serve => serve().await,
        Command::Tools => {
            let registry = build_registry()?;
            let defs = serde_json::to_string_pretty(&registry.definitions())?;
            println!("{defs}");
            Ok(())
        }
    }
}

fn build_registry() -> Result<ToolRegistry> {
    let config = VrmConfig::from_env()?;
    let client = Arc::new(VrmClient::new(config)?);
    Ok(ToolRegistryBuilder::new()
        .with_standard_tools(client)
        .build())
}

async fn serve() -> Result<()> {
    let registry = build_registry()?;
    info!(tools = %registry.list().join(", "), "ready on stdio");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let request: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(err) => {
                error!(error = %err, "unparseable request");
                write_message(&json!({
                    "jsonrpc": "2.0",
                    "id": Value::Null,
                    "error": { "code": -32700, "message": format!("Parse error: {err}") },
                }))?;
                continue;
            }
        };

        let id = request.get("id").cloned();
        let method = request.get("method").and_then(Value::as_str).unwrap_or("");
        let params = request.get("params").cloned().unwrap_or(Value::Null);

        // Notifications carry no id and expect no response.
        let Some(id) = id else {
            continue;
        };

        let response = handle_request(&registry, method, params).await;
        let message = match response {
            Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
            Err(err) => {
                let (code, data) = error_code(&err);
                let mut error = json!({ "code": code, "message": err.to_string() });
                if let Some(data) = data {
                    error["data"] = data;
                }
                json!({ "jsonrpc": "2.0", "id": id, "error": error })
            }
        };
        write_message(&message)?;
    }
    Ok(())
}

async fn handle_request(
    registry: &ToolRegistry,
    method: &str,
    params: Value,
) -> std::result::Result<Value, ToolError> {
    match method {
        "initialize" => Ok(json!({
            "protocolVersion": "2024-11-05",
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": "voltmind",
                "version": env!("CARGO_PKG_VERSION"),
            },
        })),
        "ping" => Ok(json!({})),
        "tools/list" => Ok(json!({ "tools": registry.definitions() })),
        "tools/call" => {
            let name = params
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolError::InvalidArguments("missing tool name".to_string()))?;
            let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
            let output = registry.execute(name, arguments).await?;
            let content: Vec<Value> = output
                .payloads
                .iter()
                .map(|payload| {
                    Ok(json!({ "type": "text", "text": serde_json::to_string(payload)? }))
                })
                .collect::<std::result::Result<_, ToolError>>()?;
            Ok(json!({ "content": content }))
        }
        other => Err(ToolError::NotFound(format!("method {other}"))),
    }
}

/// JSON-RPC error code and optional data for a tool failure.
fn error_code(err: &ToolError) -> (i64, Option<Value>) {
    match err {
        ToolError::NotFound(_) => (-32601, None),
        ToolError::InvalidArguments(_) => (-32602, None),
        ToolError::Vrm(VrmError::Api {
            endpoint, snippet, ..
        }) => (
            -32000,
            Some(json!({ "endpoint": endpoint, "snippet": snippet })),
        ),
        ToolError::Core(CoreError::UnresolvedSignals { signals }) => {
            (-32002, Some(json!({ "signals": signals })))
        }
        _ => (-32001, None),
    }
}

fn write_message(message: &Value) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, message)?;
    stdout.write_all(b"\n")?;
    stdout.flush()?;
    Ok(())
}
