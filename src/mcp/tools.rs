//! MCP tool definitions and dispatch.
//!
//! Each tool is a validated pass-through to one store operation. Argument
//! validation happens here, before any store access; store failures are
//! logged and returned as error results, never as protocol errors.

use crate::logging::Logger;
use crate::mcp::protocol::{McpTool, McpToolResult};
use crate::store::{GraphStore, KvStore};
use crate::types::{AppError, Result};

/// Return all available MCP tools.
pub fn list_tools() -> Vec<McpTool> {
    vec![
        McpTool {
            name: "query_graph".into(),
            description: "Execute a query against a named graph and return the raw result."
                .into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "graph": { "type": "string", "description": "Graph name" },
                    "query": { "type": "string", "description": "Query string" }
                },
                "required": ["graph", "query"]
            }),
        },
        McpTool {
            name: "list_graphs".into(),
            description: "List the names of all graphs on the server.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        },
        McpTool {
            name: "delete_graph".into(),
            description: "Delete a named graph and all of its data.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "graph": { "type": "string", "description": "Graph name" }
                },
                "required": ["graph"]
            }),
        },
        McpTool {
            name: "get_key".into(),
            description: "Fetch the value stored under a key.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "key": { "type": "string", "description": "Key name" }
                },
                "required": ["key"]
            }),
        },
        McpTool {
            name: "set_key".into(),
            description: "Store a value under a key, overwriting any previous value.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "key": { "type": "string", "description": "Key name" },
                    "value": { "type": "string", "description": "Value to store" }
                },
                "required": ["key", "value"]
            }),
        },
        McpTool {
            name: "delete_key".into(),
            description: "Delete a key.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "key": { "type": "string", "description": "Key name" }
                },
                "required": ["key"]
            }),
        },
        McpTool {
            name: "list_keys".into(),
            description: "List all keys in the key-value store.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        },
    ]
}

/// Invoke one tool by name. Failures come back as error results with the
/// classified message, after passing through the logger.
pub async fn call_tool(
    name: &str,
    args: &serde_json::Value,
    graph: &GraphStore,
    kv: &KvStore,
    logger: &Logger,
) -> McpToolResult {
    match dispatch(name, args, graph, kv).await {
        Ok(text) => McpToolResult::text(text),
        Err(err) => {
            logger
                .error(
                    "Tool invocation failed",
                    Some(&err),
                    Some(serde_json::json!({ "tool": name })),
                )
                .await;
            McpToolResult::error(err.to_string())
        }
    }
}

async fn dispatch(
    name: &str,
    args: &serde_json::Value,
    graph: &GraphStore,
    kv: &KvStore,
) -> Result<String> {
    match name {
        "query_graph" => {
            let graph_name = required_arg(args, "graph")?;
            let query = required_arg(args, "query")?;
            let result = graph.query(graph_name, query).await?;
            Ok(serde_json::to_string_pretty(&result)?)
        }
        "list_graphs" => {
            let names = graph.list().await?;
            Ok(serde_json::to_string_pretty(&names)?)
        }
        "delete_graph" => {
            let graph_name = required_arg(args, "graph")?;
            graph.delete(graph_name).await?;
            Ok(format!("Graph '{graph_name}' deleted"))
        }
        "get_key" => {
            let key = required_arg(args, "key")?;
            match kv.get(key).await? {
                Some(value) => Ok(value),
                None => Ok("(nil)".to_string()),
            }
        }
        "set_key" => {
            let key = required_arg(args, "key")?;
            let value = required_arg(args, "value")?;
            kv.set(key, value).await?;
            Ok("OK".to_string())
        }
        "delete_key" => {
            let key = required_arg(args, "key")?;
            if kv.delete(key).await? {
                Ok(format!("Key '{key}' deleted"))
            } else {
                Ok(format!("Key '{key}' did not exist"))
            }
        }
        "list_keys" => {
            let keys = kv.list_keys().await?;
            Ok(serde_json::to_string_pretty(&keys)?)
        }
        other => Err(AppError::invalid_input(format!("unknown tool: {other}"))),
    }
}

/// A required string argument: present, a string, and non-empty after
/// trimming.
fn required_arg<'a>(args: &'a serde_json::Value, name: &str) -> Result<&'a str> {
    match args.get(name).and_then(|v| v.as_str()) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(AppError::invalid_input(format!(
            "argument '{name}' must be a non-empty string"
        ))),
    }
}
