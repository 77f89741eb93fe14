//! MCP JSON-RPC protocol types.
//!
//! Model Context Protocol over JSON-RPC 2.0:
//! - `initialize` / `initialized` handshake
//! - `tools/list` / `tools/call`
//! - `resources/list` / `resources/read`
//! - `prompts/list` / `prompts/get`
//! - `notifications/message` (server to client, log records)

use serde::{Deserialize, Serialize};

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<serde_json::Value>,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC 2.0 response envelope.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<serde_json::Value>, code: i64, message: String) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
            }),
        }
    }
}

/// Tool descriptor for `tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct McpTool {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// Result of a tool invocation. Failures travel inside the result with
/// `isError`, not as protocol errors.
#[derive(Debug, Serialize)]
pub struct McpToolResult {
    pub content: Vec<McpContent>,
    #[serde(rename = "isError", skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct McpContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

impl McpContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content_type: "text".into(),
            text: text.into(),
        }
    }
}

impl McpToolResult {
    pub fn text(s: String) -> Self {
        Self {
            content: vec![McpContent::text(s)],
            is_error: false,
        }
    }

    pub fn error(s: String) -> Self {
        Self {
            content: vec![McpContent::text(s)],
            is_error: true,
        }
    }
}

/// Resource descriptor for `resources/list`.
#[derive(Debug, Clone, Serialize)]
pub struct McpResource {
    pub uri: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

/// Prompt descriptor for `prompts/list`.
#[derive(Debug, Clone, Serialize)]
pub struct McpPrompt {
    pub name: String,
    pub description: String,
    pub arguments: Vec<McpPromptArgument>,
}

#[derive(Debug, Clone, Serialize)]
pub struct McpPromptArgument {
    pub name: String,
    pub description: String,
    pub required: bool,
}

/// One message in a `prompts/get` result.
#[derive(Debug, Serialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: McpContent,
}

/// Server capabilities returned from `initialize`.
#[derive(Debug, Serialize)]
pub struct ServerCapabilities {
    pub tools: ListCapability,
    pub resources: ListCapability,
    pub prompts: ListCapability,
    pub logging: LoggingCapability,
}

#[derive(Debug, Serialize)]
pub struct ListCapability {
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Presence signals support; the object itself is empty.
#[derive(Debug, Serialize)]
pub struct LoggingCapability {}

#[derive(Debug, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// Full `initialize` response result.
#[derive(Debug, Serialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_request() {
        let json = r#"{"jsonrpc":"2.0","id":1,"method":"tools/list","params":{}}"#;
        let req: JsonRpcRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.method, "tools/list");
        assert_eq!(req.id, Some(serde_json::json!(1)));
    }

    #[test]
    fn success_response_omits_error() {
        let resp =
            JsonRpcResponse::success(Some(serde_json::json!(1)), serde_json::json!({"ok": true}));
        let s = serde_json::to_string(&resp).unwrap();
        assert!(s.contains("\"result\""));
        assert!(!s.contains("\"error\""));
    }

    #[test]
    fn error_response_omits_result() {
        let resp = JsonRpcResponse::error(Some(serde_json::json!(1)), -32600, "bad".into());
        let s = serde_json::to_string(&resp).unwrap();
        assert!(s.contains("\"error\""));
        assert!(!s.contains("\"result\""));
    }

    #[test]
    fn tool_result_error_flag_serializes_only_when_set() {
        let ok = serde_json::to_string(&McpToolResult::text("fine".into())).unwrap();
        assert!(!ok.contains("isError"));
        let bad = serde_json::to_string(&McpToolResult::error("broken".into())).unwrap();
        assert!(bad.contains("\"isError\":true"));
    }

    #[test]
    fn capabilities_serialize_with_wire_names() {
        let caps = ServerCapabilities {
            tools: ListCapability { list_changed: false },
            resources: ListCapability { list_changed: false },
            prompts: ListCapability { list_changed: false },
            logging: LoggingCapability {},
        };
        let json = serde_json::to_value(&caps).unwrap();
        assert_eq!(json["tools"]["listChanged"], false);
        assert_eq!(json["logging"], serde_json::json!({}));
    }
}
