//! MCP stdio server.
//!
//! Reads JSON-RPC lines from stdin and writes responses to stdout. The
//! same loop drains the logger's notification channel and forwards each
//! record to the client as `notifications/message`; stdout is therefore
//! the only writer of protocol frames and internal diagnostics stay on
//! stderr.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::logging::{LogNotification, Logger};
use crate::mcp::protocol::{
    InitializeResult, JsonRpcRequest, JsonRpcResponse, ListCapability, LoggingCapability,
    ServerCapabilities, ServerInfo,
};
use crate::mcp::{prompts, resources, tools};
use crate::store::{GraphStore, KvStore};
use crate::types::{ErrorKind, Result};

/// MCP protocol revision this server speaks.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP server over stdin/stdout.
#[derive(Debug)]
pub struct McpServer {
    graph: Arc<GraphStore>,
    kv: Arc<KvStore>,
    logger: Logger,
    shutdown: CancellationToken,
}

impl McpServer {
    pub fn new(
        graph: Arc<GraphStore>,
        kv: Arc<KvStore>,
        logger: Logger,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            graph,
            kv,
            logger,
            shutdown,
        }
    }

    /// Run the server loop on the process stdio streams until EOF or
    /// cancellation.
    pub async fn run(&self, notifications: mpsc::Receiver<LogNotification>) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout, notifications).await
    }

    /// Server loop over arbitrary transport streams.
    pub async fn serve<R, W>(
        &self,
        reader: R,
        mut writer: W,
        mut notifications: mpsc::Receiver<LogNotification>,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut notifier_open = true;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                note = notifications.recv(), if notifier_open => {
                    match note {
                        Some(note) => {
                            write_frame(&mut writer, &notification_frame(&note)).await?;
                        }
                        None => notifier_open = false,
                    }
                }
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    if let Some(response) = self.handle_message(trimmed).await {
                        write_frame(&mut writer, &serde_json::to_value(&response)?).await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Handle one JSON-RPC message. `None` means the message was a
    /// notification and gets no response.
    pub async fn handle_message(&self, msg: &str) -> Option<JsonRpcResponse> {
        let req: JsonRpcRequest = match serde_json::from_str(msg) {
            Ok(r) => r,
            Err(e) => {
                return Some(JsonRpcResponse::error(
                    None,
                    -32700,
                    format!("parse error: {e}"),
                ))
            }
        };

        let id = req.id.clone();
        let response = match req.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "initialized" | "notifications/initialized" | "notifications/cancelled" => return None,
            "tools/list" => {
                JsonRpcResponse::success(id, serde_json::json!({ "tools": tools::list_tools() }))
            }
            "tools/call" => self.handle_tools_call(id, &req.params).await,
            "resources/list" => JsonRpcResponse::success(
                id,
                serde_json::json!({ "resources": resources::list_resources() }),
            ),
            "resources/read" => self.handle_resources_read(id, &req.params).await,
            "prompts/list" => JsonRpcResponse::success(
                id,
                serde_json::json!({ "prompts": prompts::list_prompts() }),
            ),
            "prompts/get" => self.handle_prompts_get(id, &req.params),
            "ping" => JsonRpcResponse::success(id, serde_json::json!({})),
            _ => JsonRpcResponse::error(id, -32601, format!("method not found: {}", req.method)),
        };
        Some(response)
    }

    fn handle_initialize(&self, id: Option<serde_json::Value>) -> JsonRpcResponse {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.into(),
            capabilities: ServerCapabilities {
                tools: ListCapability { list_changed: false },
                resources: ListCapability { list_changed: false },
                prompts: ListCapability { list_changed: false },
                logging: LoggingCapability {},
            },
            server_info: ServerInfo {
                name: env!("CARGO_PKG_NAME").into(),
                version: env!("CARGO_PKG_VERSION").into(),
            },
        };
        JsonRpcResponse::success(id, serde_json::to_value(&result).unwrap_or_default())
    }

    async fn handle_tools_call(
        &self,
        id: Option<serde_json::Value>,
        params: &serde_json::Value,
    ) -> JsonRpcResponse {
        let name = match params.get("name").and_then(|v| v.as_str()) {
            Some(n) => n,
            None => return JsonRpcResponse::error(id, -32602, "missing tool name".into()),
        };
        let args = params
            .get("arguments")
            .cloned()
            .unwrap_or(serde_json::json!({}));

        let result = tools::call_tool(name, &args, &self.graph, &self.kv, &self.logger).await;
        JsonRpcResponse::success(id, serde_json::to_value(&result).unwrap_or_default())
    }

    async fn handle_resources_read(
        &self,
        id: Option<serde_json::Value>,
        params: &serde_json::Value,
    ) -> JsonRpcResponse {
        let uri = match params.get("uri").and_then(|v| v.as_str()) {
            Some(u) => u,
            None => return JsonRpcResponse::error(id, -32602, "missing resource uri".into()),
        };

        match resources::read_resource(uri, &self.graph).await {
            Ok(text) => JsonRpcResponse::success(
                id,
                serde_json::json!({
                    "contents": [{
                        "uri": uri,
                        "mimeType": "text/markdown",
                        "text": text,
                    }]
                }),
            ),
            Err(err) => {
                self.logger
                    .error(
                        "Resource read failed",
                        Some(&err),
                        Some(serde_json::json!({ "uri": uri })),
                    )
                    .await;
                JsonRpcResponse::error(id, rpc_code(err.kind()), err.to_string())
            }
        }
    }

    fn handle_prompts_get(
        &self,
        id: Option<serde_json::Value>,
        params: &serde_json::Value,
    ) -> JsonRpcResponse {
        let name = match params.get("name").and_then(|v| v.as_str()) {
            Some(n) => n,
            None => return JsonRpcResponse::error(id, -32602, "missing prompt name".into()),
        };
        let args = params
            .get("arguments")
            .cloned()
            .unwrap_or(serde_json::json!({}));

        match prompts::get_prompt(name, &args) {
            Ok(messages) => {
                JsonRpcResponse::success(id, serde_json::json!({ "messages": messages }))
            }
            Err(err) => JsonRpcResponse::error(id, rpc_code(err.kind()), err.to_string()),
        }
    }
}

fn rpc_code(kind: ErrorKind) -> i64 {
    match kind {
        ErrorKind::InvalidInput => -32602,
        ErrorKind::ResourceNotFound => -32002,
        _ => -32603,
    }
}

fn notification_frame(note: &LogNotification) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": "notifications/message",
        "params": {
            "level": note.level,
            "logger": note.logger,
            "data": note.data,
        }
    })
}

async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &serde_json::Value,
) -> Result<()> {
    let mut out = frame.to_string();
    out.push('\n');
    writer.write_all(out.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
