//! MCP server over the streamable HTTP transport
//!
//! Stateless: every `POST /mcp` carries one JSON-RPC message (or a batch) and
//! gets its reply as a plain `application/json` body. Notifications are
//! acknowledged with `202 Accepted`.

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::adapter::McpToolAdapter;
use crate::protocol::*;

pub struct McpServer {
    adapter: McpToolAdapter,
    name: String,
}

impl McpServer {
    pub fn new(adapter: McpToolAdapter, name: impl Into<String>) -> Self {
        Self {
            adapter,
            name: name.into(),
        }
    }

    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/mcp", post(post_mcp))
            .with_state(self)
    }

    pub async fn serve(self: Arc<Self>, addr: SocketAddr) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind MCP server to {}", addr))?;
        info!("MCP server '{}' listening on http://{}/mcp", self.name, addr);
        axum::serve(listener, self.router())
            .await
            .context("MCP server terminated")
    }

    /// Handle a raw request body. Returns the HTTP status and the reply body,
    /// if any.
    pub async fn handle_body(&self, body: &[u8]) -> (StatusCode, Option<Value>) {
        debug!(
            "MCP received: {}",
            String::from_utf8_lossy(&body[..body.len().min(200)])
        );

        let parsed: Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(e) => {
                warn!("Invalid JSON-RPC request: {}", e);
                let resp =
                    JsonRpcResponse::error(Value::Null, PARSE_ERROR, format!("Parse error: {}", e));
                return (StatusCode::BAD_REQUEST, Some(to_json(&resp)));
            }
        };

        match parsed {
            Value::Array(items) if items.is_empty() => {
                let resp = JsonRpcResponse::error(Value::Null, INVALID_REQUEST, "Empty batch");
                (StatusCode::BAD_REQUEST, Some(to_json(&resp)))
            }
            Value::Array(items) => {
                let mut replies = Vec::new();
                for item in items {
                    if let Some(resp) = self.handle_value(item).await {
                        replies.push(to_json(&resp));
                    }
                }
                if replies.is_empty() {
                    (StatusCode::ACCEPTED, None)
                } else {
                    (StatusCode::OK, Some(Value::Array(replies)))
                }
            }
            single => match self.handle_value(single).await {
                Some(resp) => (StatusCode::OK, Some(to_json(&resp))),
                None => (StatusCode::ACCEPTED, None),
            },
        }
    }

    async fn handle_value(&self, value: Value) -> Option<JsonRpcResponse> {
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => Some(JsonRpcResponse::error(
                Value::Null,
                INVALID_REQUEST,
                format!("Invalid request: {}", e),
            )),
        }
    }

    /// Dispatch one JSON-RPC message. Notifications get no reply.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id.clone().unwrap_or(Value::Null);

        match request.method.as_str() {
            "initialize" => {
                let result = InitializeResult {
                    protocol_version: PROTOCOL_VERSION.to_string(),
                    capabilities: ServerCapabilities {
                        tools: ToolsCapability {
                            list_changed: false,
                        },
                    },
                    server_info: ServerInfo {
                        name: self.name.clone(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                    },
                };
                Some(JsonRpcResponse::success(id, to_json(&result)))
            }

            "notifications/initialized" => {
                info!("MCP client initialized");
                None
            }

            "tools/list" => {
                let tools = self.adapter.list_tools();
                info!("MCP tools/list: returning {} tools", tools.len());
                Some(JsonRpcResponse::success(
                    id,
                    serde_json::json!({ "tools": tools }),
                ))
            }

            "tools/call" => {
                let name = request
                    .params
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                if name.is_empty() {
                    return Some(JsonRpcResponse::error(
                        id,
                        INVALID_PARAMS,
                        "Missing 'name' parameter",
                    ));
                }
                let arguments = request
                    .params
                    .get("arguments")
                    .cloned()
                    .unwrap_or_else(|| serde_json::json!({}));

                info!("MCP tools/call: {}", name);
                let result = self.adapter.call_tool(name, arguments).await;
                Some(JsonRpcResponse::success(id, to_json(&result)))
            }

            "ping" => Some(JsonRpcResponse::success(id, serde_json::json!({}))),

            _ if request.is_notification() => {
                debug!("Ignoring MCP notification: {}", request.method);
                None
            }

            _ => {
                warn!("MCP unknown method: {}", request.method);
                Some(JsonRpcResponse::error(
                    id,
                    METHOD_NOT_FOUND,
                    format!("Unknown method: {}", request.method),
                ))
            }
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

async fn post_mcp(State(server): State<Arc<McpServer>>, body: Bytes) -> Response {
    match server.handle_body(&body).await {
        (status, Some(reply)) => (status, Json(reply)).into_response(),
        (status, None) => status.into_response(),
    }
}
