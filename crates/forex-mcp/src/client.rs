//! MCP client for remote servers on the streamable HTTP transport

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::protocol::{
    JsonRpcRequest, JsonRpcResponse, McpTool, PROTOCOL_VERSION, SESSION_HEADER, ToolCallResult,
};
use forex_core::tools::ToolHandler;

/// Where to find a remote MCP server
#[derive(Debug, Clone)]
pub struct McpClientConfig {
    pub name: String,
    /// Full endpoint URL, e.g. `http://localhost:9090/mcp`
    pub url: String,
    pub token: Option<String>,
}

impl McpClientConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            token: None,
        }
    }
}

pub struct McpClient {
    config: McpClientConfig,
    http: reqwest::Client,
    session_id: RwLock<Option<String>>,
    next_id: AtomicU64,
}

impl McpClient {
    /// Connect and run the initialize handshake
    pub async fn connect(config: McpClientConfig) -> Result<Arc<Self>> {
        info!("Connecting to MCP server: {} ({})", config.name, config.url);

        let client = Arc::new(Self {
            config,
            http: reqwest::Client::new(),
            session_id: RwLock::new(None),
            next_id: AtomicU64::new(1),
        });
        client.initialize().await?;
        Ok(client)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    async fn initialize(&self) -> Result<()> {
        let result = self
            .send_request(
                "initialize",
                serde_json::json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "forex",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                }),
            )
            .await
            .with_context(|| format!("MCP server '{}' initialize failed", self.config.name))?;

        debug!("MCP initialize response: {:?}", result);

        self.send_notification("notifications/initialized").await?;

        info!("MCP client connected to {}", self.config.name);
        Ok(())
    }

    /// Discover tools and wrap each as a local [`ToolHandler`]
    pub async fn discover_tools(self: &Arc<Self>) -> Result<Vec<Arc<dyn ToolHandler>>> {
        let result = self
            .send_request("tools/list", serde_json::json!({}))
            .await?;

        let tools: Vec<McpTool> = serde_json::from_value(
            result
                .get("tools")
                .cloned()
                .unwrap_or(serde_json::json!([])),
        )
        .context("Malformed tools/list result")?;

        info!(
            "Discovered {} tools from MCP server {}",
            tools.len(),
            self.config.name
        );

        let handlers: Vec<Arc<dyn ToolHandler>> = tools
            .into_iter()
            .map(|tool| {
                Arc::new(DynamicMcpTool {
                    name: tool.name,
                    description: tool.description,
                    schema: tool.input_schema,
                    client: self.clone(),
                }) as Arc<dyn ToolHandler>
            })
            .collect();

        Ok(handlers)
    }

    /// Call a remote tool; an `isError` result becomes an `Err`
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<String> {
        let result = self
            .send_request(
                "tools/call",
                serde_json::json!({
                    "name": name,
                    "arguments": arguments,
                }),
            )
            .await?;

        let result: ToolCallResult =
            serde_json::from_value(result).context("Malformed tools/call result")?;
        let text = result.joined_text();
        if result.is_error == Some(true) {
            bail!("{}", text);
        }
        Ok(text)
    }

    fn headers(&self, session: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "application/json".parse()?);
        headers.insert(ACCEPT, "application/json, text/event-stream".parse()?);
        if let Some(session) = session {
            headers.insert(SESSION_HEADER, session.parse()?);
        }
        if let Some(token) = &self.config.token {
            headers.insert(AUTHORIZATION, format!("Bearer {}", token).parse()?);
        }
        Ok(headers)
    }

    async fn post(&self, body: &JsonRpcRequest) -> Result<reqwest::Response> {
        let session = self.session_id.read().await.clone();
        let response = self
            .http
            .post(&self.config.url)
            .headers(self.headers(session.as_deref())?)
            .json(body)
            .send()
            .await
            .with_context(|| format!("MCP request to {} failed", self.config.url))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            bail!("MCP server returned {}: {}", status, text);
        }

        if let Some(id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            *self.session_id.write().await = Some(id.to_string());
        }
        Ok(response)
    }

    async fn send_request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(Some(Value::from(id)), method, params);

        let response = self.post(&request).await?;
        let is_sse = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));
        let body = response.text().await?;

        let response = if is_sse {
            find_in_event_stream(&body, id)?
        } else {
            serde_json::from_str::<JsonRpcResponse>(&body).with_context(|| {
                format!("Invalid JSON from MCP server: {}", preview(&body, 100))
            })?
        };

        if let Some(error) = response.error {
            bail!("MCP error {}: {}", error.code, error.message);
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    async fn send_notification(&self, method: &str) -> Result<()> {
        let notification = JsonRpcRequest::new(None, method, serde_json::json!({}));
        self.post(&notification).await?;
        Ok(())
    }
}

/// First `max` characters of `text`
fn preview(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Pick the response for `expected_id` out of an SSE body
fn find_in_event_stream(body: &str, expected_id: u64) -> Result<JsonRpcResponse> {
    for line in body.lines() {
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let Ok(msg) = serde_json::from_str::<JsonRpcResponse>(data.trim()) else {
            debug!("Skipping SSE event: {}", preview(data, 200));
            continue;
        };
        if msg.id.as_u64() == Some(expected_id) {
            return Ok(msg);
        }
    }
    Err(anyhow!("No response for request {} in event stream", expected_id))
}

/// A remote MCP tool exposed as a local tool
pub struct DynamicMcpTool {
    name: String,
    description: String,
    schema: Value,
    client: Arc<McpClient>,
}

#[async_trait]
impl ToolHandler for DynamicMcpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        self.schema.clone()
    }

    async fn execute(&self, input: Value) -> Result<String> {
        debug!("Executing MCP tool {} on {}", self.name, self.client.name());
        self.client.call_tool(&self.name, input).await
    }
}
