//! Fakes shared by the tests in this crate

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

use forex_core::providers::{
    ChatMessage, ChatResponse, ChatUsage, LlmProvider, StopReason, ToolCall,
};
use forex_core::tools::{ToolDefinition, ToolHandler, ToolRegistry, json_schema};
use forex_mcp::{McpServer, McpToolAdapter};

/// Replays canned model replies in order
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<ChatResponse>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<ChatResponse>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
        })
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _tools: &[ToolDefinition],
        _system: &str,
    ) -> Result<ChatResponse> {
        self.replies
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| anyhow!("script exhausted"))
    }
}

pub fn text(reply: &str) -> ChatResponse {
    ChatResponse {
        text: reply.to_string(),
        tool_calls: vec![],
        stop_reason: StopReason::EndTurn,
        usage: ChatUsage::default(),
    }
}

pub fn calling(tool: &str, input: Value) -> ChatResponse {
    ChatResponse {
        text: "Let me check.".to_string(),
        tool_calls: vec![ToolCall {
            id: format!("call_{tool}"),
            name: tool.to_string(),
            input,
        }],
        stop_reason: StopReason::ToolUse,
        usage: ChatUsage::default(),
    }
}

/// Rate lookup that always answers 0.9
struct FixedRateTool;

#[async_trait]
impl ToolHandler for FixedRateTool {
    fn name(&self) -> &str {
        "get_currency_exchange_rate"
    }

    fn description(&self) -> &str {
        "Fixed rate lookup"
    }

    fn input_schema(&self) -> Value {
        json_schema(serde_json::json!({}), vec![])
    }

    async fn execute(&self, _input: Value) -> Result<String> {
        Ok(r#"{"amount":1.0,"base":"USD","date":"2024-01-02","rates":{"EUR":0.9}}"#.to_string())
    }
}

/// Serve the fixed rate tool over MCP; returns the `/mcp` endpoint URL
pub async fn spawn_mcp_server() -> String {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(FixedRateTool));
    let server = Arc::new(McpServer::new(
        McpToolAdapter::new(Arc::new(registry)),
        "currency_exchange",
    ));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/mcp", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, server.router()).await.unwrap();
    });
    url
}
