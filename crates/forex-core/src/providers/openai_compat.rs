//! OpenAI-compatible chat completions client

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::types::{
    ChatBlock, ChatMessage, ChatMessageContent, ChatResponse, ChatRole, ChatUsage, LlmProvider,
    StopReason, ToolCall,
};
use crate::tools::ToolDefinition;

/// Sampling settings for the chat endpoint
#[derive(Debug, Clone)]
pub struct OpenAiCompatConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_completion_tokens: u32,
    pub top_p: f32,
}

impl OpenAiCompatConfig {
    /// Settings used by every agent in this workspace
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.2,
            max_completion_tokens: 1000,
            top_p: 0.5,
        }
    }
}

pub struct OpenAiCompatProvider {
    http: Client,
    config: OpenAiCompatConfig,
}

impl std::fmt::Debug for OpenAiCompatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatProvider")
            .field("endpoint", &self.config.endpoint)
            .field("model", &self.config.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    temperature: f32,
    top_p: f32,
    max_completion_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<CompletionToolCall>,
}

#[derive(Deserialize)]
struct CompletionToolCall {
    id: String,
    function: CompletionFunction,
}

#[derive(Deserialize)]
struct CompletionFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct CompletionUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl OpenAiCompatProvider {
    pub fn new(config: OpenAiCompatConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        )
    }
}

/// Convert one message into the OpenAI wire shape. Tool results fan out into
/// one `tool` message per result block.
fn to_openai_messages(message: &ChatMessage) -> Vec<Value> {
    match (&message.role, &message.content) {
        (ChatRole::Tool, ChatMessageContent::Blocks(blocks)) => blocks
            .iter()
            .filter_map(|b| match b {
                ChatBlock::ToolResult {
                    tool_call_id,
                    content,
                    ..
                } => Some(serde_json::json!({
                    "role": "tool",
                    "tool_call_id": tool_call_id,
                    "content": content,
                })),
                _ => None,
            })
            .collect(),
        (ChatRole::Assistant, ChatMessageContent::Blocks(_)) => {
            let calls: Vec<Value> = message
                .tool_calls()
                .into_iter()
                .map(|c| {
                    serde_json::json!({
                        "id": c.id,
                        "type": "function",
                        "function": {
                            "name": c.name,
                            "arguments": c.input.to_string(),
                        }
                    })
                })
                .collect();
            let mut msg = serde_json::json!({
                "role": "assistant",
                "content": message.text(),
            });
            if !calls.is_empty() {
                msg["tool_calls"] = Value::Array(calls);
            }
            vec![msg]
        }
        (role, _) => vec![serde_json::json!({
            "role": role.to_string(),
            "content": message.text(),
        })],
    }
}

fn to_openai_tool(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.input_schema,
        }
    })
}

fn parse_stop_reason(reason: Option<&str>) -> StopReason {
    match reason {
        Some("stop") => StopReason::EndTurn,
        Some("tool_calls") | Some("function_call") => StopReason::ToolUse,
        Some("length") => StopReason::MaxTokens,
        _ => StopReason::Unknown,
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn provider_name(&self) -> &str {
        "openai-compatible"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        system: &str,
    ) -> Result<ChatResponse> {
        let mut wire = Vec::with_capacity(messages.len() + 1);
        if !system.is_empty() {
            wire.push(serde_json::json!({"role": "system", "content": system}));
        }
        wire.extend(messages.iter().flat_map(to_openai_messages));

        let request = CompletionRequest {
            model: &self.config.model,
            messages: wire,
            tools: tools.iter().map(to_openai_tool).collect(),
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            max_completion_tokens: self.config.max_completion_tokens,
        };

        info!(
            model = self.config.model.as_str(),
            messages = messages.len(),
            tools = tools.len(),
            "Sending chat completion request"
        );

        let url = self.url();
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to reach model endpoint at {}", url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Chat completion failed with status {status}: {body}");
        }

        let completion: CompletionResponse = resp
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Chat completion returned no choices"))?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|c| {
                let input = if c.function.arguments.trim().is_empty() {
                    serde_json::json!({})
                } else {
                    serde_json::from_str(&c.function.arguments).with_context(|| {
                        format!("Invalid arguments for tool call {}", c.function.name)
                    })?
                };
                Ok(ToolCall {
                    id: c.id,
                    name: c.function.name,
                    input,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let usage = completion
            .usage
            .map(|u| ChatUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        debug!(
            tool_calls = tool_calls.len(),
            finish_reason = ?choice.finish_reason,
            "Chat completion received"
        );

        Ok(ChatResponse {
            text: choice.message.content.unwrap_or_default(),
            tool_calls,
            stop_reason: parse_stop_reason(choice.finish_reason.as_deref()),
            usage,
        })
    }
}
