//! Provider-agnostic chat types

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::ToolDefinition;

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: ChatMessageContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
    Tool,
}

/// Plain text or structured blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatMessageContent {
    Text(String),
    Blocks(Vec<ChatBlock>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatBlock {
    Text {
        text: String,
    },
    ToolCall {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_call_id: String,
        name: String,
        content: String,
    },
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// Model reply to a single chat request
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: StopReason,
    pub usage: ChatUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    Unknown,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChatUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Anything that can answer a chat request
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name
    fn provider_name(&self) -> &str;

    fn model(&self) -> &str;

    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        system: &str,
    ) -> Result<ChatResponse>;
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: ChatMessageContent::Text(text.into()),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: ChatMessageContent::Text(text.into()),
        }
    }

    /// Assistant turn, carrying tool calls as blocks when there are any
    pub fn assistant(text: impl Into<String>, tool_calls: &[ToolCall]) -> Self {
        let text = text.into();
        if tool_calls.is_empty() {
            return Self {
                role: ChatRole::Assistant,
                content: ChatMessageContent::Text(text),
            };
        }

        let mut blocks = Vec::with_capacity(tool_calls.len() + 1);
        if !text.is_empty() {
            blocks.push(ChatBlock::Text { text });
        }
        blocks.extend(tool_calls.iter().map(|c| ChatBlock::ToolCall {
            id: c.id.clone(),
            name: c.name.clone(),
            input: c.input.clone(),
        }));
        Self {
            role: ChatRole::Assistant,
            content: ChatMessageContent::Blocks(blocks),
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            role: ChatRole::Tool,
            content: ChatMessageContent::Blocks(vec![ChatBlock::ToolResult {
                tool_call_id: tool_call_id.into(),
                name: name.into(),
                content: content.into(),
            }]),
        }
    }

    /// Concatenated text of the message, tool results included
    pub fn text(&self) -> String {
        match &self.content {
            ChatMessageContent::Text(t) => t.clone(),
            ChatMessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ChatBlock::Text { text } => Some(text.as_str()),
                    ChatBlock::ToolResult { content, .. } => Some(content.as_str()),
                    ChatBlock::ToolCall { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn tool_calls(&self) -> Vec<ToolCall> {
        match &self.content {
            ChatMessageContent::Text(_) => Vec::new(),
            ChatMessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ChatBlock::ToolCall { id, name, input } => Some(ToolCall {
                        id: id.clone(),
                        name: name.clone(),
                        input: input.clone(),
                    }),
                    _ => None,
                })
                .collect(),
        }
    }
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

impl ChatUsage {
    pub fn add(&mut self, other: ChatUsage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
    }
}

impl StopReason {
    pub fn is_tool_use(&self) -> bool {
        matches!(self, Self::ToolUse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str) -> ToolCall {
        ToolCall {
            id: format!("call_{name}"),
            name: name.to_string(),
            input: serde_json::json!({"currency_from": "USD"}),
        }
    }

    #[test]
    fn test_chat_role_display() {
        assert_eq!(ChatRole::User.to_string(), "user");
        assert_eq!(ChatRole::Tool.to_string(), "tool");
    }

    #[test]
    fn test_assistant_without_calls_is_text() {
        let msg = ChatMessage::assistant("done", &[]);
        assert_eq!(msg.content, ChatMessageContent::Text("done".to_string()));
        assert!(msg.tool_calls().is_empty());
    }

    #[test]
    fn test_assistant_with_calls() {
        let msg = ChatMessage::assistant("looking it up", &[call("get_rate")]);
        let calls = msg.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "get_rate");
        assert_eq!(msg.text(), "looking it up");
    }

    #[test]
    fn test_assistant_empty_text_skips_text_block() {
        let msg = ChatMessage::assistant("", &[call("a"), call("b")]);
        match &msg.content {
            ChatMessageContent::Blocks(blocks) => assert_eq!(blocks.len(), 2),
            other => panic!("expected blocks, got {:?}", other),
        }
    }

    #[test]
    fn test_tool_result_text() {
        let msg = ChatMessage::tool_result("call_1", "get_rate", "{\"rate\":0.9}");
        assert_eq!(msg.role, ChatRole::Tool);
        assert_eq!(msg.text(), "{\"rate\":0.9}");
    }

    #[test]
    fn test_block_serialization_is_tagged() {
        let msg = ChatMessage::tool_result("call_1", "get_rate", "ok");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["content"][0]["type"], "tool_result");
        assert_eq!(json["content"][0]["tool_call_id"], "call_1");
    }

    #[test]
    fn test_usage_accumulates() {
        let mut total = ChatUsage::default();
        total.add(ChatUsage {
            input_tokens: 12,
            output_tokens: 3,
        });
        total.add(ChatUsage {
            input_tokens: u32::MAX,
            output_tokens: 4,
        });
        assert_eq!(total.input_tokens, u32::MAX);
        assert_eq!(total.output_tokens, 7);
    }

    #[test]
    fn test_stop_reason_predicate() {
        assert!(StopReason::ToolUse.is_tool_use());
        assert!(!StopReason::EndTurn.is_tool_use());
        assert!(!StopReason::MaxTokens.is_tool_use());
    }
}
