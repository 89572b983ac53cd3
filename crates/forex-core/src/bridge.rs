//! Streaming bridge between the agent loop and protocol layers

use anyhow::Result;
use async_stream::try_stream;
use futures_util::{Stream, StreamExt};
use tracing::debug;

use crate::agent::AgentGraph;
use crate::providers::{ChatMessage, ChatRole};
use crate::response::{StreamEvent, agent_response};

/// How a single agent message is surfaced to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// Assistant message asking for at least one tool call
    ToolRequest(String),
    /// Output of a tool
    ToolResult(String),
    /// Anything else: user echo, final answer, system text
    NoOp,
}

impl MessageKind {
    pub fn classify(message: &ChatMessage) -> Self {
        match message.role {
            ChatRole::Assistant if !message.tool_calls().is_empty() => {
                Self::ToolRequest(message.text())
            }
            ChatRole::Tool => Self::ToolResult(message.text()),
            ChatRole::Assistant | ChatRole::User | ChatRole::System => Self::NoOp,
        }
    }
}

/// Stream one agent turn as caller-facing events.
///
/// Intermediate tool traffic becomes `Working` events in the order the agent
/// produced it; the stream then ends with exactly one terminal event derived
/// from the turn's structured response. An error from the agent ends the
/// stream without a terminal event.
pub fn stream_events<'a>(
    graph: &'a dyn AgentGraph,
    query: &'a str,
    thread_id: &'a str,
) -> impl Stream<Item = Result<StreamEvent>> + Send + 'a {
    try_stream! {
        let mut messages = graph.stream(query, thread_id);
        while let Some(message) = messages.next().await {
            let message = message?;
            match MessageKind::classify(&message) {
                MessageKind::ToolRequest(text) => {
                    yield StreamEvent::Working(text);
                }
                MessageKind::ToolResult(output) => {
                    yield StreamEvent::Working(format!("Success. Details: {output}"));
                }
                MessageKind::NoOp => debug!(role = %message.role, "Skipping agent message"),
            }
        }

        let structured = graph.structured_response(thread_id).await;
        yield agent_response(structured.as_ref());
    }
}
