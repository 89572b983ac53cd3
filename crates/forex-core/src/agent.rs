//! Tool-calling agent loop
//!
//! [`ReactAgent`] alternates model calls and tool executions until the model
//! answers without requesting a tool, then optionally asks the model for a
//! structured [`ResponseFormat`] describing how the turn ended.

use anyhow::{Result, anyhow};
use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::{Stream, StreamExt, stream::BoxStream};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::providers::{ChatMessage, ChatUsage, LlmProvider, StopReason};
use crate::response::ResponseFormat;
use crate::session::SessionStore;
use crate::tools::ToolRegistry;

/// Model steps allowed per turn before the loop gives up
pub const DEFAULT_MAX_STEPS: usize = 25;

/// Source of agent messages the streaming bridge consumes.
///
/// `stream` yields every message produced during one turn in order, starting
/// with the echoed user message. Once the stream is exhausted,
/// `structured_response` reports how the turn ended.
#[async_trait]
pub trait AgentGraph: Send + Sync {
    fn stream<'a>(&'a self, query: &'a str, thread_id: &'a str)
    -> BoxStream<'a, Result<ChatMessage>>;

    async fn structured_response(&self, thread_id: &str) -> Option<ResponseFormat>;
}

pub struct ReactAgent {
    provider: Arc<dyn LlmProvider>,
    tools: ToolRegistry,
    system_prompt: String,
    response_format: Option<String>,
    sessions: SessionStore,
    max_steps: usize,
}

impl ReactAgent {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: ToolRegistry,
        system_prompt: impl Into<String>,
        sessions: SessionStore,
    ) -> Self {
        Self {
            provider,
            tools,
            system_prompt: system_prompt.into(),
            response_format: None,
            sessions,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Ask for a structured response at the end of every turn
    pub fn with_response_format(mut self, instruction: impl Into<String>) -> Self {
        self.response_format = Some(instruction.into());
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Run a whole turn and collect its messages
    pub async fn invoke(&self, query: &str, thread_id: &str) -> Result<Vec<ChatMessage>> {
        let mut stream = std::pin::pin!(self.run_turn(query, thread_id));
        let mut messages = Vec::new();
        while let Some(message) = stream.next().await {
            messages.push(message?);
        }
        Ok(messages)
    }

    fn run_turn<'a>(
        &'a self,
        query: &'a str,
        thread_id: &'a str,
    ) -> impl Stream<Item = Result<ChatMessage>> + Send + 'a {
        try_stream! {
            let mut state = self.sessions.load(thread_id).await?;
            state.structured_response = None;

            let user = ChatMessage::user(query);
            state.messages.push(user.clone());
            self.sessions.save(thread_id, state.clone()).await?;
            yield user;

            let definitions = self.tools.definitions();
            let mut finished = false;
            let mut usage = ChatUsage::default();

            for step in 0..self.max_steps {
                let response = self
                    .provider
                    .chat(&state.messages, &definitions, &self.system_prompt)
                    .await?;
                usage.add(response.usage);
                debug!(
                    step,
                    tool_calls = response.tool_calls.len(),
                    stop_reason = ?response.stop_reason,
                    "Agent step complete"
                );
                if response.stop_reason == StopReason::MaxTokens {
                    warn!(step, "Model reply was cut off at the token limit");
                }

                let assistant = ChatMessage::assistant(response.text, &response.tool_calls);
                state.messages.push(assistant.clone());
                yield assistant;

                if response.tool_calls.is_empty() {
                    finished = true;
                    break;
                }

                for call in &response.tool_calls {
                    let output = match self.tools.execute(&call.name, call.input.clone()).await {
                        Ok(output) => output,
                        Err(e) => format!("Error: {:#}", e),
                    };
                    let result = ChatMessage::tool_result(&call.id, &call.name, output);
                    state.messages.push(result.clone());
                    yield result;
                }

                self.sessions.save(thread_id, state.clone()).await?;
            }

            if !finished {
                self.sessions.save(thread_id, state.clone()).await?;
                Err::<(), _>(anyhow!(
                    "Agent stopped after {} steps without a final answer",
                    self.max_steps
                ))?;
            }

            if let Some(instruction) = &self.response_format {
                state.structured_response = self.request_structured(&state.messages, instruction).await?;
            }
            self.sessions.save(thread_id, state).await?;
            info!(
                thread_id,
                provider = self.provider.provider_name(),
                model = self.provider.model(),
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Agent turn finished"
            );
        }
    }

    /// One extra model call asking how the turn ended
    async fn request_structured(
        &self,
        messages: &[ChatMessage],
        instruction: &str,
    ) -> Result<Option<ResponseFormat>> {
        let system = format!(
            "{instruction}\nRespond only with a JSON object of the form \
             {{\"status\": \"input_required\" | \"completed\" | \"error\", \"message\": \"<reply to the user>\"}}."
        );
        let response = self.provider.chat(messages, &[], &system).await?;
        Ok(parse_structured(&response.text))
    }
}

/// Pull a `ResponseFormat` out of model text, tolerating code fences and prose
fn parse_structured(text: &str) -> Option<ResponseFormat> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    match serde_json::from_str(&text[start..=end]) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("Model returned an unparseable structured response: {}", e);
            None
        }
    }
}

#[async_trait]
impl AgentGraph for ReactAgent {
    fn stream<'a>(
        &'a self,
        query: &'a str,
        thread_id: &'a str,
    ) -> BoxStream<'a, Result<ChatMessage>> {
        self.run_turn(query, thread_id).boxed()
    }

    async fn structured_response(&self, thread_id: &str) -> Option<ResponseFormat> {
        self.sessions.structured_response(thread_id).await
    }
}
