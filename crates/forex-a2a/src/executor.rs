//! Agent executors: drive an agent and publish A2A task events

use anyhow::Result;
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, info};

use forex_core::{AgentGraph, StreamEvent, stream_events};

use crate::error::A2aError;
use crate::events::{EventQueue, TaskUpdater};
use crate::protocol::{A2aEvent, Message, Part, Task, TaskState};

/// Name of the artifact carrying the final answer
pub const RESULT_ARTIFACT_NAME: &str = "conversion_result";

/// Everything an executor knows about the request it serves
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub message: Message,
    pub task_id: String,
    pub context_id: String,
    pub current_task: Option<Task>,
}

impl RequestContext {
    /// Text parts of the incoming message joined by newlines
    pub fn user_input(&self) -> String {
        self.message.text()
    }
}

#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn execute(&self, context: RequestContext, queue: EventQueue) -> Result<(), A2aError>;
    async fn cancel(&self, context: RequestContext, queue: EventQueue) -> Result<(), A2aError>;
}

/// Builds the agent on first use
pub type AgentInit =
    Box<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn AgentGraph>>> + Send + Sync>;

/// Runs the currency agent and maps its stream onto the task lifecycle
pub struct CurrencyAgentExecutor {
    agent: OnceCell<Arc<dyn AgentGraph>>,
    init: Option<AgentInit>,
}

impl CurrencyAgentExecutor {
    /// Agent built lazily, once, by `init`
    pub fn new(init: AgentInit) -> Self {
        Self {
            agent: OnceCell::new(),
            init: Some(init),
        }
    }

    /// Executor around an already built agent
    pub fn with_agent(agent: Arc<dyn AgentGraph>) -> Self {
        Self {
            agent: OnceCell::new_with(Some(agent)),
            init: None,
        }
    }

    async fn agent(&self) -> Result<&Arc<dyn AgentGraph>, A2aError> {
        self.agent
            .get_or_try_init(|| async {
                match &self.init {
                    Some(init) => {
                        info!("Initializing currency agent");
                        init().await
                    }
                    None => Err(anyhow::anyhow!("No agent initializer configured")),
                }
            })
            .await
            .map_err(|e| {
                error!("Failed to initialize agent: {:#}", e);
                A2aError::internal()
            })
    }

    fn validate_request(&self, _context: &RequestContext) -> Result<(), A2aError> {
        Ok(())
    }
}

#[async_trait]
impl AgentExecutor for CurrencyAgentExecutor {
    async fn execute(&self, context: RequestContext, queue: EventQueue) -> Result<(), A2aError> {
        self.validate_request(&context)?;
        let agent = self.agent().await?;

        let query = context.user_input();
        let task = match context.current_task {
            Some(task) => task,
            None => {
                let task =
                    Task::from_message(context.message, &context.task_id, &context.context_id);
                queue.enqueue(A2aEvent::Task(task.clone()))?;
                task
            }
        };
        let updater = TaskUpdater::new(&queue, &task.id, &task.context_id);

        let mut events = std::pin::pin!(stream_events(agent.as_ref(), &query, &task.context_id));
        while let Some(event) = events.next().await {
            let event = event.map_err(|e| {
                error!("An error occurred while streaming the response: {:#}", e);
                A2aError::internal()
            })?;

            match event {
                StreamEvent::Working(text) => {
                    updater.update_status(
                        TaskState::Working,
                        Some(updater.new_agent_message(text)),
                        false,
                    )?;
                }
                StreamEvent::InputRequired(text) => {
                    updater.update_status(
                        TaskState::InputRequired,
                        Some(updater.new_agent_message(text)),
                        true,
                    )?;
                    break;
                }
                StreamEvent::Completed(text) => {
                    updater.add_artifact(vec![Part::text(text)], RESULT_ARTIFACT_NAME)?;
                    updater.complete(None)?;
                    break;
                }
            }
        }
        Ok(())
    }

    async fn cancel(&self, _context: RequestContext, _queue: EventQueue) -> Result<(), A2aError> {
        Err(A2aError::UnsupportedOperation)
    }
}
