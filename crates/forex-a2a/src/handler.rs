//! JSON-RPC request handling on top of an [`AgentExecutor`] and a [`TaskStore`]

use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::A2aError;
use crate::events::EventQueue;
use crate::executor::{AgentExecutor, RequestContext};
use crate::protocol::{
    A2aEvent, JsonRpcRequest, JsonRpcResponse, Message, MessageSendParams, SendMessageResult,
    Task, TaskArtifactUpdateEvent, TaskIdParams, TaskQueryParams, TaskStatusUpdateEvent, new_id,
};
use crate::store::TaskStore;

/// Applies published events to the task store
#[derive(Clone)]
pub struct TaskManager {
    store: Arc<dyn TaskStore>,
}

impl TaskManager {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    /// Apply one event; returns the task as it now stands, if the event
    /// concerns one
    pub async fn apply(&self, event: &A2aEvent) -> Result<Option<Task>, A2aError> {
        match event {
            A2aEvent::Task(task) => {
                self.store.save(task.clone()).await;
                Ok(Some(task.clone()))
            }
            A2aEvent::Message(_) => Ok(None),
            A2aEvent::StatusUpdate(update) => self.apply_status(update).await.map(Some),
            A2aEvent::ArtifactUpdate(update) => self.apply_artifact(update).await.map(Some),
        }
    }

    async fn load(&self, task_id: &str) -> Result<Task, A2aError> {
        self.store
            .get(task_id)
            .await
            .ok_or_else(|| A2aError::TaskNotFound(task_id.to_string()))
    }

    async fn apply_status(&self, update: &TaskStatusUpdateEvent) -> Result<Task, A2aError> {
        let mut task = self.load(&update.task_id).await?;
        if let Some(previous) = task.status.message.take() {
            task.history.push(previous);
        }
        task.status = update.status.clone();
        self.store.save(task.clone()).await;
        Ok(task)
    }

    async fn apply_artifact(&self, update: &TaskArtifactUpdateEvent) -> Result<Task, A2aError> {
        let mut task = self.load(&update.task_id).await?;
        let incoming = &update.artifact;
        match task
            .artifacts
            .iter_mut()
            .find(|a| a.artifact_id == incoming.artifact_id)
        {
            Some(existing) if update.append == Some(true) => {
                existing.parts.extend(incoming.parts.iter().cloned());
            }
            Some(existing) => *existing = incoming.clone(),
            None => task.artifacts.push(incoming.clone()),
        }
        self.store.save(task.clone()).await;
        Ok(task)
    }
}

type Execution = (
    mpsc::UnboundedReceiver<A2aEvent>,
    JoinHandle<Result<(), A2aError>>,
);

pub struct RequestHandler {
    executor: Arc<dyn AgentExecutor>,
    store: Arc<dyn TaskStore>,
    tasks: TaskManager,
}

impl RequestHandler {
    pub fn new(executor: Arc<dyn AgentExecutor>, store: Arc<dyn TaskStore>) -> Self {
        Self {
            tasks: TaskManager::new(store.clone()),
            executor,
            store,
        }
    }

    /// Resolve the task the message belongs to and build the execution context
    async fn prepare(&self, params: MessageSendParams) -> Result<RequestContext, A2aError> {
        let mut message = params.message;

        let current_task = match &message.task_id {
            Some(task_id) => {
                let task = self
                    .store
                    .get(task_id)
                    .await
                    .ok_or_else(|| A2aError::TaskNotFound(task_id.clone()))?;
                if task.status.state.is_terminal() {
                    return Err(A2aError::InvalidParams(format!(
                        "Task {} is in terminal state: {}",
                        task.id, task.status.state
                    )));
                }
                Some(task)
            }
            None => None,
        };

        let task_id = current_task
            .as_ref()
            .map(|t| t.id.clone())
            .unwrap_or_else(new_id);
        let context_id = current_task
            .as_ref()
            .map(|t| t.context_id.clone())
            .or_else(|| message.context_id.clone())
            .unwrap_or_else(new_id);
        message.task_id = Some(task_id.clone());
        message.context_id = Some(context_id.clone());

        let current_task = match current_task {
            Some(mut task) => {
                task.history.push(message.clone());
                self.store.save(task.clone()).await;
                Some(task)
            }
            None => None,
        };

        Ok(RequestContext {
            message,
            task_id,
            context_id,
            current_task,
        })
    }

    fn spawn_execute(&self, context: RequestContext) -> Execution {
        let (queue, rx) = EventQueue::new();
        let executor = self.executor.clone();
        let handle = tokio::spawn(async move { executor.execute(context, queue).await });
        (rx, handle)
    }

    /// `message/send`
    pub async fn on_message_send(
        &self,
        params: MessageSendParams,
    ) -> Result<SendMessageResult, A2aError> {
        let context = self.prepare(params).await?;
        let task_id = context.task_id.clone();
        info!(task_id = task_id.as_str(), "message/send");

        let (mut rx, handle) = self.spawn_execute(context);
        let mut reply: Option<Message> = None;
        while let Some(event) = rx.recv().await {
            if let A2aEvent::Message(message) = &event {
                reply = Some(message.clone());
            }
            if let Err(e) = self.tasks.apply(&event).await {
                handle.abort();
                return Err(e);
            }
        }
        finish(handle).await?;

        match self.store.get(&task_id).await {
            Some(task) => Ok(SendMessageResult::Task(task)),
            None => reply
                .map(SendMessageResult::Message)
                .ok_or_else(|| A2aError::Internal("Agent produced no result".to_string())),
        }
    }

    /// `message/stream`: every published event, then the executor's error if
    /// it failed
    pub async fn on_message_stream(
        &self,
        params: MessageSendParams,
    ) -> Result<BoxStream<'static, Result<A2aEvent, A2aError>>, A2aError> {
        let context = self.prepare(params).await?;
        info!(task_id = context.task_id.as_str(), "message/stream");

        let (mut rx, handle) = self.spawn_execute(context);
        let tasks = self.tasks.clone();
        Ok(async_stream::stream! {
            while let Some(event) = rx.recv().await {
                match tasks.apply(&event).await {
                    Ok(_) => {
                        yield Ok(event);
                    }
                    Err(e) => {
                        handle.abort();
                        yield Err(e);
                        return;
                    }
                }
            }
            if let Err(e) = finish(handle).await {
                yield Err(e);
            }
        }
        .boxed())
    }

    /// `tasks/get`
    pub async fn on_get_task(&self, params: TaskQueryParams) -> Result<Task, A2aError> {
        let mut task = self
            .store
            .get(&params.id)
            .await
            .ok_or_else(|| A2aError::TaskNotFound(params.id.clone()))?;
        if let Some(limit) = params.history_length {
            let excess = task.history.len().saturating_sub(limit);
            task.history.drain(..excess);
        }
        Ok(task)
    }

    /// `tasks/cancel`
    pub async fn on_cancel_task(&self, params: TaskIdParams) -> Result<Task, A2aError> {
        let task = self
            .store
            .get(&params.id)
            .await
            .ok_or_else(|| A2aError::TaskNotFound(params.id.clone()))?;
        if task.status.state.is_terminal() {
            return Err(A2aError::TaskNotCancelable(format!(
                "Task {} is in terminal state: {}",
                task.id, task.status.state
            )));
        }

        let message = task
            .history
            .last()
            .cloned()
            .unwrap_or_else(|| Message::user_text(""));
        let context = RequestContext {
            message,
            task_id: task.id.clone(),
            context_id: task.context_id.clone(),
            current_task: Some(task.clone()),
        };

        let (queue, mut rx) = EventQueue::new();
        self.executor.cancel(context, queue).await?;
        while let Some(event) = rx.recv().await {
            self.tasks.apply(&event).await?;
        }
        self.store
            .get(&task.id)
            .await
            .ok_or_else(|| A2aError::TaskNotFound(task.id.clone()))
    }

    /// Dispatch a non-streaming JSON-RPC request
    pub async fn handle(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();
        debug!(method = request.method.as_str(), "A2A request");

        let result = match request.method.as_str() {
            "message/send" => match parse_params::<MessageSendParams>(request.params) {
                Ok(params) => to_result(self.on_message_send(params).await),
                Err(e) => Err(e),
            },
            "tasks/get" => match parse_params::<TaskQueryParams>(request.params) {
                Ok(params) => to_result(self.on_get_task(params).await),
                Err(e) => Err(e),
            },
            "tasks/cancel" => match parse_params::<TaskIdParams>(request.params) {
                Ok(params) => to_result(self.on_cancel_task(params).await),
                Err(e) => Err(e),
            },
            "message/stream" => Err(A2aError::InvalidRequest(
                "message/stream must be sent to the streaming endpoint".to_string(),
            )),
            other => Err(A2aError::MethodNotFound(other.to_string())),
        };

        match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => {
                warn!(method = request.method.as_str(), "A2A request failed: {}", e);
                JsonRpcResponse::error(id, e.to_rpc_error())
            }
        }
    }
}

async fn finish(handle: JoinHandle<Result<(), A2aError>>) -> Result<(), A2aError> {
    handle.await.map_err(|e| {
        error!("Agent executor task failed: {}", e);
        A2aError::internal()
    })?
}

pub(crate) fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, A2aError> {
    serde_json::from_value(params).map_err(|e| A2aError::InvalidParams(e.to_string()))
}

fn to_result<T: Serialize>(result: Result<T, A2aError>) -> Result<Value, A2aError> {
    result.and_then(|v| {
        serde_json::to_value(v).map_err(|e| {
            error!("Failed to serialize A2A result: {}", e);
            A2aError::internal()
        })
    })
}
