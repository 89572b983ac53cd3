//! Event publishing from executors to the request handler

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::A2aError;
use crate::protocol::{
    A2aEvent, Artifact, Message, Part, TaskArtifactUpdateEvent, TaskState, TaskStatus,
    TaskStatusUpdateEvent, new_id,
};

/// Sending half of an execution's event channel
#[derive(Debug, Clone)]
pub struct EventQueue {
    tx: mpsc::UnboundedSender<A2aEvent>,
}

impl EventQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<A2aEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn enqueue(&self, event: A2aEvent) -> Result<(), A2aError> {
        self.tx
            .send(event)
            .map_err(|_| A2aError::Internal("Event queue closed".to_string()))
    }
}

/// Publishes lifecycle events for one task
pub struct TaskUpdater<'a> {
    queue: &'a EventQueue,
    task_id: String,
    context_id: String,
}

impl<'a> TaskUpdater<'a> {
    pub fn new(queue: &'a EventQueue, task_id: &str, context_id: &str) -> Self {
        Self {
            queue,
            task_id: task_id.to_string(),
            context_id: context_id.to_string(),
        }
    }

    /// Agent text message bound to this task
    pub fn new_agent_message(&self, text: impl Into<String>) -> Message {
        Message::agent_text(text, &self.context_id, &self.task_id)
    }

    pub fn update_status(
        &self,
        state: TaskState,
        message: Option<Message>,
        is_final: bool,
    ) -> Result<(), A2aError> {
        debug!(task_id = self.task_id.as_str(), %state, is_final, "Task status update");
        self.queue
            .enqueue(A2aEvent::StatusUpdate(TaskStatusUpdateEvent::new(
                &self.task_id,
                &self.context_id,
                TaskStatus::new(state, message),
                is_final,
            )))
    }

    pub fn add_artifact(&self, parts: Vec<Part>, name: impl Into<String>) -> Result<(), A2aError> {
        let artifact = Artifact {
            artifact_id: new_id(),
            name: Some(name.into()),
            parts,
        };
        self.queue
            .enqueue(A2aEvent::ArtifactUpdate(TaskArtifactUpdateEvent::new(
                &self.task_id,
                &self.context_id,
                artifact,
            )))
    }

    pub fn complete(&self, message: Option<Message>) -> Result<(), A2aError> {
        self.update_status(TaskState::Completed, message, true)
    }
}
