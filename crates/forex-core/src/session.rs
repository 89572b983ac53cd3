//! Per-conversation agent state
//!
//! Each conversation (A2A context id, or a throwaway id for one-shot
//! invocations) keeps its message history and the structured response of its
//! latest turn. The store is owned by whoever builds the agent and handed in
//! explicitly; there is no process-wide instance.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::providers::ChatMessage;
use crate::response::ResponseFormat;

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub messages: Vec<ChatMessage>,
    pub structured_response: Option<ResponseFormat>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionState>>>,
}

/// Thread ids are compared after trimming; blank ids are rejected
fn normalize_thread_id(id: &str) -> anyhow::Result<String> {
    let id = id.trim();
    if id.is_empty() {
        anyhow::bail!("Conversation id cannot be empty");
    }
    Ok(id.to_string())
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a conversation; unknown ids yield an empty state
    pub async fn load(&self, thread_id: &str) -> anyhow::Result<SessionState> {
        let id = normalize_thread_id(thread_id)?;
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&id).cloned().unwrap_or_default())
    }

    pub async fn save(&self, thread_id: &str, state: SessionState) -> anyhow::Result<()> {
        let id = normalize_thread_id(thread_id)?;
        debug!(
            thread_id = id.as_str(),
            messages = state.messages.len(),
            "Saving conversation state"
        );
        self.sessions.write().await.insert(id, state);
        Ok(())
    }

    pub async fn structured_response(&self, thread_id: &str) -> Option<ResponseFormat> {
        let id = normalize_thread_id(thread_id).ok()?;
        let sessions = self.sessions.read().await;
        sessions.get(&id).and_then(|s| s.structured_response.clone())
    }

    pub async fn remove(&self, thread_id: &str) {
        if let Ok(id) = normalize_thread_id(thread_id) {
            self.sessions.write().await.remove(&id);
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
