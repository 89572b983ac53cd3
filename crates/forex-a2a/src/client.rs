//! A2A client — talks JSON-RPC to peer agents

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::protocol::*;
use crate::server::AGENT_CARD_PATH;

/// A2A client for communicating with peer agents.
///
/// Requests carry no timeout: agent turns can take as long as the model does.
#[derive(Clone, Default)]
pub struct A2aClient {
    http: Client,
    token: Option<String>,
}

impl A2aClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }

    /// Fetch an agent's card from `{base_url}/.well-known/agent.json`
    pub async fn fetch_agent_card(&self, base_url: &str) -> Result<AgentCard> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), AGENT_CARD_PATH);
        debug!("Fetching agent card from {}", url);

        let resp = self
            .authorize(self.http.get(&url))
            .send()
            .await
            .with_context(|| format!("Failed to connect to agent at {}", url))?;

        if !resp.status().is_success() {
            return Err(anyhow!("Agent card request failed: HTTP {}", resp.status()));
        }

        let card: AgentCard = resp.json().await.context("Failed to parse agent card")?;

        info!(
            "Fetched agent card: {} ({} skills)",
            card.name,
            card.skills.len()
        );
        Ok(card)
    }

    async fn call<T: DeserializeOwned>(&self, url: &str, method: &str, params: Value) -> Result<T> {
        let request = JsonRpcRequest::new(method, params);
        debug!("A2A {} -> {}", method, url);

        let resp = self
            .authorize(self.http.post(url).json(&request))
            .send()
            .await
            .with_context(|| format!("Failed to send {} to {}", method, url))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("{} failed: HTTP {}: {}", method, status, body));
        }

        let reply: JsonRpcResponse = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", method))?;

        if let Some(error) = reply.error {
            return Err(anyhow!("A2A error {}: {}", error.code, error.message));
        }
        let result = reply
            .result
            .ok_or_else(|| anyhow!("{} response has neither result nor error", method))?;
        serde_json::from_value(result).with_context(|| format!("Unexpected {} result", method))
    }

    /// `message/send` to the agent's JSON-RPC endpoint
    pub async fn send_message(&self, url: &str, message: Message) -> Result<SendMessageResult> {
        let params = MessageSendParams {
            message,
            configuration: None,
            metadata: None,
        };
        let result: SendMessageResult = self
            .call(url, "message/send", serde_json::to_value(params)?)
            .await?;
        if let SendMessageResult::Task(task) = &result {
            info!("Task {} is {}", task.id, task.status.state);
        }
        Ok(result)
    }

    /// `tasks/get`
    pub async fn get_task(
        &self,
        url: &str,
        task_id: &str,
        history_length: Option<usize>,
    ) -> Result<Task> {
        let params = TaskQueryParams {
            id: task_id.to_string(),
            history_length,
        };
        self.call(url, "tasks/get", serde_json::to_value(params)?)
            .await
    }

    /// `tasks/cancel`
    pub async fn cancel_task(&self, url: &str, task_id: &str) -> Result<Task> {
        let params = TaskIdParams {
            id: task_id.to_string(),
        };
        self.call(url, "tasks/cancel", serde_json::to_value(params)?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventQueue, TaskUpdater};
    use crate::executor::{AgentExecutor, RequestContext};
    use crate::handler::RequestHandler;
    use crate::server::A2aServer;
    use crate::store::InMemoryTaskStore;
    use crate::error::A2aError;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    struct Fixed;

    #[async_trait]
    impl AgentExecutor for Fixed {
        async fn execute(&self, context: RequestContext, queue: EventQueue) -> Result<(), A2aError> {
            queue.enqueue(A2aEvent::Task(Task::from_message(
                context.message.clone(),
                &context.task_id,
                &context.context_id,
            )))?;
            TaskUpdater::new(&queue, &context.task_id, &context.context_id).update_status(
                TaskState::InputRequired,
                Some(Message::agent_text("Which currency?", &context.context_id, &context.task_id)),
                true,
            )
        }

        async fn cancel(&self, _context: RequestContext, _queue: EventQueue) -> Result<(), A2aError> {
            Err(A2aError::UnsupportedOperation)
        }
    }

    async fn spawn_agent(token: Option<&str>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let card = AgentCard {
            name: "Currency Agent".into(),
            description: "test".into(),
            url: format!("{}/", base),
            version: "1.0.0".into(),
            capabilities: AgentCapabilities::default(),
            default_input_modes: vec![],
            default_output_modes: vec![],
            skills: vec![],
            security_schemes: BTreeMap::new(),
            security: vec![],
        };
        let handler = RequestHandler::new(Arc::new(Fixed), Arc::new(InMemoryTaskStore::new()));
        let server = Arc::new(
            A2aServer::new(card, handler).with_auth_token(token.map(String::from)),
        );
        tokio::spawn(async move {
            axum::serve(listener, server.router()).await.unwrap();
        });
        base
    }

    #[tokio::test]
    async fn test_round_trip() {
        let base = spawn_agent(None).await;
        let client = A2aClient::new();

        let card = client.fetch_agent_card(&base).await.unwrap();
        assert_eq!(card.name, "Currency Agent");

        let result = client
            .send_message(&card.url, Message::user_text("convert 10"))
            .await
            .unwrap();
        let SendMessageResult::Task(task) = result else {
            panic!("expected a task");
        };
        assert_eq!(task.status.state, TaskState::InputRequired);

        let fetched = client.get_task(&card.url, &task.id, None).await.unwrap();
        assert_eq!(fetched.reply_text().as_deref(), Some("Which currency?"));

        let err = client.cancel_task(&card.url, &task.id).await.unwrap_err();
        assert!(err.to_string().contains("-32004"));
    }

    #[tokio::test]
    async fn test_token_is_sent() {
        let base = spawn_agent(Some("secret")).await;
        let url = format!("{}/", base);

        let err = A2aClient::new()
            .send_message(&url, Message::user_text("x"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("401"));

        let ok = A2aClient::new()
            .with_token(Some("secret".into()))
            .send_message(&url, Message::user_text("x"))
            .await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_task() {
        let base = spawn_agent(None).await;
        let err = A2aClient::new()
            .get_task(&format!("{}/", base), "missing", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("-32001"));
    }

    #[tokio::test]
    async fn test_fetch_agent_card_connection_refused() {
        let result = A2aClient::new().fetch_agent_card("http://127.0.0.1:1/").await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Failed to connect"));
    }
}
