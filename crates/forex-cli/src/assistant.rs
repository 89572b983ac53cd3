//! Supervisor financial assistant behind `POST /invoke`
//!
//! Rate questions go to the MCP tools; conversions and trades are delegated
//! to the currency agent over A2A. The agent is built on the first request.

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use forex_a2a::InvokeCurrencyExchangeAgentTool;
use forex_core::providers::{ChatMessage, LlmProvider};
use forex_core::{ReactAgent, SessionStore, ToolRegistry};
use forex_mcp::{McpClient, McpClientConfig};

pub const SYSTEM_INSTRUCTION: &str = "You are a supervisor financial assistant.
Use the get_currency_exchange_rate tool to get currency exchange rate information.
Use the invoke_currency_exchange_agent tool to perform currency conversions and trades.
Do not do currency conversion or trade directly.
If you get '403 Forbidden' error, it means you are not allowed to call the agent or the tool directly.
DO NOT call the trade_currency_exchange tool directly.
";

/// Where the assistant finds its tools
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub mcp_url: String,
    pub agent_url: String,
    /// Bearer token sent to the MCP server and the currency agent
    pub auth_token: Option<String>,
}

pub struct FinancialAssistantAgent {
    provider: Arc<dyn LlmProvider>,
    config: AssistantConfig,
    agent: OnceCell<ReactAgent>,
}

impl FinancialAssistantAgent {
    pub fn new(provider: Arc<dyn LlmProvider>, config: AssistantConfig) -> Self {
        Self {
            provider,
            config,
            agent: OnceCell::new(),
        }
    }

    async fn agent(&self) -> Result<&ReactAgent> {
        self.agent.get_or_try_init(|| self.build()).await
    }

    async fn build(&self) -> Result<ReactAgent> {
        info!("Initializing financial assistant");
        let mut mcp = McpClientConfig::new("currency_exchange", &self.config.mcp_url);
        mcp.token = self.config.auth_token.clone();
        let client = McpClient::connect(mcp).await?;

        let mut tools = ToolRegistry::new();
        tools.extend(client.discover_tools().await?);
        tools.register(Arc::new(InvokeCurrencyExchangeAgentTool::new(
            &self.config.agent_url,
            self.config.auth_token.clone(),
        )));
        info!("Financial assistant ready with {} tools", tools.len());

        Ok(ReactAgent::new(
            self.provider.clone(),
            tools,
            SYSTEM_INSTRUCTION,
            SessionStore::new(),
        ))
    }

    /// Run one stateless turn and return every message it produced
    pub async fn invoke(&self, prompt: &str) -> Result<Vec<ChatMessage>> {
        let agent = self.agent().await?;
        let thread_id = uuid::Uuid::new_v4().to_string();
        let result = agent.invoke(prompt, &thread_id).await;
        agent.sessions().remove(&thread_id).await;
        result
    }
}

#[derive(Deserialize)]
struct InvokeRequest {
    prompt: Option<String>,
}

pub fn router(assistant: Arc<FinancialAssistantAgent>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/invoke", post(invoke))
        .layer(cors)
        .with_state(assistant)
}

pub async fn serve(assistant: Arc<FinancialAssistantAgent>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind financial assistant to {}", addr))?;
    info!("Financial assistant listening on http://{}", addr);
    axum::serve(listener, router(assistant))
        .await
        .context("Financial assistant server terminated")
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({"error": message.into()}))).into_response()
}

async fn invoke(State(assistant): State<Arc<FinancialAssistantAgent>>, body: Bytes) -> Response {
    let prompt = serde_json::from_slice::<InvokeRequest>(&body)
        .ok()
        .and_then(|r| r.prompt)
        .filter(|p| !p.trim().is_empty());
    let Some(prompt) = prompt else {
        warn!("Rejected /invoke without a prompt");
        return error_response(StatusCode::BAD_REQUEST, "Missing 'prompt' in request body");
    };

    match assistant.invoke(&prompt).await {
        Ok(messages) => Json(serde_json::json!({"messages": messages})).into_response(),
        Err(e) => {
            error!("Financial assistant failed: {:#}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency_agent::{agent_card, lazy_agent};
    use crate::testing::{ScriptedProvider, calling, spawn_mcp_server, text};
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use forex_a2a::{A2aServer, CurrencyAgentExecutor, InMemoryTaskStore, RequestHandler};
    use serde_json::Value;
    use tower::ServiceExt;

    fn unreachable_assistant() -> Arc<FinancialAssistantAgent> {
        Arc::new(FinancialAssistantAgent::new(
            ScriptedProvider::new(vec![]),
            AssistantConfig {
                mcp_url: "http://127.0.0.1:1/mcp".into(),
                agent_url: "http://127.0.0.1:1".into(),
                auth_token: None,
            },
        ))
    }

    /// Currency agent answering every request with a completed conversion
    async fn spawn_currency_agent(mcp_url: &str, token: &str) -> String {
        let provider = ScriptedProvider::new(vec![
            text("100 USD is 90 EUR"),
            text(r#"{"status": "completed", "message": "100 USD is 90 EUR"}"#),
        ]);
        let executor =
            CurrencyAgentExecutor::new(lazy_agent(provider, McpClientConfig::new("currency", mcp_url)));
        let handler = RequestHandler::new(Arc::new(executor), Arc::new(InMemoryTaskStore::new()));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let server = Arc::new(
            A2aServer::new(agent_card(format!("{}/", base)), handler)
                .with_auth_token(Some(token.to_string())),
        );
        tokio::spawn(async move {
            axum::serve(listener, server.router()).await.unwrap();
        });
        base
    }

    async fn post_invoke(assistant: Arc<FinancialAssistantAgent>, body: &str) -> (StatusCode, Value) {
        let resp = router(assistant)
            .oneshot(
                Request::post("/invoke")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_missing_prompt() {
        let (status, json) = post_invoke(unreachable_assistant(), r#"{"question": "hi"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("prompt"));

        let (status, _) = post_invoke(unreachable_assistant(), "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_init_failure_is_500() {
        let (status, json) = post_invoke(unreachable_assistant(), r#"{"prompt": "hi"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"].as_str().unwrap().contains("currency_exchange"));
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let resp = router(unreachable_assistant())
            .oneshot(
                Request::options("/invoke")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_delegates_conversion_to_currency_agent() {
        let mcp_url = spawn_mcp_server().await;
        let agent_url = spawn_currency_agent(&mcp_url, "secret").await;

        let provider = ScriptedProvider::new(vec![
            calling(
                "invoke_currency_exchange_agent",
                serde_json::json!({"task_description": "Convert 100 USD to EUR"}),
            ),
            text("You get 90 EUR."),
        ]);
        let assistant = Arc::new(FinancialAssistantAgent::new(
            provider,
            AssistantConfig {
                mcp_url,
                agent_url,
                auth_token: Some("secret".into()),
            },
        ));

        let (status, json) = post_invoke(assistant, r#"{"prompt": "Convert 100 USD to EUR"}"#).await;
        assert_eq!(status, StatusCode::OK);
        let messages = json["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);

        let rendered = json.to_string();
        assert!(rendered.contains("100 USD is 90 EUR"));
        assert!(rendered.contains("You get 90 EUR."));
        assert!(!rendered.contains("Error:"));
    }
}
