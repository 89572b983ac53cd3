//! A2A HTTP server: agent card plus JSON-RPC on `POST /`

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures_util::StreamExt;
use serde_json::Value;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::A2aError;
use crate::handler::{RequestHandler, parse_params};
use crate::protocol::{AgentCard, JsonRpcRequest, JsonRpcResponse, MessageSendParams};

pub const AGENT_CARD_PATH: &str = "/.well-known/agent.json";

pub struct A2aServer {
    card: AgentCard,
    handler: RequestHandler,
    auth_token: Option<String>,
}

impl A2aServer {
    pub fn new(card: AgentCard, handler: RequestHandler) -> Self {
        Self {
            card,
            handler,
            auth_token: None,
        }
    }

    /// Require `Authorization: Bearer <token>` on JSON-RPC calls. The agent
    /// card stays public.
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route(AGENT_CARD_PATH, get(agent_card))
            .route("/", post(rpc))
            .with_state(self)
    }

    pub async fn serve(self: Arc<Self>, addr: SocketAddr) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind A2A server to {}", addr))?;
        info!("A2A agent '{}' listening on http://{}", self.card.name, addr);
        axum::serve(listener, self.router())
            .await
            .context("A2A server terminated")
    }

    fn verify_auth(&self, headers: &HeaderMap) -> Result<(), Response> {
        let Some(expected) = &self.auth_token else {
            return Ok(());
        };
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        match token {
            Some(t) if tokens_match(t, expected) => Ok(()),
            _ => Err((
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"error": "Invalid or missing authorization"})),
            )
                .into_response()),
        }
    }
}

/// Token comparison whose running time does not depend on where the inputs
/// differ
fn tokens_match(given: &str, expected: &str) -> bool {
    let (given, expected) = (given.as_bytes(), expected.as_bytes());
    given.len() == expected.len()
        && given
            .iter()
            .zip(expected)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

async fn agent_card(State(server): State<Arc<A2aServer>>) -> Json<AgentCard> {
    Json(server.card.clone())
}

fn rpc_error(id: Value, err: A2aError) -> Response {
    Json(JsonRpcResponse::error(id, err.to_rpc_error())).into_response()
}

async fn rpc(State(server): State<Arc<A2aServer>>, headers: HeaderMap, body: Bytes) -> Response {
    if let Err(resp) = server.verify_auth(&headers) {
        warn!("Rejected unauthenticated A2A request");
        return resp;
    }

    let raw: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => return rpc_error(Value::Null, A2aError::Parse(e.to_string())),
    };
    let id = raw.get("id").cloned().unwrap_or(Value::Null);
    let request: JsonRpcRequest = match serde_json::from_value(raw) {
        Ok(r) => r,
        Err(e) => return rpc_error(id, A2aError::InvalidRequest(e.to_string())),
    };

    if request.method != "message/stream" {
        return Json(server.handler.handle(request).await).into_response();
    }

    debug!("A2A streaming request");
    let params = match parse_params::<MessageSendParams>(request.params) {
        Ok(p) => p,
        Err(e) => return rpc_error(id, e),
    };
    let mut events = match server.handler.on_message_stream(params).await {
        Ok(events) => events,
        Err(e) => return rpc_error(id, e),
    };

    let stream = async_stream::stream! {
        while let Some(item) = events.next().await {
            let reply = match item {
                Ok(event) => match serde_json::to_value(&event) {
                    Ok(value) => JsonRpcResponse::success(id.clone(), value),
                    Err(e) => {
                        error!("Failed to serialize A2A event: {}", e);
                        JsonRpcResponse::error(id.clone(), A2aError::internal().to_rpc_error())
                    }
                },
                Err(e) => {
                    error!("A2A stream failed: {}", e);
                    JsonRpcResponse::error(id.clone(), e.to_rpc_error())
                }
            };
            match Event::default().json_data(&reply) {
                Ok(sse) => {
                    yield Ok::<_, Infallible>(sse);
                }
                Err(e) => error!("Failed to serialize SSE event: {}", e),
            }
        }
    };

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}
