//! The currency agent: prompts, agent card and lazy construction

use anyhow::Result;
use futures_util::FutureExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use forex_a2a::AgentInit;
use forex_a2a::protocol::{AgentCapabilities, AgentCard, AgentSkill, SecurityScheme};
use forex_core::providers::LlmProvider;
use forex_core::{AgentGraph, ReactAgent, SessionStore, ToolRegistry};
use forex_mcp::{McpClient, McpClientConfig};

pub const SYSTEM_INSTRUCTION: &str = "You are a specialized assistant for currency conversions. \
Your sole purpose is to use the 'execute_exchange' tool to perform currency conversions. \
If the user asks about anything other than currency conversion or exchange rates, \
politely state that you cannot help with that topic and can only assist with currency-related queries. \
Do not attempt to answer unrelated questions or use tools for other purposes.";

pub const FORMAT_INSTRUCTION: &str = "Set response status to input_required if the user needs to provide more information to complete the request.\
Set response status to error if there is an error while processing the request.\
Set response status to completed if the request is complete.";

pub const SUPPORTED_CONTENT_TYPES: [&str; 2] = ["text", "text/plain"];

pub const SECURITY_SCHEME: &str = "bearerAuth";

/// URL advertised in the card: `--agent-url` when given, else the bind address
pub fn public_url(agent_url: Option<&str>, host: &str, port: u16) -> String {
    match agent_url.map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => url.to_string(),
        None => format!("http://{}:{}/", host, port),
    }
}

pub fn agent_card(url: impl Into<String>) -> AgentCard {
    let modes: Vec<String> = SUPPORTED_CONTENT_TYPES.iter().map(|t| t.to_string()).collect();
    AgentCard {
        name: "Currency Agent".to_string(),
        description: "Helps with exchange rates for currencies".to_string(),
        url: url.into(),
        version: "1.0.0".to_string(),
        capabilities: AgentCapabilities {
            streaming: true,
            push_notifications: true,
        },
        default_input_modes: modes.clone(),
        default_output_modes: modes,
        skills: vec![AgentSkill {
            id: "convert_currency".to_string(),
            name: "Currency Exchange Rates Tool".to_string(),
            description: "Helps with exchange values between various currencies".to_string(),
            tags: vec!["currency conversion".to_string(), "currency exchange".to_string()],
            examples: vec!["What is exchange rate between USD and GBP?".to_string()],
        }],
        security_schemes: BTreeMap::from([(
            SECURITY_SCHEME.to_string(),
            SecurityScheme::bearer("JWT"),
        )]),
        security: vec![BTreeMap::from([(
            SECURITY_SCHEME.to_string(),
            vec!["*".to_string()],
        )])],
    }
}

/// Connect to the MCP server and build the tool-calling agent over its tools
pub async fn build_agent(
    provider: Arc<dyn LlmProvider>,
    mcp: McpClientConfig,
) -> Result<Arc<dyn AgentGraph>> {
    let client = McpClient::connect(mcp).await?;
    let mut tools = ToolRegistry::new();
    tools.extend(client.discover_tools().await?);
    info!("Currency agent ready with {} MCP tools", tools.len());

    let agent = ReactAgent::new(provider, tools, SYSTEM_INSTRUCTION, SessionStore::new())
        .with_response_format(FORMAT_INSTRUCTION);
    Ok(Arc::new(agent))
}

/// Deferred [`build_agent`], run by the executor on its first request
pub fn lazy_agent(provider: Arc<dyn LlmProvider>, mcp: McpClientConfig) -> AgentInit {
    Box::new(move || build_agent(provider.clone(), mcp.clone()).boxed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedProvider, calling, spawn_mcp_server, text};
    use forex_core::{StreamEvent, stream_events};
    use futures_util::StreamExt;

    #[test]
    fn test_public_url() {
        assert_eq!(
            public_url(Some("https://agents.example.com/currency/"), "0.0.0.0", 9091),
            "https://agents.example.com/currency/"
        );
        assert_eq!(public_url(None, "0.0.0.0", 9091), "http://0.0.0.0:9091/");
        assert_eq!(public_url(Some(" "), "localhost", 1), "http://localhost:1/");
    }

    #[test]
    fn test_agent_card_wire_shape() {
        let json = serde_json::to_value(agent_card("http://localhost:9091/")).unwrap();
        assert_eq!(json["name"], "Currency Agent");
        assert_eq!(json["url"], "http://localhost:9091/");
        assert_eq!(json["capabilities"]["streaming"], true);
        assert_eq!(json["capabilities"]["pushNotifications"], true);
        assert_eq!(json["defaultInputModes"], serde_json::json!(["text", "text/plain"]));
        assert_eq!(json["skills"][0]["id"], "convert_currency");
        assert_eq!(json["securitySchemes"]["bearerAuth"]["type"], "http");
        assert_eq!(json["securitySchemes"]["bearerAuth"]["bearerFormat"], "JWT");
        assert_eq!(json["security"][0]["bearerAuth"], serde_json::json!(["*"]));
    }

    #[tokio::test]
    async fn test_agent_over_mcp_tools() {
        let url = spawn_mcp_server().await;
        let provider = ScriptedProvider::new(vec![
            calling(
                "get_currency_exchange_rate",
                serde_json::json!({"currency_from": "USD", "currency_to": "EUR"}),
            ),
            text("1 USD is 0.9 EUR"),
            text(r#"{"status": "completed", "message": "1 USD is 0.9 EUR"}"#),
        ]);
        let agent = build_agent(provider, McpClientConfig::new("currency", url))
            .await
            .unwrap();

        let events: Vec<StreamEvent> = stream_events(agent.as_ref(), "USD to EUR?", "ctx")
            .map(|e| e.unwrap())
            .collect()
            .await;
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[1], StreamEvent::Working(t) if t.contains("0.9")));
        assert_eq!(events[2], StreamEvent::Completed("1 USD is 0.9 EUR".into()));
    }

    #[tokio::test]
    async fn test_lazy_agent_reports_unreachable_mcp() {
        let provider = ScriptedProvider::new(vec![]);
        let init = lazy_agent(provider, McpClientConfig::new("currency", "http://127.0.0.1:1/mcp"));
        let err = init().await.err().unwrap();
        assert!(format!("{:#}", err).contains("currency"));
    }
}
