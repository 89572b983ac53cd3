//! Flags shared by every binary

use anyhow::{Context, Result};
use clap::Args;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use forex_core::providers::{LlmProvider, OpenAiCompatConfig, OpenAiCompatProvider};

pub const DEFAULT_MCP_SERVER_URL: &str = "http://localhost:9090/mcp";
pub const DEFAULT_AGENT_URL: &str = "http://localhost:9091";

/// Chat model endpoint
#[derive(Debug, Clone, Args)]
pub struct ModelArgs {
    /// OpenAI-compatible endpoint (Azure OpenAI or a gateway in front of it)
    #[arg(long, env = "AZURE_OPENAI_ENDPOINT")]
    pub azure_openai_endpoint: Option<String>,

    #[arg(long, env = "AZURE_OPENAI_API_KEY", hide_env_values = true)]
    pub azure_openai_api_key: Option<String>,
}

impl ModelArgs {
    pub fn provider(&self) -> Result<Arc<dyn LlmProvider>> {
        let endpoint = non_empty(&self.azure_openai_endpoint)
            .context("AZURE_OPENAI_ENDPOINT is not set")?;
        let api_key =
            non_empty(&self.azure_openai_api_key).context("AZURE_OPENAI_API_KEY is not set")?;
        Ok(Arc::new(OpenAiCompatProvider::new(OpenAiCompatConfig::new(
            endpoint, api_key,
        ))))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Resolve `--host`/`--port` into a bind address
pub fn bind_addr(host: &str, port: u16) -> Result<SocketAddr> {
    let ip = match host {
        "localhost" => IpAddr::V4(Ipv4Addr::LOCALHOST),
        other => other
            .parse()
            .with_context(|| format!("Invalid host address: {}", other))?,
    };
    Ok(SocketAddr::new(ip, port))
}
