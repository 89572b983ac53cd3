//! financial-assistant — HTTP `/invoke` front end for the supervisor agent

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;

use forex_cli::args::{DEFAULT_AGENT_URL, DEFAULT_MCP_SERVER_URL};
use forex_cli::assistant::{self, AssistantConfig};
use forex_cli::{FinancialAssistantAgent, ModelArgs};

#[derive(Parser)]
#[command(name = "financial-assistant", about = "Supervisor financial assistant")]
struct Args {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "PORT", default_value_t = 9093)]
    port: u16,

    #[command(flatten)]
    model: ModelArgs,

    #[arg(long, env = "CURRENCY_EXCHANGE_MCP_SERVER_URL", default_value = DEFAULT_MCP_SERVER_URL)]
    currency_exchange_mcp_server_url: String,

    #[arg(long, env = "CURRENCY_EXCHANGE_AGENT_URL", default_value = DEFAULT_AGENT_URL)]
    currency_exchange_agent_url: String,

    #[arg(long, env = "AUTH_TOKEN", hide_env_values = true)]
    auth_token: Option<String>,
}

async fn run(args: Args) -> Result<()> {
    let addr = forex_cli::bind_addr(&args.host, args.port)?;
    let provider = args.model.provider()?;

    let agent = Arc::new(FinancialAssistantAgent::new(
        provider,
        AssistantConfig {
            mcp_url: args.currency_exchange_mcp_server_url,
            agent_url: args.currency_exchange_agent_url,
            auth_token: args.auth_token.filter(|t| !t.is_empty()),
        },
    ));
    assistant::serve(agent, addr).await
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    forex_cli::init_tracing();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("An error occurred during server startup: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
