//! currency-agent — A2A server in front of the currency conversion agent

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use forex_a2a::{A2aServer, CurrencyAgentExecutor, InMemoryTaskStore, RequestHandler};
use forex_cli::ModelArgs;
use forex_cli::args::DEFAULT_MCP_SERVER_URL;
use forex_cli::currency_agent::{agent_card, lazy_agent, public_url};
use forex_mcp::McpClientConfig;

#[derive(Parser)]
#[command(name = "currency-agent", about = "Currency conversion agent (A2A)")]
struct Args {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "PORT", default_value_t = 9091)]
    port: u16,

    #[command(flatten)]
    model: ModelArgs,

    #[arg(long, env = "CURRENCY_EXCHANGE_MCP_SERVER_URL", default_value = DEFAULT_MCP_SERVER_URL)]
    currency_exchange_mcp_server_url: String,

    /// Public URL advertised in the agent card
    #[arg(long, env = "AGENT_URL")]
    agent_url: Option<String>,

    /// Bearer token required on JSON-RPC calls and sent to the MCP server
    #[arg(long, env = "AUTH_TOKEN", hide_env_values = true)]
    auth_token: Option<String>,
}

async fn run(args: Args) -> Result<()> {
    let addr = forex_cli::bind_addr(&args.host, args.port)?;
    let provider = args.model.provider()?;

    let mut mcp = McpClientConfig::new("currency_exchange", &args.currency_exchange_mcp_server_url);
    mcp.token = args.auth_token.clone().filter(|t| !t.is_empty());
    let executor = CurrencyAgentExecutor::new(lazy_agent(provider, mcp));
    let handler = RequestHandler::new(Arc::new(executor), Arc::new(InMemoryTaskStore::new()));

    let card = agent_card(public_url(args.agent_url.as_deref(), &args.host, args.port));
    info!("Advertising agent card at {}", card.url);

    let server = Arc::new(A2aServer::new(card, handler).with_auth_token(args.auth_token));
    server.serve(addr).await
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
