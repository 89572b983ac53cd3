//! currency-mcp-server — Frankfurter-backed exchange tools over MCP

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use forex_core::ToolRegistry;
use forex_mcp::currency::DEFAULT_RATES_API_URL;
use forex_mcp::{FrankfurterClient, McpServer, McpToolAdapter, currency_tools};

#[derive(Parser)]
#[command(name = "currency-mcp-server", about = "Currency exchange MCP server")]
struct Args {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "PORT", default_value_t = 9090)]
    port: u16,

    /// Frankfurter-compatible rates API
    #[arg(long, env = "RATES_API_URL", default_value = DEFAULT_RATES_API_URL)]
    rates_api_url: String,
}

async fn run(args: Args) -> Result<()> {
    let addr = forex_cli::bind_addr(&args.host, args.port)?;

    let rates = Arc::new(FrankfurterClient::new(&args.rates_api_url));
    let mut registry = ToolRegistry::new();
    registry.extend(currency_tools(rates));
    info!("Serving {} currency tools from {}", registry.len(), args.rates_api_url);

    let server = Arc::new(McpServer::new(
        McpToolAdapter::new(Arc::new(registry)),
        "currency_exchange",
    ));
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
