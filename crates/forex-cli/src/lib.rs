//! forex-cli — wiring for the currency MCP server, the currency agent and the
//! financial assistant binaries

pub mod args;
pub mod assistant;
pub mod currency_agent;
pub mod logging;

pub use args::{ModelArgs, bind_addr};
pub use assistant::FinancialAssistantAgent;
pub use logging::init_tracing;

#[cfg(test)]
mod testing;
