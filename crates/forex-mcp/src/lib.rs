//! MCP (Model Context Protocol) support for the forex agents
//!
//! Serves the currency exchange tools over the streamable HTTP transport and
//! consumes tools from remote MCP servers.

pub mod adapter;
pub mod client;
pub mod currency;
pub mod protocol;
pub mod server;

pub use adapter::McpToolAdapter;
pub use client::{McpClient, McpClientConfig};
pub use currency::{FrankfurterClient, RateLookupError, currency_tools};
pub use server::McpServer;
