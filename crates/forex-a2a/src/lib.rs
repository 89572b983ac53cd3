//! A2A (Agent-to-Agent) protocol support for the forex agents
//!
//! Server side: task store, event queue, request handler and the axum app
//! that serves the agent card and JSON-RPC methods, plus the executor that
//! drives the currency agent. Client side: a JSON-RPC client and the tool
//! that delegates work to a peer agent.

pub mod client;
pub mod error;
pub mod events;
pub mod executor;
pub mod handler;
pub mod protocol;
pub mod server;
pub mod store;
pub mod tool;

pub use client::A2aClient;
pub use error::A2aError;
pub use events::{EventQueue, TaskUpdater};
pub use executor::{AgentExecutor, AgentInit, CurrencyAgentExecutor, RequestContext};
pub use handler::{RequestHandler, TaskManager};
pub use protocol::{AgentCard, Message, Task, TaskState};
pub use server::A2aServer;
pub use store::{InMemoryTaskStore, TaskStore};
pub use tool::InvokeCurrencyExchangeAgentTool;
