//! forex-core — agent loop, model providers, tools and streaming bridge
//!
//! Everything the currency agents share that does not speak a wire protocol:
//! the tool registry, the OpenAI-compatible chat provider, the bounded
//! tool-calling loop with its per-conversation session store, and the
//! translation of loop output into caller-facing stream events.

pub mod agent;
pub mod bridge;
pub mod providers;
pub mod response;
pub mod session;
pub mod tools;

pub use agent::{AgentGraph, ReactAgent};
pub use bridge::{MessageKind, stream_events};
pub use response::{ResponseFormat, ResponseStatus, StreamEvent, agent_response};
pub use session::SessionStore;
pub use tools::{ToolDefinition, ToolHandler, ToolRegistry};
