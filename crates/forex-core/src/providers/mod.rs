//! LLM provider abstraction
//!
//! The agents talk to a single OpenAI-compatible endpoint (Azure OpenAI
//! behind an AI gateway in the reference deployment). Providers implement
//! [`LlmProvider`] so the agent loop can be driven by a scripted fake in tests.

pub mod openai_compat;
pub mod types;

pub use openai_compat::{OpenAiCompatConfig, OpenAiCompatProvider};
pub use types::{
    ChatBlock, ChatMessage, ChatMessageContent, ChatResponse, ChatRole, ChatUsage, LlmProvider,
    StopReason, ToolCall,
};
