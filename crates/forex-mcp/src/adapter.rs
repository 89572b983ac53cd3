//! Exposes a [`ToolRegistry`] in MCP terms

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use forex_core::tools::ToolRegistry;

use crate::protocol::{McpTool, ToolCallResult};

pub struct McpToolAdapter {
    registry: Arc<ToolRegistry>,
}

impl McpToolAdapter {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn list_tools(&self) -> Vec<McpTool> {
        self.registry
            .definitions()
            .into_iter()
            .map(|t| McpTool {
                name: t.name,
                description: t.description,
                input_schema: t.input_schema,
            })
            .collect()
    }

    /// Run a tool; failures are reported in-band with `isError`
    pub async fn call_tool(&self, name: &str, arguments: Value) -> ToolCallResult {
        debug!("MCP calling tool: {}", name);
        match self.registry.execute(name, arguments).await {
            Ok(output) => ToolCallResult::text(output),
            Err(e) => ToolCallResult::error(format!("Error executing tool {}: {:#}", name, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use forex_core::tools::{ToolHandler, json_schema};

    struct Failing;

    #[async_trait]
    impl ToolHandler for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        fn input_schema(&self) -> Value {
            json_schema(serde_json::json!({}), vec![])
        }

        async fn execute(&self, _input: Value) -> Result<String> {
            anyhow::bail!("upstream exploded")
        }
    }

    fn adapter() -> McpToolAdapter {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Failing));
        McpToolAdapter::new(Arc::new(registry))
    }

    #[test]
    fn test_list_tools() {
        let tools = adapter().list_tools();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "failing");
        assert_eq!(tools[0].input_schema["type"], "object");
    }

    #[tokio::test]
    async fn test_tool_failure_in_band() {
        let result = adapter().call_tool("failing", serde_json::json!({})).await;
        assert_eq!(result.is_error, Some(true));
        assert!(result.joined_text().contains("upstream exploded"));
    }

    #[tokio::test]
    async fn test_unknown_tool_in_band() {
        let result = adapter().call_tool("nonexistent", serde_json::json!({})).await;
        assert_eq!(result.is_error, Some(true));
        assert!(result.joined_text().contains("Unknown tool"));
    }
}
