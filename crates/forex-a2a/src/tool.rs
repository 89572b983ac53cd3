//! `invoke_currency_exchange_agent` tool — hands currency work to the A2A agent

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use forex_core::tools::{ToolHandler, json_schema};

use crate::client::A2aClient;
use crate::protocol::{Message, SendMessageResult};

pub struct InvokeCurrencyExchangeAgentTool {
    client: A2aClient,
    agent_url: String,
}

impl InvokeCurrencyExchangeAgentTool {
    pub fn new(agent_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: A2aClient::new().with_token(token),
            agent_url: agent_url.into(),
        }
    }

    /// Single-turn exchange: send the description, then read the task back
    async fn run_single_turn(&self, task_description: &str) -> Result<String> {
        let card = self.client.fetch_agent_card(&self.agent_url).await?;
        info!("Connected to agent '{}' at {}", card.name, card.url);

        let result = self
            .client
            .send_message(&card.url, Message::user_text(task_description))
            .await?;
        let task = match result {
            SendMessageResult::Task(task) => task,
            SendMessageResult::Message(message) => return Ok(message.text()),
        };

        let task = self.client.get_task(&card.url, &task.id, None).await?;
        debug!("Task {} finished as {}", task.id, task.status.state);
        Ok(task.reply_text().unwrap_or_default())
    }
}

#[async_trait]
impl ToolHandler for InvokeCurrencyExchangeAgentTool {
    fn name(&self) -> &str {
        "invoke_currency_exchange_agent"
    }

    fn description(&self) -> &str {
        "Executes currency exchange sells, orders, trades."
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "task_description": {
                    "type": "string",
                    "description": "Description of what the next agent should do, including all of the relevant context."
                }
            }),
            vec!["task_description"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let task_description = input
            .get("task_description")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("Missing 'task_description' parameter"))?;

        let preview: String = task_description.chars().take(100).collect();
        info!("Invoking currency exchange agent: {}", preview);
        self.run_single_turn(task_description).await
    }
}
