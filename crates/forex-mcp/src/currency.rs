//! Currency exchange tools backed by the Frankfurter rates API
//!
//! Both tools always succeed at the tool level: upstream failures are folded
//! into an `{"error": "..."}` payload the model can read.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use forex_core::tools::{ToolHandler, json_schema};

pub const DEFAULT_RATES_API_URL: &str = "https://api.frankfurter.app";

/// Why a rate lookup produced no usable data
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateLookupError {
    #[error("API request failed: {0}")]
    Request(String),
    #[error("Invalid JSON response from API.")]
    InvalidJson,
    #[error("Invalid API response format.")]
    InvalidFormat,
    #[error("Exchange rate for {0} not found.")]
    RateNotFound(String),
}

impl RateLookupError {
    pub fn to_value(&self) -> Value {
        serde_json::json!({ "error": self.to_string() })
    }
}

/// Thin client for `GET {base}/{date}?from=X&to=Y`
#[derive(Debug, Clone)]
pub struct FrankfurterClient {
    http: Client,
    base_url: String,
}

impl Default for FrankfurterClient {
    fn default() -> Self {
        Self::new(DEFAULT_RATES_API_URL)
    }
}

impl FrankfurterClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the rates payload for a date (`latest` or `YYYY-MM-DD`)
    pub async fn fetch_rates(
        &self,
        date: &str,
        currency_from: &str,
        currency_to: &str,
    ) -> Result<Value, RateLookupError> {
        let url = format!("{}/{}", self.base_url, date);
        debug!(url = url.as_str(), currency_from, currency_to, "Fetching exchange rates");

        let response = self
            .http
            .get(&url)
            .query(&[("from", currency_from), ("to", currency_to)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| RateLookupError::Request(e.to_string()))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| RateLookupError::Request(e.to_string()))?;

        let data: Value =
            serde_json::from_slice(&body).map_err(|_| RateLookupError::InvalidJson)?;

        if data.get("rates").is_none() {
            return Err(RateLookupError::InvalidFormat);
        }
        Ok(data)
    }

    /// Raw rates payload, or an error payload
    pub async fn get_exchange_rate(
        &self,
        currency_from: &str,
        currency_to: &str,
        currency_date: &str,
    ) -> Value {
        match self
            .fetch_rates(currency_date, currency_from, currency_to)
            .await
        {
            Ok(data) => data,
            Err(e) => {
                warn!("Exchange rate lookup failed: {}", e);
                e.to_value()
            }
        }
    }

    /// Convert `amount` at the latest rate, or an error payload
    pub async fn trade(&self, currency_from: &str, currency_to: &str, amount: f64) -> Value {
        match self.convert(currency_from, currency_to, amount).await {
            Ok(trade) => trade,
            Err(e) => {
                warn!("Currency trade failed: {}", e);
                e.to_value()
            }
        }
    }

    async fn convert(
        &self,
        currency_from: &str,
        currency_to: &str,
        amount: f64,
    ) -> Result<Value, RateLookupError> {
        let data = self.fetch_rates("latest", currency_from, currency_to).await?;
        let rate = data["rates"]
            .get(currency_to)
            .and_then(Value::as_f64)
            .ok_or_else(|| RateLookupError::RateNotFound(currency_to.to_string()))?;

        Ok(serde_json::json!({
            "converted_amount": amount * rate,
            "from_currency": currency_from,
            "to_currency": currency_to,
            "rate": rate,
        }))
    }
}

fn str_arg<'a>(input: &'a Value, key: &str, default: &'a str) -> Result<&'a str> {
    match input.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_str()
            .ok_or_else(|| anyhow!("'{}' must be a string", key)),
    }
}

pub struct TradeCurrencyExchangeTool {
    client: Arc<FrankfurterClient>,
}

impl TradeCurrencyExchangeTool {
    pub fn new(client: Arc<FrankfurterClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolHandler for TradeCurrencyExchangeTool {
    fn name(&self) -> &str {
        "trade_currency_exchange"
    }

    fn description(&self) -> &str {
        "Use this to trade currency exchange for the specified amount. Returns the converted \
         amount and exchange rate, or an error message if the request fails."
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "currency_from": {
                    "type": "string",
                    "description": "The currency to trade from (e.g., \"USD\").",
                    "default": "USD"
                },
                "currency_to": {
                    "type": "string",
                    "description": "The currency to trade to (e.g., \"EUR\").",
                    "default": "EUR"
                },
                "amount": {
                    "type": "number",
                    "description": "The amount of money to trade.",
                    "default": 1.0
                }
            }),
            vec![],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let from = str_arg(&input, "currency_from", "USD")?;
        let to = str_arg(&input, "currency_to", "EUR")?;
        let amount = match input.get("amount") {
            None | Some(Value::Null) => 1.0,
            Some(v) => v
                .as_f64()
                .ok_or_else(|| anyhow!("'amount' must be a number"))?,
        };

        let result = self.client.trade(from, to, amount).await;
        Ok(result.to_string())
    }
}

pub struct GetCurrencyExchangeRateTool {
    client: Arc<FrankfurterClient>,
}

impl GetCurrencyExchangeRateTool {
    pub fn new(client: Arc<FrankfurterClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolHandler for GetCurrencyExchangeRateTool {
    fn name(&self) -> &str {
        "get_currency_exchange_rate"
    }

    fn description(&self) -> &str {
        "Use this to get the current currency exchange rate. Returns the exchange rate data, \
         or an error message if the request fails."
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "currency_from": {
                    "type": "string",
                    "description": "The currency to convert from (e.g., \"USD\").",
                    "default": "USD"
                },
                "currency_to": {
                    "type": "string",
                    "description": "The currency to convert to (e.g., \"EUR\").",
                    "default": "EUR"
                },
                "currency_date": {
                    "type": "string",
                    "description": "The date for the exchange rate or \"latest\".",
                    "default": "latest"
                }
            }),
            vec![],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let from = str_arg(&input, "currency_from", "USD")?;
        let to = str_arg(&input, "currency_to", "EUR")?;
        let date = str_arg(&input, "currency_date", "latest")?;

        let result = self.client.get_exchange_rate(from, to, date).await;
        Ok(result.to_string())
    }
}

/// Both currency tools sharing one client
pub fn currency_tools(client: Arc<FrankfurterClient>) -> Vec<Arc<dyn ToolHandler>> {
    vec![
        Arc::new(TradeCurrencyExchangeTool::new(client.clone())),
        Arc::new(GetCurrencyExchangeRateTool::new(client)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        extract::{Path, Query},
        http::StatusCode,
        response::IntoResponse,
        routing::get,
    };
    use std::collections::HashMap;

    /// Fake rates API. The `date` segment picks the behaviour.
    async fn rates(
        Path(date): Path<String>,
        Query(query): Query<HashMap<String, String>>,
    ) -> axum::response::Response {
        let to = query.get("to").cloned().unwrap_or_default();
        match date.as_str() {
            "latest" if to == "XXX" => axum::Json(serde_json::json!({"rates": {}})).into_response(),
            "latest" | "2024-01-02" => axum::Json(serde_json::json!({
                "amount": 1.0,
                "base": query.get("from"),
                "date": "2024-01-02",
                "rates": { to: 0.9 }
            }))
            .into_response(),
            "norates" => axum::Json(serde_json::json!({"base": "USD"})).into_response(),
            "garbage" => "<html>not json</html>".into_response(),
            _ => (StatusCode::NOT_FOUND, "not found").into_response(),
        }
    }

    async fn spawn_rates_api() -> String {
        let app = Router::new().route("/{date}", get(rates));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            RateLookupError::InvalidJson.to_value(),
            serde_json::json!({"error": "Invalid JSON response from API."})
        );
        assert_eq!(
            RateLookupError::InvalidFormat.to_value(),
            serde_json::json!({"error": "Invalid API response format."})
        );
        assert_eq!(
            RateLookupError::RateNotFound("JPY".into()).to_string(),
            "Exchange rate for JPY not found."
        );
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = FrankfurterClient::new("http://localhost:1/");
        assert_eq!(client.base_url, "http://localhost:1");
        assert_eq!(FrankfurterClient::default().base_url, DEFAULT_RATES_API_URL);
    }

    #[tokio::test]
    async fn test_trade_converts_amount() {
        let client = FrankfurterClient::new(spawn_rates_api().await);
        let result = client.trade("USD", "EUR", 100.0).await;
        assert!((result["converted_amount"].as_f64().unwrap() - 90.0).abs() < 1e-9);
        assert_eq!(result["from_currency"], "USD");
        assert_eq!(result["to_currency"], "EUR");
        assert_eq!(result["rate"], 0.9);
    }

    #[tokio::test]
    async fn test_get_rate_returns_raw_payload() {
        let client = FrankfurterClient::new(spawn_rates_api().await);
        let result = client.get_exchange_rate("USD", "GBP", "2024-01-02").await;
        assert_eq!(result["rates"]["GBP"], 0.9);
        assert_eq!(result["base"], "USD");
    }

    #[tokio::test]
    async fn test_missing_rates_key() {
        let client = FrankfurterClient::new(spawn_rates_api().await);
        let result = client.get_exchange_rate("USD", "EUR", "norates").await;
        assert_eq!(result, serde_json::json!({"error": "Invalid API response format."}));
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let client = FrankfurterClient::new(spawn_rates_api().await);
        let result = client.get_exchange_rate("USD", "EUR", "garbage").await;
        assert_eq!(result, serde_json::json!({"error": "Invalid JSON response from API."}));
    }

    #[tokio::test]
    async fn test_http_status_failure() {
        let client = FrankfurterClient::new(spawn_rates_api().await);
        let result = client.get_exchange_rate("USD", "EUR", "1999-99-99").await;
        let msg = result["error"].as_str().unwrap();
        assert!(msg.starts_with("API request failed: "), "{msg}");
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let client = FrankfurterClient::new("http://127.0.0.1:1");
        let result = client.trade("USD", "EUR", 1.0).await;
        assert!(
            result["error"]
                .as_str()
                .unwrap()
                .starts_with("API request failed: ")
        );
    }

    #[tokio::test]
    async fn test_trade_missing_target_rate() {
        let client = FrankfurterClient::new(spawn_rates_api().await);
        let result = client.trade("USD", "XXX", 5.0).await;
        assert_eq!(
            result,
            serde_json::json!({"error": "Exchange rate for XXX not found."})
        );
    }

    #[tokio::test]
    async fn test_trade_tool_defaults_and_output() {
        let client = Arc::new(FrankfurterClient::new(spawn_rates_api().await));
        let tool = TradeCurrencyExchangeTool::new(client);
        let out = tool.execute(serde_json::json!({"amount": 100})).await.unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["from_currency"], "USD");
        assert_eq!(parsed["to_currency"], "EUR");
        assert!((parsed["converted_amount"].as_f64().unwrap() - 90.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_trade_tool_rejects_bad_amount() {
        let tool = TradeCurrencyExchangeTool::new(Arc::new(FrankfurterClient::default()));
        let err = tool
            .execute(serde_json::json!({"amount": "lots"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("amount"));
    }

    #[tokio::test]
    async fn test_rate_tool_error_is_not_raised() {
        let tool = GetCurrencyExchangeRateTool::new(Arc::new(FrankfurterClient::new(
            "http://127.0.0.1:1",
        )));
        let out = tool.execute(serde_json::json!({})).await.unwrap();
        assert!(out.contains("API request failed"));
    }

    #[test]
    fn test_tool_names() {
        let tools = currency_tools(Arc::new(FrankfurterClient::default()));
        let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["trade_currency_exchange", "get_currency_exchange_rate"]);
    }
}
