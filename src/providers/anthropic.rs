use crate::config::ProviderConfig;
use crate::error::{Result, TastebaseError};
use crate::providers::{api_client, api_error_message, CompletionRequest, LlmProvider};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider from configuration
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self> {
        // Try config first, then fall back to environment variable
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .ok_or_else(|| {
                TastebaseError::NotConfigured(
                    "ANTHROPIC_API_KEY not found in config or environment".into(),
                )
            })?;

        Ok(AnthropicProvider {
            client: api_client(timeout)?,
            api_key,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.anthropic.com".to_string()),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    #[doc(hidden)]
    pub fn with_base_url(api_key: String, base_url: String, model: String) -> Self {
        AnthropicProvider {
            client: Client::new(),
            api_key,
            base_url,
            model,
            temperature: 0.2,
            max_tokens: 4000,
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn provider_name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        // Anthropic has no JSON response mode; the system prompt carries the format.
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m| json!({"role": m.role.as_str(), "content": m.content}))
            .collect();

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&json!({
                "model": self.model,
                "max_tokens": request.max_tokens.unwrap_or(self.max_tokens),
                "temperature": request.temperature.unwrap_or(self.temperature),
                "system": request.system,
                "messages": messages,
            }))
            .send()
            .await?;

        let status = response.status();
        let response_body: Value =
            serde_json::from_str(&response.text().await?).unwrap_or(Value::Null);
        debug!("{:?}", response_body);

        if let Some(message) = api_error_message(&response_body) {
            return Err(TastebaseError::Provider(format!(
                "Anthropic API error ({status}): {message}"
            )));
        }
        if !status.is_success() {
            return Err(TastebaseError::Provider(format!(
                "Anthropic returned status {status}"
            )));
        }

        let text: String = response_body["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b["type"] == "text")
                    .filter_map(|b| b["text"].as_str())
                    .collect()
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(TastebaseError::Provider(
                "Failed to extract content from Anthropic response".into(),
            ));
        }
        Ok(text)
    }
}
