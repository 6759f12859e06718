use crate::config::ProviderConfig;
use crate::error::{Result, TastebaseError};
use crate::providers::{api_client, api_error_message, CompletionRequest, LlmProvider};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider from configuration
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self> {
        // Try config first, then fall back to environment variable
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                TastebaseError::NotConfigured(
                    "OPENAI_API_KEY not found in config or environment".into(),
                )
            })?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com".to_string());

        Ok(OpenAIProvider {
            client: api_client(timeout)?,
            api_key,
            base_url,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    #[doc(hidden)]
    pub fn with_base_url(api_key: String, base_url: String, model: String) -> Self {
        OpenAIProvider {
            client: Client::new(),
            api_key,
            base_url,
            model,
            temperature: 0.2,
            max_tokens: 2000,
        }
    }
}

/// Request body shared by OpenAI and OpenAI-compatible servers.
pub(crate) fn chat_completions_body(
    model: &str,
    request: &CompletionRequest,
    temperature: f32,
    max_tokens: u32,
) -> Value {
    let mut messages = vec![json!({"role": "system", "content": request.system})];
    messages.extend(
        request
            .messages
            .iter()
            .map(|m| json!({"role": m.role.as_str(), "content": m.content})),
    );

    let mut body = json!({
        "model": model,
        "messages": messages,
        "temperature": request.temperature.unwrap_or(temperature),
        "max_tokens": request.max_tokens.unwrap_or(max_tokens),
    });
    if request.json_mode {
        body["response_format"] = json!({"type": "json_object"});
    }
    body
}

/// Pull the assistant text out of a chat-completions response.
pub(crate) fn chat_completions_content(
    provider: &str,
    status: reqwest::StatusCode,
    body: &Value,
) -> Result<String> {
    if let Some(message) = api_error_message(body) {
        return Err(TastebaseError::Provider(format!(
            "{provider} API error ({status}): {message}"
        )));
    }
    if !status.is_success() {
        return Err(TastebaseError::Provider(format!(
            "{provider} returned status {status}"
        )));
    }

    body["choices"][0]["message"]["content"]
        .as_str()
        .map(String::from)
        .ok_or_else(|| {
            TastebaseError::Provider(format!("Failed to extract content from {provider} response"))
        })
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&chat_completions_body(
                &self.model,
                request,
                self.temperature,
                self.max_tokens,
            ))
            .send()
            .await?;

        let status = response.status();
        let response_body: Value =
            serde_json::from_str(&response.text().await?).unwrap_or(Value::Null);
        debug!("{:?}", response_body);

        chat_completions_content("OpenAI", status, &response_body)
    }
}
