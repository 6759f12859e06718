use crate::config::AiConfig;
use crate::error::{Result, TastebaseError};
use crate::providers::api_error_message;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::debug;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

/// Produces illustrative images for recipes
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Returns encoded image bytes (PNG for OpenAI)
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>>;
}

pub struct OpenAIImageGenerator {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIImageGenerator {
    /// Uses the `openai` provider's credentials and endpoint.
    pub fn from_config(config: &AiConfig) -> Result<Self> {
        let provider = config.providers.get("openai").filter(|p| p.enabled);
        let api_key = provider
            .and_then(|p| p.api_key.clone())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                TastebaseError::NotConfigured("image generation needs an OpenAI API key".into())
            })?;
        let base_url = provider
            .and_then(|p| p.base_url.clone())
            .unwrap_or_else(|| "https://api.openai.com".to_string());

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout.max(120)))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url,
            model: config.image_model.clone(),
        })
    }

    #[doc(hidden)]
    pub fn with_base_url(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
            model,
        }
    }
}

#[async_trait]
impl ImageGenerator for OpenAIImageGenerator {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(format!("{}/v1/images/generations", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.model,
                "prompt": prompt,
                "n": 1,
                "size": "1024x1024",
            }))
            .send()
            .await?;

        let status = response.status();
        let body: Value = serde_json::from_str(&response.text().await?).unwrap_or(Value::Null);
        if let Some(message) = api_error_message(&body) {
            return Err(TastebaseError::Provider(format!(
                "OpenAI image API error ({status}): {message}"
            )));
        }
        if !status.is_success() {
            return Err(TastebaseError::Provider(format!(
                "OpenAI image API returned status {status}"
            )));
        }

        let encoded = body["data"][0]["b64_json"].as_str().ok_or_else(|| {
            TastebaseError::Provider("image response did not contain b64_json data".into())
        })?;
        debug!("Received {} base64 characters of image data", encoded.len());

        STANDARD
            .decode(encoded)
            .map_err(|e| TastebaseError::Provider(format!("invalid image data: {e}")))
    }
}

/// Prompt for a plated, photographic illustration of a recipe.
pub fn illustration_prompt(title: &str, description: Option<&str>) -> String {
    let mut prompt = format!(
        "A professional, appetizing food photograph of {title}, plated and served, natural light, shallow depth of field, no text or labels."
    );
    if let Some(description) = description.filter(|d| !d.trim().is_empty()) {
        prompt.push_str(&format!(" The dish: {}", description.trim()));
    }
    prompt
}
