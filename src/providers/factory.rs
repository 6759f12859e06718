use crate::config::{AiConfig, ProviderConfig};
use crate::error::{Result, TastebaseError};
use crate::providers::{
    AnthropicProvider, FallbackProvider, LlmProvider, OllamaProvider, OpenAIProvider,
};
use std::sync::Arc;
use std::time::Duration;

pub struct ProviderFactory;

impl ProviderFactory {
    /// Create a provider instance from configuration; `timeout` bounds each request
    pub fn create(
        provider_name: &str,
        config: &ProviderConfig,
        timeout: Duration,
    ) -> Result<Box<dyn LlmProvider>> {
        // Validate that provider is enabled
        if !config.enabled {
            return Err(TastebaseError::NotConfigured(format!(
                "Provider '{}' is not enabled in configuration",
                provider_name
            )));
        }

        match provider_name {
            "openai" => Ok(Box::new(OpenAIProvider::new(config, timeout)?)),
            "anthropic" => Ok(Box::new(AnthropicProvider::new(config, timeout)?)),
            "ollama" => Ok(Box::new(OllamaProvider::new(config, timeout)?)),
            _ => Err(TastebaseError::NotConfigured(format!(
                "Unknown provider: {}",
                provider_name
            ))),
        }
    }

    /// Get the default provider from configuration
    pub fn default_provider(config: &AiConfig) -> Result<Box<dyn LlmProvider>> {
        let provider_name = &config.default_provider;
        let provider_config = config.providers.get(provider_name).ok_or_else(|| {
            TastebaseError::NotConfigured(format!(
                "Default provider '{}' not found in configuration",
                provider_name
            ))
        })?;

        Self::create(provider_name, provider_config, config.request_timeout())
    }

    /// Build whatever the configuration asks for, or `None` when no
    /// provider is usable. AI features are optional.
    pub fn from_config(config: &AiConfig) -> Option<Arc<dyn LlmProvider>> {
        match FallbackProvider::new(config) {
            Ok(provider) => Some(Arc::new(provider)),
            Err(e) => {
                log::warn!("AI features disabled: {}", e);
                None
            }
        }
    }

    /// List all available provider names
    pub fn available_providers() -> Vec<&'static str> {
        vec!["openai", "anthropic", "ollama"]
    }
}
