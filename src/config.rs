use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;

/// Top-level application configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// AI provider configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AiConfig {
    /// Default provider to use when not specified
    #[serde(default = "default_provider")]
    pub default_provider: String,
    /// Map of provider name to provider configuration
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    /// Fallback configuration for automatic provider switching
    #[serde(default)]
    pub fallback: FallbackConfig,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Model used for recipe illustrations
    #[serde(default = "default_image_model")]
    pub image_model: String,
    /// Model that reads recipe photos
    #[serde(default = "default_vision_model")]
    pub vision_model: String,
}

impl AiConfig {
    /// Per-request limit for model calls
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout)
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            providers: HashMap::new(),
            fallback: FallbackConfig::default(),
            timeout: default_timeout(),
            image_model: default_image_model(),
            vision_model: default_vision_model(),
        }
    }
}

/// Configuration for a specific AI provider
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    /// Whether this provider is enabled
    pub enabled: bool,
    /// Model identifier (e.g., "gpt-4o-mini", "claude-3-5-haiku-latest")
    pub model: String,
    /// Temperature for generation (0.0-1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// API key for authentication (can also be set via environment variable)
    pub api_key: Option<String>,
    /// Base URL for API endpoint (for custom or proxy endpoints)
    pub base_url: Option<String>,
}

/// Configuration for provider fallback and retry behavior
#[derive(Debug, Deserialize, Clone)]
pub struct FallbackConfig {
    /// Whether fallback is enabled
    #[serde(default)]
    pub enabled: bool,
    /// Order of providers to try (first to last)
    #[serde(default)]
    pub order: Vec<String>,
    /// Number of retry attempts per provider before fallback
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Base delay between retries in milliseconds, multiplied by the attempt number
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            order: Vec::new(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Database and upload locations
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            upload_dir: default_upload_dir(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            session_ttl_hours: default_session_ttl_hours(),
        }
    }
}

/// Limits applied while turning pages and text into recipes
#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_max_page_bytes")]
    pub max_page_bytes: usize,
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_page_bytes: default_max_page_bytes(),
            max_prompt_chars: default_max_prompt_chars(),
            user_agent: default_user_agent(),
        }
    }
}

// Default value functions
fn default_provider() -> String {
    "openai".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_timeout() -> u64 {
    30
}

fn default_image_model() -> String {
    "gpt-image-1".to_string()
}

fn default_vision_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_database_url() -> String {
    "sqlite:tastebase.db".to_string()
}

fn default_upload_dir() -> String {
    "uploads".to_string()
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_session_ttl_hours() -> i64 {
    24 * 30
}

fn default_max_page_bytes() -> usize {
    2 * 1024 * 1024
}

fn default_max_prompt_chars() -> usize {
    12_000
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; TastebaseBot/1.0)".to_string()
}

/// Load configuration from file and environment variables
///
/// Configuration is loaded with the following priority (highest to lowest):
/// 1. Environment variables with TASTEBASE__ prefix
/// 2. tastebase.toml file in current directory
/// 3. Default values
///
/// Environment variable format: TASTEBASE__AI__PROVIDERS__OPENAI__API_KEY
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let settings = Config::builder()
        // Optional config file (can be missing)
        .add_source(File::with_name("tastebase").required(false))
        // Use double underscore for nested: TASTEBASE__STORAGE__UPLOAD_DIR
        .add_source(
            Environment::with_prefix("TASTEBASE")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn test_default_values() {
        assert_eq!(default_provider(), "openai");
        assert_eq!(default_max_tokens(), 2000);
        assert_eq!(default_retry_attempts(), 3);
        assert_eq!(default_retry_delay_ms(), 1000);
        assert_eq!(default_max_upload_bytes(), 10 * 1024 * 1024);
    }

    #[test]
    fn test_fallback_config_default() {
        let fallback = FallbackConfig::default();
        assert!(!fallback.enabled);
        assert!(fallback.order.is_empty());
        assert_eq!(fallback.retry_attempts, 3);
        assert_eq!(fallback.retry_delay_ms, 1000);
    }

    #[test]
    fn test_empty_source_uses_defaults() {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str("", FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.storage.database_url, "sqlite:tastebase.db");
        assert_eq!(config.server.bind, "127.0.0.1:3000");
        assert_eq!(config.ai.default_provider, "openai");
        assert!(config.ai.providers.is_empty());
        assert_eq!(config.ingest.max_prompt_chars, 12_000);
    }

    #[test]
    fn test_toml_sections() {
        let toml = r#"
            [ai]
            default_provider = "anthropic"

            [ai.providers.anthropic]
            enabled = true
            model = "claude-3-5-haiku-latest"
            api_key = "test-key"

            [ai.fallback]
            enabled = true
            order = ["anthropic", "openai"]

            [storage]
            upload_dir = "/var/lib/tastebase/uploads"
            max_upload_bytes = 1024
        "#;

        let config: AppConfig = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.ai.default_provider, "anthropic");
        let anthropic = config.ai.providers.get("anthropic").unwrap();
        assert!(anthropic.enabled);
        assert_eq!(anthropic.temperature, 0.2);
        assert_eq!(anthropic.api_key.as_deref(), Some("test-key"));
        assert_eq!(config.ai.fallback.order, vec!["anthropic", "openai"]);
        assert_eq!(config.ai.fallback.retry_attempts, 3);
        assert_eq!(config.storage.upload_dir, "/var/lib/tastebase/uploads");
        assert_eq!(config.storage.max_upload_bytes, 1024);
        assert_eq!(config.storage.database_url, "sqlite:tastebase.db");
    }
}
