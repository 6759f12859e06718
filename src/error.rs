use thiserror::Error;

/// Errors that can occur anywhere in Tastebase
#[derive(Error, Debug)]
pub enum TastebaseError {
    /// HTTP transport failure talking to a recipe page or an AI provider
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Recipe page could not be fetched
    #[error("Failed to fetch URL: {0}")]
    Fetch(String),

    /// No structured recipe data was present on the page
    #[error("No recipe found: {0}")]
    NoRecipeFound(String),

    /// The model judged the input not to be a recipe
    #[error("Input does not look like a recipe: {0}")]
    NotARecipe(String),

    /// Recipe data failed schema validation
    #[error("Invalid recipe: {0}")]
    InvalidRecipe(String),

    /// AI provider returned an error or an unexpected response
    #[error("Provider error: {0}")]
    Provider(String),

    /// Requested row or file does not exist (or is not owned by the caller)
    #[error("{0} not found")]
    NotFound(String),

    /// Missing or invalid session
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller supplied something unusable
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Upload is not one of the accepted image formats
    #[error("Unsupported image: {0}")]
    UnsupportedImage(String),

    /// Upload exceeds the configured size limit
    #[error("Payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Feature needs a collaborator that is not configured
    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Manifest error: {0}")]
    Manifest(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, TastebaseError>;
