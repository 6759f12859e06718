//! JSON HTTP API over the store, the file store and the AI layer.

mod assist;
mod auth;
mod error;
mod images;
mod recipes;

pub use auth::AuthUser;
pub use error::ApiError;

use crate::chat::DiscoveryChat;
use crate::config::AppConfig;
use crate::error::Result;
use crate::ingest::RecipeParser;
use crate::media::ImageStore;
use crate::providers::{
    ImageGenerator, OpenAIImageGenerator, OpenAIVisionTranscriber, ProviderFactory,
};
use crate::store::Database;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use log::{info, warn};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Everything a request handler can reach
pub struct AppState {
    pub db: Database,
    pub images: ImageStore,
    pub parser: RecipeParser,
    pub chat: Option<DiscoveryChat>,
    pub image_generator: Option<Arc<dyn ImageGenerator>>,
}

impl AppState {
    /// Wire up the database, file store and AI collaborators from config.
    /// Missing AI credentials only disable the AI features.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let db = Database::connect(&config.storage.database_url).await?;
        let purged = db.sessions().purge_expired().await?;
        if purged > 0 {
            info!("Purged {} expired sessions", purged);
        }

        let provider = ProviderFactory::from_config(&config.ai);
        let mut parser = RecipeParser::from_config(config, provider.clone())?;
        match OpenAIVisionTranscriber::from_config(&config.ai) {
            Ok(transcriber) => parser = parser.with_transcriber(Arc::new(transcriber)),
            Err(e) => warn!("Recipe photo parsing disabled: {}", e),
        }
        let chat = provider.map(DiscoveryChat::new);

        let image_generator: Option<Arc<dyn ImageGenerator>> =
            match OpenAIImageGenerator::from_config(&config.ai) {
                Ok(generator) => Some(Arc::new(generator)),
                Err(e) => {
                    warn!("Image generation disabled: {}", e);
                    None
                }
            };

        Ok(Self {
            db,
            images: ImageStore::new(&config.storage.upload_dir, config.storage.max_upload_bytes),
            parser,
            chat,
            image_generator,
        })
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.images.max_bytes();

    let api = Router::new()
        .route("/parse", post(assist::parse))
        .route("/parse/image", post(assist::parse_image))
        .route("/chat", post(assist::chat))
        .route("/tags", get(recipes::list_tags))
        .route("/storage/stats", get(images::storage_stats))
        .route("/recipes", get(recipes::list).post(recipes::create))
        .route("/recipes/import", post(recipes::import))
        .route(
            "/recipes/:id",
            get(recipes::get).put(recipes::update).delete(recipes::delete),
        )
        .route("/recipes/:id/favorite", post(recipes::toggle_favorite))
        .route(
            "/recipes/:id/modifications",
            get(recipes::list_modifications).post(recipes::add_modification),
        )
        .route("/recipes/:id/images", post(images::upload))
        .route("/recipes/:id/generate-image", post(assist::generate_image))
        .route(
            "/recipes/:id/images/:image_id",
            get(images::download).delete(images::remove),
        )
        .route("/recipes/:id/images/:image_id/hero", put(images::set_hero));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: &AppConfig) -> Result<()> {
    let state = Arc::new(AppState::from_config(config).await?);
    let app = router(state);

    let listener = TcpListener::bind(&config.server.bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;
    Ok(())
}
