use super::images::store_image;
use super::recipes::InputRequest;
use super::{ApiError, AppState, AuthUser};
use crate::chat::ChatReply;
use crate::error::TastebaseError;
use crate::ingest::ParseOutcome;
use crate::providers::{illustration_prompt, ChatMessage};
use crate::store::ImageRecord;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use log::info;
use serde::Deserialize;
use std::sync::Arc;

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    pub message: String,
}

pub async fn parse(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Json(request): Json<InputRequest>,
) -> ApiResult<Json<ParseOutcome>> {
    Ok(Json(state.parser.parse(&request.input).await?))
}

/// Raw image body: a photo or scan of a recipe
pub async fn parse_image(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    body: Bytes,
) -> ApiResult<Json<ParseOutcome>> {
    Ok(Json(state.parser.parse_image(&body).await?))
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<ChatReply>> {
    let chat = state
        .chat
        .as_ref()
        .ok_or_else(|| TastebaseError::NotConfigured("no AI provider for chat".into()))?;
    Ok(Json(chat.reply(&request.history, &request.message).await?))
}

/// Illustrate a recipe and attach the picture as an AI-generated image.
pub async fn generate_image(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<ImageRecord>)> {
    let generator = state
        .image_generator
        .clone()
        .ok_or_else(|| TastebaseError::NotConfigured("no image generator".into()))?;

    let recipe = state.db.recipes().get(&user.user_id, &id).await?;
    let prompt = illustration_prompt(&recipe.recipe.title, recipe.recipe.description.as_deref());
    let bytes = generator.generate(&prompt).await?;

    let alt = recipe.recipe.title.clone();
    let record = store_image(&state, &id, &bytes, |image| {
        image.with_alt(Some(&alt)).ai_generated()
    })
    .await?;
    info!("Generated image {} for recipe {}", record.id, id);
    Ok((StatusCode::CREATED, Json(record)))
}
