use super::{ApiError, AppState, AuthUser};
use crate::ingest::ParseMethod;
use crate::store::{
    ModificationRecord, RecipeDraft, RecipeQuery, RecipeRecord, RecipeSummary, TagCount,
};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct InputRequest {
    pub input: String,
}

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub note: String,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub recipe: RecipeRecord,
    pub method: ParseMethod,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<RecipeQuery>,
) -> ApiResult<Json<Vec<RecipeSummary>>> {
    Ok(Json(state.db.recipes().list(&user.user_id, &query).await?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(draft): Json<RecipeDraft>,
) -> ApiResult<(StatusCode, Json<RecipeRecord>)> {
    let record = state.db.recipes().create(&user.user_id, &draft).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<RecipeRecord>> {
    Ok(Json(state.db.recipes().get(&user.user_id, &id).await?))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(draft): Json<RecipeDraft>,
) -> ApiResult<Json<RecipeRecord>> {
    Ok(Json(state.db.recipes().update(&user.user_id, &id, &draft).await?))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.db.recipes().delete(&user.user_id, &id).await?;
    if let Err(e) = state.images.delete_recipe(&id).await {
        warn!("Recipe {} deleted but its files remain: {}", id, e);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Parse a URL or text and save the result in one step.
pub async fn import(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<InputRequest>,
) -> ApiResult<(StatusCode, Json<ImportResponse>)> {
    let outcome = state.parser.parse(&request.input).await?;
    let record = state
        .db
        .recipes()
        .create(&user.user_id, &RecipeDraft::from(outcome.recipe))
        .await?;
    info!("Imported recipe {} via {:?}", record.id, outcome.method);

    Ok((
        StatusCode::CREATED,
        Json(ImportResponse {
            recipe: record,
            method: outcome.method,
            warnings: outcome.warnings,
        }),
    ))
}

pub async fn toggle_favorite(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let favorite = state.db.recipes().toggle_favorite(&user.user_id, &id).await?;
    Ok(Json(json!({ "favorite": favorite })))
}

pub async fn list_modifications(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ModificationRecord>>> {
    Ok(Json(
        state.db.recipes().list_modifications(&user.user_id, &id).await?,
    ))
}

pub async fn add_modification(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(request): Json<NoteRequest>,
) -> ApiResult<(StatusCode, Json<ModificationRecord>)> {
    let record = state
        .db
        .recipes()
        .add_modification(&user.user_id, &id, &request.note)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_tags(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<Vec<TagCount>>> {
    Ok(Json(state.db.recipes().list_tags(&user.user_id).await?))
}
