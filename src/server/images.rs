use super::{ApiError, AppState, AuthUser};
use crate::error::TastebaseError;
use crate::media::{content_type_for, StorageStats, VariantSize};
use crate::store::{ImageRecord, NewImage};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::warn;
use serde::Deserialize;
use std::sync::Arc;

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Default, Deserialize)]
pub struct UploadParams {
    pub alt: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SizeParams {
    pub size: Option<String>,
}

/// Store the file, then the row; a failed insert removes the file again.
pub(super) async fn store_image(
    state: &AppState,
    recipe_id: &str,
    bytes: &[u8],
    image: impl FnOnce(NewImage) -> NewImage,
) -> ApiResult<ImageRecord> {
    let stored = state.images.save(recipe_id, bytes).await?;
    let new = image(NewImage::new(&stored.filename, &stored.content_type, stored.size));

    match state.db.images().add(recipe_id, &new).await {
        Ok(record) => Ok(record),
        Err(e) => {
            if let Err(cleanup) = state.images.delete(recipe_id, &stored.filename).await {
                warn!("Could not remove orphaned {}: {}", stored.filename, cleanup);
            }
            Err(e.into())
        }
    }
}

pub async fn upload(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<ImageRecord>)> {
    state.db.recipes().ensure_owned(&user.user_id, &id).await?;
    let record = store_image(&state, &id, &body, |image| {
        image.with_alt(params.alt.as_deref())
    })
    .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn set_hero(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((id, image_id)): Path<(String, String)>,
) -> ApiResult<Json<ImageRecord>> {
    state.db.recipes().ensure_owned(&user.user_id, &id).await?;
    Ok(Json(state.db.images().set_hero(&id, &image_id).await?))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((id, image_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    state.db.recipes().ensure_owned(&user.user_id, &id).await?;
    let record = state.db.images().remove(&id, &image_id).await?;
    state.images.delete(&id, &record.filename).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn download(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((id, image_id)): Path<(String, String)>,
    Query(params): Query<SizeParams>,
) -> ApiResult<Response> {
    let size: VariantSize = params.size.as_deref().unwrap_or("original").parse()?;
    state.db.recipes().ensure_owned(&user.user_id, &id).await?;

    let record = state.db.images().get(&image_id).await?;
    if record.recipe_id != id {
        return Err(TastebaseError::NotFound(format!("image {image_id}")).into());
    }

    let path = state.images.open_variant(&id, &record.filename, size).await?;
    let bytes = tokio::fs::read(&path).await?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(&record.filename)),
            (header::CACHE_CONTROL, "private, max-age=31536000, immutable"),
        ],
        bytes,
    )
        .into_response())
}

pub async fn storage_stats(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> ApiResult<Json<StorageStats>> {
    let images = state.images.clone();
    let stats = tokio::task::spawn_blocking(move || images.stats())
        .await
        .map_err(|e| TastebaseError::Io(std::io::Error::other(e)))??;
    Ok(Json(stats))
}
