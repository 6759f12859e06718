use crate::error::TastebaseError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::error;
use serde_json::json;

/// Handler error: a `TastebaseError` rendered as `{ "error": "..." }`
#[derive(Debug)]
pub struct ApiError(pub TastebaseError);

impl<E> From<E> for ApiError
where
    E: Into<TastebaseError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            TastebaseError::NotFound(_) => StatusCode::NOT_FOUND,
            TastebaseError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            TastebaseError::InvalidInput(_)
            | TastebaseError::InvalidRecipe(_)
            | TastebaseError::NotARecipe(_)
            | TastebaseError::NoRecipeFound(_)
            | TastebaseError::Url(_)
            | TastebaseError::Json(_) => StatusCode::BAD_REQUEST,
            TastebaseError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            TastebaseError::UnsupportedImage(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            TastebaseError::Fetch(_) | TastebaseError::Provider(_) | TastebaseError::Http(_) => {
                StatusCode::BAD_GATEWAY
            }
            TastebaseError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self.0);
            "internal server error".to_string()
        } else {
            self.0.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
