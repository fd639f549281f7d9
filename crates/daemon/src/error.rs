//! API error handling and response types.
//!
//! Adapted from the teacher's `error.rs`: an `ApiError` wrapping the core
//! error type plus request-shaped variants, rendered to a JSON body via
//! `IntoResponse`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cross_seed_core::error::CrossSeedError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("core error: {0}")]
    Core(#[from] CrossSeedError),

    #[error("bad request: {message}")]
    BadRequest { message: String },
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Core(CrossSeedError::ConfigurationError { message }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, message.clone())
            }
            ApiError::Core(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
            ApiError::BadRequest { message } => (StatusCode::BAD_REQUEST, message.clone()),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
