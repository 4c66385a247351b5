use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use super::response::ErrorResponse;

/// Errors surfaced by the rules API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request body failed schema checks. Nothing reached the store.
    #[error("invalid request: {0}")]
    Validation(String),

    /// No rule has the requested id.
    #[error("Rule not found")]
    NotFound,

    /// The storage backend failed.
    ///
    /// Details are logged, never sent to the client.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match &self {
            ApiError::Validation(message) => ErrorResponse::bad_request(message.clone()),
            ApiError::NotFound => ErrorResponse::not_found(self.to_string()),
            ApiError::Store(e) => {
                error!(error = %e, "Storage operation failed");
                ErrorResponse::internal_error("Internal server error")
            }
        };

        (self.status(), Json(body)).into_response()
    }
}
