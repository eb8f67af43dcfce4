//! Error taxonomy for the HTTP surface.
//!
//! Every fatal failure is returned to the caller as a structured body with
//! a stable `kind` and a human-readable `message`. Per-attribute evaluation
//! problems (e.g. a string against a numeric rule) are not errors at all;
//! they are swallowed inside the pipeline as non-matches.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::store::StoreError;

// ---

#[derive(Debug, Error)]
pub enum ApiError {
    // ---
    #[error("{0}")]
    Validation(String),

    #[error("sensor identifier already registered: {0}")]
    DuplicateIdentifier(String),

    #[error("unknown sensor: {0}")]
    NotFound(String),

    #[error("invalid access token")]
    Unauthorized,

    #[error("sensor is inactive")]
    Forbidden,

    #[error("storage failure: {0}")]
    Storage(#[source] anyhow::Error),
}

impl ApiError {
    /// Stable machine-readable kind, part of the API contract.
    pub fn kind(&self) -> &'static str {
        // ---
        match self {
            Self::Validation(_) => "validation",
            Self::DuplicateIdentifier(_) => "duplicate_identifier",
            Self::NotFound(_) => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::Storage(_) => "storage",
        }
    }

    pub fn status(&self) -> StatusCode {
        // ---
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::DuplicateIdentifier(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        // ---
        match err {
            StoreError::DuplicateIdentifier(id) => Self::DuplicateIdentifier(id),
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Backend(e) => Self::Storage(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), "request failed: {self:#}");
        } else {
            tracing::debug!(kind = self.kind(), "request rejected: {self}");
        }

        let body = serde_json::json!({
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}
