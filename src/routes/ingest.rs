//! The ingestion endpoint: `POST /data`.
//!
//! The access token arrives out-of-band in the `Authorization` header
//! (with or without a `Bearer ` prefix) and is compared byte-for-byte
//! against the sensor's stored token inside the pipeline.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use tracing::debug;

use crate::error::ApiError;
use crate::models::IngestPayload;

use super::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/data", post(handler))
}

/// `POST /data` — run one reading through the full pipeline.
async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<IngestPayload>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let token = bearer_token(&headers)?;

    debug!(
        identifier = %payload.identifier,
        attributes = payload.attributes.len(),
        "POST /data - reading received"
    );

    let receipt = state.service.ingest(payload, token).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// A missing or unreadable header is rejected as unauthorized before any
/// sensor lookup happens.
fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    // ---
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    Ok(value.strip_prefix("Bearer ").unwrap_or(value).trim())
}
