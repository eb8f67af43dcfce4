//! Alert history endpoint, newest first.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::error::ApiError;

use super::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/notifications/{identifier}", get(handler))
}

/// `GET /notifications/{identifier}` — persisted alert records for one
/// sensor.
async fn handler(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let notifications = state.store.get_notifications(&identifier).await?;
    Ok(Json(notifications))
}
