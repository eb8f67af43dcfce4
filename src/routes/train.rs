//! Explicit anomaly-model retraining endpoint.
//!
//! Retraining is on-demand rather than per-reading: fitting cost is paid
//! here so the ingestion path stays cheap, at the price of model staleness
//! between calls.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use tracing::info;

use crate::error::ApiError;

use super::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/train", post(handler))
}

#[derive(Serialize)]
struct TrainResponse {
    /// Number of attribute models fitted.
    attributes: usize,
}

/// `POST /train` — refit the whole model set from the full reading history
/// and install it atomically.
async fn handler(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    // ---
    let attributes = state.service.retrain_models().await?;
    info!(attributes, "anomaly models retrained on demand");

    Ok(Json(TrainResponse { attributes }))
}
