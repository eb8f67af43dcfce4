//! Sensor registration, listing and update endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};
use tracing::info;

use crate::error::ApiError;
use crate::models::{NewSensor, SensorPatch};

use super::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/sensors", get(list).post(register))
        .route("/sensors/{identifier}", put(update))
}

/// `POST /sensors` — register a new sensor. 409 on a duplicate identifier.
async fn register(
    State(state): State<AppState>,
    Json(sensor): Json<NewSensor>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    validate(&sensor)?;

    let stored = state.store.insert_sensor(sensor).await?;
    info!(identifier = %stored.identifier, "sensor registered");

    Ok((StatusCode::CREATED, Json(stored)))
}

/// `GET /sensors` — list every registered sensor.
async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    // ---
    let sensors = state.store.list_sensors().await?;
    Ok(Json(sensors))
}

/// `PUT /sensors/{identifier}` — replace mutable fields. 404 if absent.
async fn update(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Json(patch): Json<SensorPatch>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let sensor = state.store.update_sensor(&identifier, patch).await?;
    info!(identifier = %sensor.identifier, "sensor updated");

    Ok(Json(sensor))
}

fn validate(sensor: &NewSensor) -> Result<(), ApiError> {
    // ---
    let missing = [
        ("identifier", sensor.identifier.trim().is_empty()),
        ("name", sensor.name.trim().is_empty()),
        ("access_token", sensor.access_token.trim().is_empty()),
    ]
    .into_iter()
    .filter_map(|(field, empty)| empty.then_some(field))
    .collect::<Vec<_>>();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "missing required fields: {}",
            missing.join(", ")
        )))
    }
}
