//! Reading history endpoint, newest first with an optional time range.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::ApiError;
use crate::store::TimeRange;

use super::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/readings/{identifier}", get(handler))
}

/// RFC3339 time-range filter; either bound may be omitted.
#[derive(Debug, Deserialize)]
struct ReadingsQuery {
    // ---
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl ReadingsQuery {
    fn range(&self) -> Option<TimeRange> {
        // ---
        if self.start.is_none() && self.end.is_none() {
            return None;
        }
        Some((
            self.start.unwrap_or(DateTime::<Utc>::MIN_UTC),
            self.end.unwrap_or(DateTime::<Utc>::MAX_UTC),
        ))
    }
}

/// `GET /readings/{identifier}` — persisted readings for one sensor.
async fn handler(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Query(params): Query<ReadingsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let readings = state.store.get_readings(&identifier, params.range()).await?;
    Ok(Json(readings))
}
