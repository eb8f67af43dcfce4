//! Route gateway: each endpoint group lives in its own sibling module and
//! exports a subrouter; this module merges them over the shared state so
//! `main.rs` never sees individual endpoints.

use std::sync::Arc;

use axum::Router;

use crate::anomaly::ModelStore;
use crate::events::{BroadcastPublisher, EventPublisher};
use crate::pipeline::IngestService;
use crate::store::Storage;

mod health;
mod ingest;
mod live;
mod notifications;
mod readings;
mod sensors;
mod train;

// ---

/// Shared application state, constructed once at startup and cloned into
/// every handler. No hidden statics anywhere else.
#[derive(Clone)]
pub struct AppState {
    // ---
    pub store: Arc<dyn Storage>,
    pub service: Arc<IngestService>,
    pub publisher: Arc<BroadcastPublisher>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Storage>,
        models: Arc<ModelStore>,
        publisher: Arc<BroadcastPublisher>,
    ) -> Self {
        // ---
        let service = Arc::new(IngestService::new(
            store.clone(),
            models,
            publisher.clone() as Arc<dyn EventPublisher>,
        ));
        Self {
            store,
            service,
            publisher,
        }
    }
}

// ---

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(sensors::router())
        .merge(ingest::router())
        .merge(readings::router())
        .merge(notifications::router())
        .merge(train::router())
        .merge(live::router())
        .merge(health::router())
        .with_state(state)
}
