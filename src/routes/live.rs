//! Live event stream: `GET /live` upgrades to a WebSocket and forwards
//! every published event as one JSON text frame.
//!
//! Delivery is at-most-once: a subscriber that falls behind the broadcast
//! buffer skips the missed events and keeps receiving, and a disconnect
//! never affects the ingestion path.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::events::Event;

use super::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/live", get(handler))
}

async fn handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    // ---
    let rx = state.publisher.subscribe();
    ws.on_upgrade(move |socket| stream_events(socket, rx))
}

async fn stream_events(mut socket: WebSocket, mut rx: tokio::sync::broadcast::Receiver<Event>) {
    // ---
    debug!("live subscriber connected");

    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "live subscriber lagged, events dropped");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        let frame = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                warn!("failed to serialize {} event: {e}", event.name());
                continue;
            }
        };

        // A failed send means the subscriber went away.
        if socket.send(Message::Text(frame.into())).await.is_err() {
            break;
        }
    }

    debug!("live subscriber disconnected");
}
