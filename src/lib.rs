//! GridPulse: telemetry ingestion and evaluation backend.
//!
//! Readings submitted by registered sensors are authorized against the
//! sensor directory, persisted, checked against per-attribute notification
//! rules and the current anomaly model set, and fanned out to live
//! subscribers. The binary in `main.rs` wires the PostgreSQL store and the
//! broadcast publisher into [`routes::AppState`]; tests wire in their own
//! implementations of the same seams.

pub mod anomaly;
pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod rules;
pub mod schema;
pub mod store;

pub use config::Config;
pub use routes::AppState;
