//! Per-reading ingestion pipeline: authorize, persist, evaluate, publish.
//!
//! One [`IngestService`] is constructed at startup and shared by all
//! handlers; it owns no hidden state beyond the collaborators it is given.
//! Authorization and storage failures are fatal to a call. Rule and anomaly
//! evaluation are best-effort per attribute: a malformed value or a failed
//! notification write is logged and the rest of the reading still goes
//! through.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::anomaly::ModelStore;
use crate::error::ApiError;
use crate::events::{Event, EventPublisher};
use crate::models::{Attributes, IngestPayload, IngestReceipt, Notification, Sensor};
use crate::rules;
use crate::store::Storage;

// ---

pub struct IngestService {
    // ---
    store: Arc<dyn Storage>,
    models: Arc<ModelStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl IngestService {
    pub fn new(
        store: Arc<dyn Storage>,
        models: Arc<ModelStore>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        // ---
        Self {
            store,
            models,
            publisher,
        }
    }

    /// Process one inbound reading end to end.
    ///
    /// Authorization checks run in a fixed order: sensor existence, then
    /// active flag, then token. The reading is persisted with a server
    /// timestamp before any evaluation; on storage failure nothing is
    /// emitted. On success exactly one `new_reading` event is published,
    /// plus one `alert` event per rule match and at most one `anomaly`
    /// event carrying every flagged attribute.
    pub async fn ingest(
        &self,
        payload: IngestPayload,
        token: &str,
    ) -> Result<IngestReceipt, ApiError> {
        // ---
        let sensor = self.authorize(&payload.identifier, token).await?;

        let timestamp = Utc::now();
        let reading_id = self
            .store
            .insert_reading(&sensor.identifier, &payload.attributes, timestamp)
            .await?;

        tracing::debug!(
            sensor = %sensor.identifier,
            %reading_id,
            attributes = payload.attributes.len(),
            "reading persisted"
        );

        self.rule_pass(&sensor, &payload.attributes).await;
        self.anomaly_pass(&sensor.identifier, &payload.attributes);

        self.publisher.emit(Event::NewReading {
            identifier: sensor.identifier,
            attributes: payload.attributes,
            timestamp,
        });

        Ok(IngestReceipt {
            reading_id,
            timestamp,
        })
    }

    /// Existence before active-state before token; the order is part of the
    /// API contract.
    async fn authorize(&self, identifier: &str, token: &str) -> Result<Sensor, ApiError> {
        // ---
        let sensor = self
            .store
            .get_sensor(identifier)
            .await?
            .ok_or_else(|| ApiError::NotFound(identifier.to_string()))?;

        if !sensor.active {
            return Err(ApiError::Forbidden);
        }
        if sensor.access_token.as_bytes() != token.as_bytes() {
            return Err(ApiError::Unauthorized);
        }

        Ok(sensor)
    }

    /// Evaluate every rule attached to every submitted attribute. Each match
    /// writes one notification record and publishes one `alert` event. A
    /// failed notification write never aborts the reading.
    async fn rule_pass(&self, sensor: &Sensor, attributes: &Attributes) {
        // ---
        for spec in &sensor.attributes_metadata {
            let Some(value) = attributes.get(&spec.name) else {
                continue;
            };

            for rule in &spec.rules {
                if !rules::evaluate(&rule.condition, value) {
                    continue;
                }

                let notification = Notification {
                    id: Uuid::new_v4(),
                    sensor_id: sensor.identifier.clone(),
                    attribute: spec.name.clone(),
                    value: value.clone(),
                    condition: rule.condition.kind().to_string(),
                    threshold: rule.condition.threshold(),
                    alarm_type: rule.alarm_type.clone(),
                    message: rule.message.clone(),
                    timestamp: Utc::now(),
                };

                tracing::info!(
                    sensor = %sensor.identifier,
                    attribute = %spec.name,
                    condition = notification.condition,
                    alarm_type = %notification.alarm_type,
                    "alert rule matched"
                );

                if let Err(e) = self.store.insert_notification(&notification).await {
                    tracing::warn!(
                        sensor = %sensor.identifier,
                        attribute = %spec.name,
                        "failed to persist notification: {e:#}"
                    );
                }

                self.publisher.emit(Event::Alert {
                    sensor_id: notification.sensor_id,
                    attribute: notification.attribute,
                    value: notification.value,
                    condition: notification.condition,
                    threshold: notification.threshold,
                    alarm_type: notification.alarm_type,
                    message: notification.message,
                    timestamp: notification.timestamp,
                });
            }
        }
    }

    /// Score every submitted attribute against the current model snapshot
    /// and publish one `anomaly` event if anything was flagged.
    fn anomaly_pass(&self, identifier: &str, attributes: &Attributes) {
        // ---
        let anomalies: Attributes = attributes
            .iter()
            .filter(|(name, value)| self.models.score(name, value))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        if anomalies.is_empty() {
            return;
        }

        tracing::info!(
            sensor = %identifier,
            flagged = anomalies.len(),
            "anomalous attributes detected"
        );

        self.publisher.emit(Event::Anomaly {
            identifier: identifier.to_string(),
            anomalies,
        });
    }

    /// Refit the anomaly model set from the full reading history plus every
    /// schema-declared attribute (so cold-start attributes get a model too).
    /// Returns the number of fitted models.
    pub async fn retrain_models(&self) -> Result<usize, ApiError> {
        // ---
        let sensors = self.store.list_sensors().await?;
        let known = sensors
            .into_iter()
            .flat_map(|s| s.attributes_metadata.into_iter().map(|a| a.name));

        let history = self.store.all_readings().await?;
        Ok(self.models.retrain(known, &history))
    }
}
