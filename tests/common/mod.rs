//! Shared harness for the HTTP integration tests: an in-memory `Storage`
//! implementation and a helper that serves the full router on an ephemeral
//! port.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use gridpulse::anomaly::ModelStore;
use gridpulse::events::BroadcastPublisher;
use gridpulse::models::{
    Attributes, NewSensor, Notification, Reading, Sensor, SensorPatch,
};
use gridpulse::store::{Storage, StoreError, TimeRange};
use gridpulse::{routes, AppState};

// ---

/// In-memory stand-in for the PostgreSQL store.
#[derive(Default)]
pub struct MemStore {
    // ---
    sensors: Mutex<HashMap<String, Sensor>>,
    readings: Mutex<Vec<Reading>>,
    notifications: Mutex<Vec<Notification>>,
}

#[async_trait]
impl Storage for MemStore {
    // ---
    async fn insert_sensor(&self, sensor: NewSensor) -> Result<Sensor, StoreError> {
        let mut sensors = self.sensors.lock().unwrap();
        if sensors.contains_key(&sensor.identifier) {
            return Err(StoreError::DuplicateIdentifier(sensor.identifier));
        }
        let now = Utc::now();
        let stored = Sensor {
            identifier: sensor.identifier.clone(),
            name: sensor.name,
            active: sensor.active,
            access_token: sensor.access_token,
            description: sensor.description,
            attributes_metadata: sensor.attributes_metadata,
            created_at: now,
            updated_at: now,
        };
        sensors.insert(sensor.identifier, stored.clone());
        Ok(stored)
    }

    async fn get_sensor(&self, identifier: &str) -> Result<Option<Sensor>, StoreError> {
        Ok(self.sensors.lock().unwrap().get(identifier).cloned())
    }

    async fn list_sensors(&self) -> Result<Vec<Sensor>, StoreError> {
        Ok(self.sensors.lock().unwrap().values().cloned().collect())
    }

    async fn update_sensor(
        &self,
        identifier: &str,
        patch: SensorPatch,
    ) -> Result<Sensor, StoreError> {
        let mut sensors = self.sensors.lock().unwrap();
        let sensor = sensors
            .get_mut(identifier)
            .ok_or_else(|| StoreError::NotFound(identifier.to_string()))?;
        if let Some(name) = patch.name {
            sensor.name = name;
        }
        if let Some(active) = patch.active {
            sensor.active = active;
        }
        if let Some(token) = patch.access_token {
            sensor.access_token = token;
        }
        if let Some(description) = patch.description {
            sensor.description = Some(description);
        }
        if let Some(schema) = patch.attributes_metadata {
            sensor.attributes_metadata = schema;
        }
        sensor.updated_at = Utc::now();
        Ok(sensor.clone())
    }

    async fn insert_reading(
        &self,
        sensor_id: &str,
        attributes: &Attributes,
        timestamp: DateTime<Utc>,
    ) -> Result<Uuid, StoreError> {
        let reading = Reading {
            id: Uuid::new_v4(),
            sensor_id: sensor_id.to_string(),
            attributes: attributes.clone(),
            timestamp,
        };
        let id = reading.id;
        self.readings.lock().unwrap().push(reading);
        Ok(id)
    }

    async fn get_readings(
        &self,
        sensor_id: &str,
        range: Option<TimeRange>,
    ) -> Result<Vec<Reading>, StoreError> {
        let mut readings: Vec<Reading> = self
            .readings
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.sensor_id == sensor_id)
            .filter(|r| match range {
                Some((start, end)) => r.timestamp >= start && r.timestamp <= end,
                None => true,
            })
            .cloned()
            .collect();
        readings.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(readings)
    }

    async fn all_readings(&self) -> Result<Vec<Reading>, StoreError> {
        Ok(self.readings.lock().unwrap().clone())
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<(), StoreError> {
        self.notifications
            .lock()
            .unwrap()
            .push(notification.clone());
        Ok(())
    }

    async fn get_notifications(&self, sensor_id: &str) -> Result<Vec<Notification>, StoreError> {
        let mut notifications: Vec<Notification> = self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.sensor_id == sensor_id)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(notifications)
    }
}

// ---

/// Serve the full router over an in-memory store on an ephemeral port and
/// return the base URL.
pub async fn spawn_server() -> String {
    // ---
    let state = AppState::new(
        Arc::new(MemStore::default()),
        Arc::new(ModelStore::new(0.1)),
        Arc::new(BroadcastPublisher::new(64)),
    );
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server task");
    });

    format!("http://{addr}")
}
