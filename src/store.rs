//! Persistence contract and its PostgreSQL implementation.
//!
//! The pipeline and routes only ever see the [`Storage`] trait, which keeps
//! the read/write surface narrow and lets tests run against an in-memory
//! implementation. Production uses [`PgStore`] over a sqlx pool; attribute
//! maps and sensor schemas are stored as JSONB.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Attributes, NewSensor, Notification, Reading, Sensor, SensorPatch,
};

// ---

#[derive(Debug, Error)]
pub enum StoreError {
    // ---
    #[error("sensor identifier already registered: {0}")]
    DuplicateIdentifier(String),

    #[error("unknown sensor: {0}")]
    NotFound(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Backend(err.into())
    }
}

/// Inclusive time-range filter for reading queries.
pub type TimeRange = (DateTime<Utc>, DateTime<Utc>);

// ---

/// Narrow persistence contract the core depends on.
#[async_trait]
pub trait Storage: Send + Sync {
    // ---
    /// Durable insert; fails with `DuplicateIdentifier` on a key conflict.
    async fn insert_sensor(&self, sensor: NewSensor) -> Result<Sensor, StoreError>;

    async fn get_sensor(&self, identifier: &str) -> Result<Option<Sensor>, StoreError>;

    async fn list_sensors(&self) -> Result<Vec<Sensor>, StoreError>;

    /// Replace mutable fields; fails with `NotFound` if absent.
    async fn update_sensor(
        &self,
        identifier: &str,
        patch: SensorPatch,
    ) -> Result<Sensor, StoreError>;

    /// Append one reading row; returns the server-assigned id.
    async fn insert_reading(
        &self,
        sensor_id: &str,
        attributes: &Attributes,
        timestamp: DateTime<Utc>,
    ) -> Result<Uuid, StoreError>;

    /// Readings for one sensor, newest first, optionally range-filtered.
    async fn get_readings(
        &self,
        sensor_id: &str,
        range: Option<TimeRange>,
    ) -> Result<Vec<Reading>, StoreError>;

    /// Full reading history across all sensors, for model training.
    async fn all_readings(&self) -> Result<Vec<Reading>, StoreError>;

    async fn insert_notification(&self, notification: &Notification) -> Result<(), StoreError>;

    /// Alert history for one sensor, newest first.
    async fn get_notifications(&self, sensor_id: &str) -> Result<Vec<Notification>, StoreError>;
}

// ---

/// PostgreSQL-backed [`Storage`].
pub struct PgStore {
    // ---
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn sensor_from_row(row: &sqlx::postgres::PgRow) -> Result<Sensor, sqlx::Error> {
    // ---
    let Json(attributes_metadata) = row.try_get("attributes_metadata")?;
    Ok(Sensor {
        identifier: row.try_get("identifier")?,
        name: row.try_get("name")?,
        active: row.try_get("active")?,
        access_token: row.try_get("access_token")?,
        description: row.try_get("description")?,
        attributes_metadata,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn reading_from_row(row: &sqlx::postgres::PgRow) -> Result<Reading, sqlx::Error> {
    // ---
    let Json(attributes) = row.try_get("attributes")?;
    Ok(Reading {
        id: row.try_get("id")?,
        sensor_id: row.try_get("sensor_id")?,
        attributes,
        timestamp: row.try_get("timestamp")?,
    })
}

fn notification_from_row(row: &sqlx::postgres::PgRow) -> Result<Notification, sqlx::Error> {
    // ---
    let Json(value) = row.try_get("value")?;
    Ok(Notification {
        id: row.try_get("id")?,
        sensor_id: row.try_get("sensor_id")?,
        attribute: row.try_get("attribute")?,
        value,
        condition: row.try_get("condition")?,
        threshold: row.try_get("threshold")?,
        alarm_type: row.try_get("alarm_type")?,
        message: row.try_get("message")?,
        timestamp: row.try_get("timestamp")?,
    })
}

#[async_trait]
impl Storage for PgStore {
    // ---
    async fn insert_sensor(&self, sensor: NewSensor) -> Result<Sensor, StoreError> {
        // ---
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO sensors (
                identifier, name, active, access_token, description,
                attributes_metadata, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            "#,
        )
        .bind(&sensor.identifier)
        .bind(&sensor.name)
        .bind(sensor.active)
        .bind(&sensor.access_token)
        .bind(&sensor.description)
        .bind(Json(&sensor.attributes_metadata))
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(Sensor {
                identifier: sensor.identifier,
                name: sensor.name,
                active: sensor.active,
                access_token: sensor.access_token,
                description: sensor.description,
                attributes_metadata: sensor.attributes_metadata,
                created_at: now,
                updated_at: now,
            }),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::DuplicateIdentifier(sensor.identifier))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_sensor(&self, identifier: &str) -> Result<Option<Sensor>, StoreError> {
        // ---
        let row = sqlx::query("SELECT * FROM sensors WHERE identifier = $1")
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(sensor_from_row).transpose().map_err(Into::into)
    }

    async fn list_sensors(&self) -> Result<Vec<Sensor>, StoreError> {
        // ---
        let rows = sqlx::query("SELECT * FROM sensors ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(sensor_from_row)
            .collect::<Result<_, _>>()
            .map_err(Into::into)
    }

    async fn update_sensor(
        &self,
        identifier: &str,
        patch: SensorPatch,
    ) -> Result<Sensor, StoreError> {
        // ---
        // Row-level lock serializes concurrent updates to the same sensor.
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM sensors WHERE identifier = $1 FOR UPDATE")
            .bind(identifier)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(identifier.to_string()))?;

        let mut sensor = sensor_from_row(&row).map_err(StoreError::from)?;
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

        sqlx::query(
            r#"
            UPDATE sensors
            SET name = $2, active = $3, access_token = $4, description = $5,
                attributes_metadata = $6, updated_at = $7
            WHERE identifier = $1
            "#,
        )
        .bind(identifier)
        .bind(&sensor.name)
        .bind(sensor.active)
        .bind(&sensor.access_token)
        .bind(&sensor.description)
        .bind(Json(&sensor.attributes_metadata))
        .bind(sensor.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(sensor)
    }

    async fn insert_reading(
        &self,
        sensor_id: &str,
        attributes: &Attributes,
        timestamp: DateTime<Utc>,
    ) -> Result<Uuid, StoreError> {
        // ---
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO readings (id, sensor_id, attributes, timestamp)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(id)
        .bind(sensor_id)
        .bind(Json(attributes))
        .bind(timestamp)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn get_readings(
        &self,
        sensor_id: &str,
        range: Option<TimeRange>,
    ) -> Result<Vec<Reading>, StoreError> {
        // ---
        let rows = match range {
            Some((start, end)) => {
                sqlx::query(
                    r#"
                    SELECT * FROM readings
                    WHERE sensor_id = $1 AND timestamp >= $2 AND timestamp <= $3
                    ORDER BY timestamp DESC
                    "#,
                )
                .bind(sensor_id)
                .bind(start)
                .bind(end)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT * FROM readings WHERE sensor_id = $1 ORDER BY timestamp DESC",
                )
                .bind(sensor_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter()
            .map(reading_from_row)
            .collect::<Result<_, _>>()
            .map_err(Into::into)
    }

    async fn all_readings(&self) -> Result<Vec<Reading>, StoreError> {
        // ---
        let rows = sqlx::query("SELECT * FROM readings ORDER BY timestamp")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(reading_from_row)
            .collect::<Result<_, _>>()
            .map_err(Into::into)
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<(), StoreError> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, sensor_id, attribute, value, condition, threshold,
                alarm_type, message, timestamp
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(notification.id)
        .bind(&notification.sensor_id)
        .bind(&notification.attribute)
        .bind(Json(&notification.value))
        .bind(&notification.condition)
        .bind(&notification.threshold)
        .bind(&notification.alarm_type)
        .bind(&notification.message)
        .bind(notification.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_notifications(&self, sensor_id: &str) -> Result<Vec<Notification>, StoreError> {
        // ---
        let rows = sqlx::query(
            "SELECT * FROM notifications WHERE sensor_id = $1 ORDER BY timestamp DESC",
        )
        .bind(sensor_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(notification_from_row)
            .collect::<Result<_, _>>()
            .map_err(Into::into)
    }
}
