//! Database schema management for the GridPulse backend.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs`.

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create the database schema if it does not exist (idempotent).
///
/// Sensor schemas and reading attribute maps are stored as JSONB so the
/// monitored attribute set can evolve without migrations. Safe to call on
/// every startup.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensors (
            identifier          TEXT        PRIMARY KEY,
            name                TEXT        NOT NULL,
            active              BOOLEAN     NOT NULL,
            access_token        TEXT        NOT NULL,
            description         TEXT,
            attributes_metadata JSONB       NOT NULL DEFAULT '[]',
            created_at          TIMESTAMPTZ NOT NULL,
            updated_at          TIMESTAMPTZ NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS readings (
            id         UUID        PRIMARY KEY,
            sensor_id  TEXT        NOT NULL,
            attributes JSONB       NOT NULL,
            timestamp  TIMESTAMPTZ NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Append-only alert audit trail
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            id         UUID        PRIMARY KEY,
            sensor_id  TEXT        NOT NULL,
            attribute  TEXT        NOT NULL,
            value      JSONB       NOT NULL,
            condition  TEXT        NOT NULL,
            threshold  TEXT        NOT NULL,
            alarm_type TEXT        NOT NULL,
            message    TEXT        NOT NULL,
            timestamp  TIMESTAMPTZ NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_readings_sensor_id_timestamp
            ON readings (sensor_id, timestamp DESC);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_notifications_sensor_id_timestamp
            ON notifications (sensor_id, timestamp DESC);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
