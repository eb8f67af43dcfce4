//! Domain models for the GridPulse telemetry pipeline.
//!
//! Attribute payloads are dynamically shaped on the wire (numbers, booleans
//! or strings per attribute), so they are modeled as a tagged value union
//! with explicit coercion rules instead of raw JSON values.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---

/// A single attribute value as submitted by a sensor.
///
/// Deserialized untagged: JSON numbers become `Number`, JSON booleans
/// `Bool`, everything else arrives as `Text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    // ---
    Number(f64),
    Bool(bool),
    Text(String),
}

impl AttributeValue {
    /// Coerce to a float for threshold comparisons.
    ///
    /// Booleans coerce to 1.0/0.0 and numeric strings are parsed; anything
    /// else is not coercible and yields `None`. Callers treat `None` as a
    /// non-match, never as an error.
    pub fn as_f64(&self) -> Option<f64> {
        // ---
        match self {
            Self::Number(n) => Some(*n),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Attribute map as carried by readings and events. `BTreeMap` keeps the
/// serialized order stable.
pub type Attributes = BTreeMap<String, AttributeValue>;

// ---

/// Threshold condition attached to a notification rule, discriminated by
/// `kind` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleCondition {
    // ---
    Range { min: f64, max: f64 },
    GreaterThan { value: f64 },
    LessThan { value: f64 },
    EqualTo { value: AttributeValue },
    None,
}

impl RuleCondition {
    /// Wire name of the rule kind, as stored on notification records.
    pub fn kind(&self) -> &'static str {
        // ---
        match self {
            Self::Range { .. } => "range",
            Self::GreaterThan { .. } => "greater_than",
            Self::LessThan { .. } => "less_than",
            Self::EqualTo { .. } => "equal_to",
            Self::None => "none",
        }
    }

    /// Human-readable threshold description for alert records.
    pub fn threshold(&self) -> String {
        // ---
        match self {
            Self::Range { min, max } => format!("{min} to {max}"),
            Self::GreaterThan { value } | Self::LessThan { value } => value.to_string(),
            Self::EqualTo { value } => value.to_string(),
            Self::None => String::new(),
        }
    }
}

/// One alerting rule on one attribute of a sensor's schema.
///
/// Multiple rules may be attached to the same attribute; each is evaluated
/// independently. A `none` condition never fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRule {
    // ---
    #[serde(flatten)]
    pub condition: RuleCondition,
    pub alarm_type: String,
    pub message: String,
}

/// One monitored attribute in a sensor's schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSpec {
    // ---
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default)]
    pub rules: Vec<NotificationRule>,
}

// ---

/// A registered sensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sensor {
    // ---
    pub identifier: String,
    pub name: String,
    pub active: bool,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub attributes_metadata: Vec<AttributeSpec>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration payload for `POST /sensors`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSensor {
    // ---
    pub identifier: String,
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
    pub access_token: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attributes_metadata: Vec<AttributeSpec>,
}

fn default_active() -> bool {
    true
}

/// Partial update for `PUT /sensors/{identifier}`. Absent fields are left
/// unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SensorPatch {
    // ---
    pub name: Option<String>,
    pub active: Option<bool>,
    pub access_token: Option<String>,
    pub description: Option<String>,
    pub attributes_metadata: Option<Vec<AttributeSpec>>,
}

// ---

/// A persisted reading. Immutable once stored; `id` and `timestamp` are
/// assigned by the server at ingest time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    // ---
    pub id: Uuid,
    pub sensor_id: String,
    pub attributes: Attributes,
    pub timestamp: DateTime<Utc>,
}

/// Append-only alert record, written once per rule match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    // ---
    pub id: Uuid,
    pub sensor_id: String,
    pub attribute: String,
    pub value: AttributeValue,
    pub condition: String,
    pub threshold: String,
    pub alarm_type: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Inbound body for `POST /data`. The access token travels out-of-band in
/// the `Authorization` header.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestPayload {
    // ---
    pub identifier: String,
    pub attributes: Attributes,
}

/// Success response for an accepted reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReceipt {
    // ---
    pub reading_id: Uuid,
    pub timestamp: DateTime<Utc>,
}
