//! Inbound Data Connector event model.
//!
//! The platform delivers one event per webhook call as a JSON envelope:
//!
//! ```json
//! {
//!   "event": {
//!     "eventId": "...",
//!     "eventType": "temperature",
//!     "targetName": "projects/<project>/devices/<device>",
//!     "timestamp": "2024-05-02T09:00:00Z",
//!     "data": { "temperature": { "value": 21.5, "updateTime": "..." } }
//!   },
//!   "labels": { "name": "kitchen sensor" }
//! }
//! ```
//!
//! [`VerifiedPayload::parse`] is the only constructor — callers hand it a
//! body that has already passed signature verification.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
struct Envelope {
    event: RawEvent,
    #[serde(default)]
    labels: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    event_type: String,
    target_name: String,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    data: EventData,
}

#[derive(Debug, Default, Deserialize)]
struct EventData {
    #[serde(default)]
    temperature: Option<TemperatureReading>,
    #[serde(default)]
    added: Option<HashMap<String, String>>,
    #[serde(default)]
    modified: Option<HashMap<String, String>>,
    #[serde(default)]
    removed: Option<Vec<String>>,
}

/// One temperature sample as reported by the sensor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureReading {
    pub value: f64,
    pub update_time: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Verified payload
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The closed set of event kinds the service can receive.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Temperature(TemperatureReading),
    LabelsChanged {
        added: HashMap<String, String>,
        modified: HashMap<String, String>,
        removed: Vec<String>,
    },
    /// An event type outside the recognized set, kept by name so the
    /// transformer can report what it refused.
    Unrecognized(String),
}

/// Structured event data, produced only from a signature-verified body.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedPayload {
    pub project_id: String,
    pub device_id: String,
    pub kind: EventKind,
    /// Labels currently set on the source device.
    pub labels: HashMap<String, String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl VerifiedPayload {
    /// Parse a verified raw body into a structured payload.
    ///
    /// Any structural mismatch — invalid JSON, a resource name that is not
    /// `projects/<p>/devices/<d>`, or a recognized event type missing its
    /// data block — is a [`Error::MalformedPayload`].
    pub fn parse(body: &[u8]) -> Result<Self> {
        let envelope: Envelope = serde_json::from_slice(body)
            .map_err(|e| Error::MalformedPayload(format!("invalid event JSON: {e}")))?;

        let (project_id, device_id) = parse_target_name(&envelope.event.target_name)?;

        let kind = match envelope.event.event_type.as_str() {
            "temperature" => {
                let reading = envelope.event.data.temperature.ok_or_else(|| {
                    Error::MalformedPayload("temperature event without temperature data".into())
                })?;
                EventKind::Temperature(reading)
            }
            "labelsChanged" => EventKind::LabelsChanged {
                added: envelope.event.data.added.unwrap_or_default(),
                modified: envelope.event.data.modified.unwrap_or_default(),
                removed: envelope.event.data.removed.unwrap_or_default(),
            },
            other => EventKind::Unrecognized(other.to_owned()),
        };

        Ok(Self {
            project_id,
            device_id,
            kind,
            labels: envelope.labels,
            timestamp: envelope.event.timestamp,
        })
    }
}

/// Split a `projects/<project>/devices/<device>` resource name.
fn parse_target_name(target: &str) -> Result<(String, String)> {
    match target.split('/').collect::<Vec<_>>().as_slice() {
        ["projects", project, "devices", device]
            if !project.is_empty() && !device.is_empty() =>
        {
            Ok(((*project).to_owned(), (*device).to_owned()))
        }
        _ => Err(Error::MalformedPayload(format!(
            "unexpected resource name '{target}'"
        ))),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
