//! Derives the outbound label mutation from a verified event.
//!
//! Pure and deterministic — the same payload always yields the same
//! mutation, and nothing here touches the network.

use crate::error::{Error, Result};
use crate::event::{EventKind, VerifiedPayload};

/// Label key written for temperature events.
pub const TEMPERATURE_LABEL: &str = "temperature";

/// The derived API call: set one label on one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMutation {
    pub project_id: String,
    pub device_id: String,
    pub label_key: String,
    pub label_value: String,
}

/// Map a verified payload to the mutation to apply.
///
/// Only temperature events are in scope. `labelsChanged` deliveries are a
/// side effect of operators editing labels in the platform console and are
/// acknowledged without action; everything else is refused by name.
pub fn transform(payload: &VerifiedPayload) -> Result<OutboundMutation> {
    match &payload.kind {
        EventKind::Temperature(reading) => Ok(OutboundMutation {
            project_id: payload.project_id.clone(),
            device_id: payload.device_id.clone(),
            label_key: TEMPERATURE_LABEL.to_owned(),
            label_value: format_value(reading.value),
        }),
        EventKind::LabelsChanged { .. } => {
            Err(Error::UnsupportedEvent("labelsChanged".into()))
        }
        EventKind::Unrecognized(kind) => Err(Error::UnsupportedEvent(kind.clone())),
    }
}

/// Render a reading the way it should appear in the label value.
/// `21.5` → `"21.5"`, `21.0` → `"21"`.
fn format_value(value: f64) -> String {
    format!("{value}")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
