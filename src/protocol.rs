//! Event messages exchanged with viewers over the WebSocket.
//!
//! Every frame is a JSON text message of the form
//! `{"event": "<name>", "data": <payload>}`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::bridge::PackerReport;
use crate::model::{Container, DimensionsPatch, GenerationDraft, PackBox};
use crate::store::PackingState;

/// Inbound event from a viewer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Explicit request for a fresh full snapshot.
    Connect,
    AddBox(AddBoxRequest),
    UpdateGeneration(GenerationDraft),
    RemainingVolume(RemainingVolumeRequest),
    RunPackingAlgorithm(DimensionsPatch),
    UpdateContainerDimensions(DimensionsPatch),
}

impl ClientEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Connect => "connect",
            ClientEvent::AddBox(_) => "add_box",
            ClientEvent::UpdateGeneration(_) => "update_generation",
            ClientEvent::RemainingVolume(_) => "remaining_volume",
            ClientEvent::RunPackingAlgorithm(_) => "run_packing_algorithm",
            ClientEvent::UpdateContainerDimensions(_) => "update_container_dimensions",
        }
    }
}

/// Box to add, optionally with a new container list replacing the stored one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddBoxRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub containers: Option<Vec<Container>>,
    #[serde(flatten)]
    pub item: PackBox,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemainingVolumeRequest {
    pub container_id: Value,
    pub total_remaining_volume: Value,
}

/// Outbound event to one or all viewers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full state snapshot.
    UpdateData(PackingState),
    AlgorithmStarted { status: String },
    PackingAlgorithmResult(PackerReport),
    /// Rejection of a single inbound frame, sent to its sender only.
    Error { event: String, message: String },
}

impl ServerEvent {
    pub fn rejection(event: impl Into<String>, message: impl ToString) -> Self {
        ServerEvent::Error {
            event: event.into(),
            message: message.to_string(),
        }
    }
}

/// Why an inbound frame could not be turned into a [`ClientEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("frame is not valid JSON: {0}")]
    Malformed(String),
    #[error("frame has no event name")]
    MissingEvent,
    #[error("unknown event '{0}'")]
    UnknownEvent(String),
    #[error("invalid payload for '{event}': {reason}")]
    InvalidPayload { event: String, reason: String },
}

impl ProtocolError {
    /// Event name to report the rejection under.
    pub fn event(&self) -> &str {
        match self {
            ProtocolError::UnknownEvent(event) | ProtocolError::InvalidPayload { event, .. } => {
                event
            }
            ProtocolError::Malformed(_) | ProtocolError::MissingEvent => "unknown",
        }
    }
}

const KNOWN_EVENTS: [&str; 6] = [
    "connect",
    "add_box",
    "update_generation",
    "remaining_volume",
    "run_packing_algorithm",
    "update_container_dimensions",
];

/// Parses one text frame.
///
/// A missing or `null` `data` field counts as an empty object, so
/// `{"event": "run_packing_algorithm"}` runs with the remembered dimensions.
pub fn parse_client_event(text: &str) -> Result<ClientEvent, ProtocolError> {
    let frame: Map<String, Value> =
        serde_json::from_str(text).map_err(|err| ProtocolError::Malformed(err.to_string()))?;

    let event = match frame.get("event") {
        Some(Value::String(event)) => event.clone(),
        _ => return Err(ProtocolError::MissingEvent),
    };
    if !KNOWN_EVENTS.contains(&event.as_str()) {
        return Err(ProtocolError::UnknownEvent(event));
    }
    if event == "connect" {
        return Ok(ClientEvent::Connect);
    }

    let data = match frame.get("data") {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(data) => data.clone(),
    };

    let mut normalized = Map::new();
    normalized.insert("event".into(), Value::String(event.clone()));
    normalized.insert("data".into(), data);

    serde_json::from_value(Value::Object(normalized)).map_err(|err| {
        ProtocolError::InvalidPayload {
            event,
            reason: err.to_string(),
        }
    })
}
