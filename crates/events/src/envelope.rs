use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::event::{CURRENT_SCHEMA_VERSION, DomainEvent, EventType};

/// Free-form correlation/tracing data attached by the producer.
pub type EventMetadata = serde_json::Map<String, JsonValue>;

/// Envelope for a published event: identity, timing and schema metadata.
///
/// This is the unit handed to every subscriber.
///
/// Notes:
/// - **Immutable**: fields are private and only exposed through getters.
/// - `event_id` is a UUIDv7 generated at construction, `timestamp` is the
///   construction wall-clock time (business time lives on the payload).
/// - `metadata` is carried through untouched; the bus never interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    event_id: Uuid,
    timestamp: DateTime<Utc>,
    version: u32,

    payload: DomainEvent,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<EventMetadata>,
}

impl EventEnvelope {
    pub fn new(payload: impl Into<DomainEvent>) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            timestamp: Utc::now(),
            version: CURRENT_SCHEMA_VERSION,
            payload: payload.into(),
            metadata: None,
        }
    }

    /// Attach metadata before the envelope is published.
    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn payload(&self) -> &DomainEvent {
        &self.payload
    }

    pub fn metadata(&self) -> Option<&EventMetadata> {
        self.metadata.as_ref()
    }

    /// Untyped view of the payload (the `type` tag included).
    pub fn data(&self) -> serde_json::Result<JsonValue> {
        serde_json::to_value(&self.payload)
    }
}
