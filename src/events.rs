//! Notifications emitted by state transitions

use serde::Serialize;

pub const MODULE_NAME: &str = "gravity";

pub const ATTRIBUTE_KEY_MODULE: &str = "module";
pub const ATTRIBUTE_KEY_CONTRACT: &str = "bridge_contract";
pub const ATTRIBUTE_KEY_BRIDGE_CHAIN_ID: &str = "bridge_chain_id";
pub const ATTRIBUTE_KEY_OUTGOING_BATCH_ID: &str = "outgoing_batch_id";
pub const ATTRIBUTE_KEY_NONCE: &str = "nonce";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    OutgoingBatch,
    OutgoingBatchCanceled,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::OutgoingBatch => "outgoing_batch",
            EventType::OutgoingBatchCanceled => "outgoing_batch_canceled",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub kind: EventType,
    pub attributes: Vec<(String, String)>,
}

impl Event {
    pub fn new(kind: EventType) -> Self {
        Self {
            kind,
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl ToString) -> Self {
        self.attributes.push((key.to_string(), value.to_string()));
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Collects the events of one transition in emission order
#[derive(Debug, Default)]
pub struct EventManager {
    events: Vec<Event>,
}

impl EventManager {
    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }
}
