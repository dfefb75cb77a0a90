// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Real-time channel message protocol.
//!
//! Messages are JSON objects tagged by `type`. The canonical tags are
//! kebab-case (`event-created`); snake_case tags are accepted on input, as is
//! the legacy `event_update` envelope whose `action` field selects
//! created/updated/deleted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{Error, Result};
use crate::wire::WireEvent;

/// A message received on the real-time channel, pushed or polled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ChannelMessage {
    EventCreated { event: WireEvent },
    EventUpdated { event: WireEvent },
    EventDeleted { id: String },
    ConnectionEstablished {
        #[serde(default)]
        message: String,
    },
    GenerationStatus { status: String },
}

/// The discriminant of a [`ChannelMessage`], used to register listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    EventCreated,
    EventUpdated,
    EventDeleted,
    ConnectionEstablished,
    GenerationStatus,
}

impl MessageKind {
    pub const ALL: [MessageKind; 5] = [
        MessageKind::EventCreated,
        MessageKind::EventUpdated,
        MessageKind::EventDeleted,
        MessageKind::ConnectionEstablished,
        MessageKind::GenerationStatus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::EventCreated => "event-created",
            MessageKind::EventUpdated => "event-updated",
            MessageKind::EventDeleted => "event-deleted",
            MessageKind::ConnectionEstablished => "connection-established",
            MessageKind::GenerationStatus => "generation-status",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MessageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.replace('_', "-");
        MessageKind::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| Error::Decode(format!("unknown message type '{s}'")))
    }
}

impl ChannelMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            ChannelMessage::EventCreated { .. } => MessageKind::EventCreated,
            ChannelMessage::EventUpdated { .. } => MessageKind::EventUpdated,
            ChannelMessage::EventDeleted { .. } => MessageKind::EventDeleted,
            ChannelMessage::ConnectionEstablished { .. } => MessageKind::ConnectionEstablished,
            ChannelMessage::GenerationStatus { .. } => MessageKind::GenerationStatus,
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from a JSON string, normalizing tag spelling first.
    pub fn from_json(s: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(s)?;
        Self::from_value(value)
    }

    pub fn from_value(mut value: Value) -> Result<Self> {
        let obj = value
            .as_object_mut()
            .ok_or_else(|| Error::Decode("message is not an object".to_string()))?;
        let tag = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Decode("message has no type".to_string()))?
            .replace('_', "-");

        let tag = if tag == "event-update" {
            let action = obj
                .get("action")
                .and_then(Value::as_str)
                .unwrap_or("created")
                .to_string();
            match action.as_str() {
                "created" | "create" => "event-created".to_string(),
                "updated" | "update" => "event-updated".to_string(),
                "deleted" | "delete" => {
                    if !obj.contains_key("id") {
                        if let Some(id) = obj.get("event").and_then(|e| e.get("id")).cloned() {
                            obj.insert("id".to_string(), id);
                        }
                    }
                    "event-deleted".to_string()
                }
                other => return Err(Error::Decode(format!("unknown event action '{other}'"))),
            }
        } else {
            tag
        };

        let numeric_id = match obj.get("id") {
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        if let Some(id) = numeric_id {
            obj.insert("id".to_string(), Value::String(id));
        }
        obj.insert("type".to_string(), Value::String(tag));
        Ok(serde_json::from_value(value)?)
    }
}

/// Builds an `event-created` message for a polled event.
pub fn created(event: WireEvent) -> ChannelMessage {
    ChannelMessage::EventCreated { event }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
