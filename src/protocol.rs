//! Protocol module
//!
//! This module defines the chat wire format and its normalization:
//! - Outbound envelope sent over the WebSocket
//! - Inbound event classification (chat vs. system)
//! - Tolerant mapping of loosely shaped records into [`Message`]
//!
//! The backend is not strict about field names, so every lookup goes
//! through one of the ordered fallback lists below. The first field that is
//! present and non-null wins.

use crate::model::Message;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

/// Field names tried, in order, for a message id
pub const MESSAGE_ID_FIELDS: &[&str] = &["id", "_id", "messageId", "message_id"];

/// Field names tried, in order, for a message timestamp
pub const TIMESTAMP_FIELDS: &[&str] = &["sentAt", "createdAt", "timestamp", "time"];

/// Field names tried, in order, for an id nested in a participant object
pub const PARTICIPANT_ID_FIELDS: &[&str] = &["id", "_id", "userId", "user_id"];

/// Field names tried, in order, for the sender
pub const FROM_FIELDS: &[&str] = &["from", "sender", "senderId"];

/// Field names tried, in order, for the recipient
pub const TO_FIELDS: &[&str] = &["to", "receiver", "receiverId"];

/// Prefix of ids synthesized for records that arrive without one
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Frame sent to the server for a new chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundEnvelope {
    /// Recipient id
    pub to: String,
    /// Message text
    pub content: String,
    /// Correlation token echoed back by the server
    pub temp_id: String,
}

impl OutboundEnvelope {
    /// Create a new outbound envelope
    pub fn new(to: impl Into<String>, content: impl Into<String>, temp_id: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            content: content.into(),
            temp_id: temp_id.into(),
        }
    }

    /// Encode as a JSON text frame
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// A chat message, confirmed by the server
    Chat(Message),
    /// A control/status announcement, e.g. `connected`
    System {
        /// Announcement text
        message: String,
    },
}

/// Decode one inbound text frame
///
/// Returns [`Error::MalformedEvent`] for anything that is not a JSON object
/// or lacks message content.
pub fn parse_inbound(text: &str) -> Result<InboundEvent> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| Error::MalformedEvent(format!("invalid JSON: {}", e)))?;

    let obj = value
        .as_object()
        .ok_or_else(|| Error::MalformedEvent("payload is not an object".to_string()))?;

    if obj.get("system").and_then(Value::as_bool).unwrap_or(false) {
        let message = obj
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Ok(InboundEvent::System { message });
    }

    normalize_object(obj).map(InboundEvent::Chat)
}

/// Map a raw record into the canonical message shape
pub fn normalize_record(value: &Value) -> Result<Message> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::MalformedEvent("record is not an object".to_string()))?;
    normalize_object(obj)
}

/// Map an array of raw records, skipping the ones that can't be read
pub fn normalize_records(value: &Value) -> Result<Vec<Message>> {
    let items = value
        .as_array()
        .ok_or_else(|| Error::MalformedEvent("history payload is not an array".to_string()))?;

    let mut messages = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        match normalize_record(item) {
            Ok(msg) => messages.push(msg),
            Err(e) => warn!("Skipping history record {}: {}", idx, e),
        }
    }
    Ok(messages)
}

/// Normalize a participant reference to its string id
///
/// Strings are taken as-is, numbers are stringified, and objects are
/// searched with [`PARTICIPANT_ID_FIELDS`].
pub fn normalize_participant(value: &Value) -> Option<String> {
    match value {
        Value::Object(obj) => first_scalar(obj, PARTICIPANT_ID_FIELDS),
        other => scalar_to_string(other),
    }
}

fn normalize_object(obj: &Map<String, Value>) -> Result<Message> {
    let content = obj
        .get("content")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MalformedEvent("missing content".to_string()))?
        .to_string();

    let id = first_scalar(obj, MESSAGE_ID_FIELDS)
        .unwrap_or_else(|| format!("{}{}", LOCAL_ID_PREFIX, Uuid::new_v4()));

    let from = first_participant(obj, FROM_FIELDS).unwrap_or_default();
    let to = first_participant(obj, TO_FIELDS).unwrap_or_default();
    let sent_at = first_scalar(obj, TIMESTAMP_FIELDS);

    let temp_id = obj
        .get("tempId")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    Ok(Message {
        id,
        from,
        to,
        content,
        sent_at,
        pending: false,
        temp_id,
    })
}

fn first_scalar(obj: &Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|field| obj.get(*field))
        .find_map(scalar_to_string)
}

fn first_participant(obj: &Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|field| obj.get(*field))
        .find_map(normalize_participant)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
