//! Message structure and pending/confirmed state

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Sentinel prefix of locally generated temporary ids
pub const TEMP_ID_PREFIX: &str = "temp-";

const TOKEN_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a fresh correlation token, e.g. `temp-1718000000000-k3j9x0qa`
///
/// Doubles as the temporary id of the pending message it belongs to.
pub fn new_temp_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..8)
        .map(|_| char::from(TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())]))
        .collect();
    format!("{}{}-{}", TEMP_ID_PREFIX, Utc::now().timestamp_millis(), suffix)
}

/// Lifecycle state of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageState {
    /// Created locally, waiting for the server echo
    Pending,
    /// Known to the server (echoed, pushed, or loaded from history)
    Confirmed,
}

/// A chat message in canonical shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Durable server id, or a `temp-` id while pending
    pub id: String,
    /// Sender id
    pub from: String,
    /// Recipient id
    pub to: String,
    /// Message text
    pub content: String,
    /// Timestamp as delivered (informational, never a sort key)
    #[serde(default)]
    pub sent_at: Option<String>,
    /// True only while awaiting server confirmation
    #[serde(default)]
    pub pending: bool,
    /// Correlation token attached at send time and echoed by the server
    #[serde(default)]
    pub temp_id: Option<String>,
}

impl Message {
    /// Create a confirmed message
    pub fn new(
        id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        content: impl Into<String>,
        sent_at: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            content: content.into(),
            sent_at,
            pending: false,
            temp_id: None,
        }
    }

    /// Create a pending message whose id is its correlation token
    pub fn pending(
        temp_id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let temp_id = temp_id.into();
        Self {
            id: temp_id.clone(),
            from: from.into(),
            to: to.into(),
            content: content.into(),
            sent_at: Some(Utc::now().to_rfc3339()),
            pending: true,
            temp_id: Some(temp_id),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> MessageState {
        if self.pending {
            MessageState::Pending
        } else {
            MessageState::Confirmed
        }
    }

    /// Whether the id is a local temporary id
    pub fn has_temp_id(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }

    /// Whether the id was assigned by the server
    pub fn has_durable_id(&self) -> bool {
        !self.id.is_empty() && !self.has_temp_id()
    }

    /// Whether this message was sent by `user_id`
    pub fn is_from(&self, user_id: &str) -> bool {
        self.from == user_id
    }

    /// Parse `sent_at` into a UTC timestamp
    ///
    /// Accepts RFC 3339 as well as the zone-less `LocalDateTime` text the
    /// backend emits (interpreted as UTC).
    pub fn sent_at_utc(&self) -> Option<DateTime<Utc>> {
        let raw = self.sent_at.as_deref()?.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// Short local clock time for display, e.g. `14:05`
    pub fn display_time(&self) -> Option<String> {
        self.sent_at_utc()
            .map(|ts| ts.with_timezone(&Local).format("%H:%M").to_string())
    }

    /// Get human-readable delivery status indicator
    pub fn status_indicator(&self) -> &str {
        match self.state() {
            MessageState::Pending => "…",
            MessageState::Confirmed => "✓",
        }
    }

    /// Get full status text
    pub fn status_text(&self) -> &str {
        match self.state() {
            MessageState::Pending => "sending…",
            MessageState::Confirmed => "sent",
        }
    }
}
