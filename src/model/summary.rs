//! Conversation list entries

use serde::{Deserialize, Serialize};

/// One row of the conversation list
///
/// Returned by the backend most recent first; the client keeps that order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    /// The other participant
    pub peer_id: String,
    /// Display name of the other participant
    #[serde(default)]
    pub peer_name: Option<String>,
    /// Text of the most recent message
    #[serde(default)]
    pub last_message: Option<String>,
    /// Timestamp of the most recent message
    #[serde(default)]
    pub last_at: Option<String>,
}

impl ConversationSummary {
    /// Name to show for the peer, falling back to the peer id
    pub fn display_name(&self) -> &str {
        match self.peer_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.peer_id,
        }
    }
}
