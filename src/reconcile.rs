//! Message reconciliation
//!
//! [`MessageLog`] is the single ordered sequence of a conversation. It is
//! seeded from history, grows with optimistic sends, and absorbs live
//! messages pushed by the server. An inbound message whose durable id is
//! already present is dropped. Otherwise it is matched against pending
//! ones in this order, first match wins:
//!
//! 1. the event's `tempId` equals a pending message's correlation token;
//! 2. only when the event has no `tempId`: the oldest pending message with
//!    the same `content` and the same sender. Best-effort; two identical
//!    messages in flight at once are matched oldest first;
//! 3. otherwise the event is new and is appended.
//!
//! A durable id therefore appears at most once in the log.
//!
//! A matched pending message is overwritten in its slot. Nothing is ever
//! removed or re-sorted; arrival order is the display order.

use crate::model::{Message, MessageState};
use tracing::debug;

/// What [`MessageLog::reconcile`] did with an inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A pending message at `index` was replaced by its confirmation
    Confirmed {
        /// Slot that was overwritten
        index: usize,
    },
    /// The message was new and was appended at `index`
    Appended {
        /// Slot of the new message
        index: usize,
    },
    /// A message with the same durable id was already present
    Duplicate,
}

/// Ordered, deduplicated message sequence of one conversation
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole sequence with a history backlog
    ///
    /// Repeated durable ids in the backlog keep their first occurrence.
    pub fn seed(&mut self, history: Vec<Message>) {
        self.messages.clear();
        for msg in history {
            if msg.has_durable_id() && self.position_of_confirmed(&msg.id).is_some() {
                debug!("Dropping repeated history record {}", msg.id);
                continue;
            }
            self.messages.push(msg);
        }
    }

    /// Append an optimistic message and return its index
    pub fn push_pending(&mut self, msg: Message) -> usize {
        debug_assert!(msg.pending, "push_pending expects a pending message");
        self.messages.push(msg);
        self.messages.len() - 1
    }

    /// Merge a server-confirmed message into the sequence
    pub fn reconcile(&mut self, mut incoming: Message) -> ReconcileOutcome {
        incoming.pending = false;

        if incoming.has_durable_id() && self.position_of_confirmed(&incoming.id).is_some() {
            debug!("Discarding redelivered message {}", incoming.id);
            return ReconcileOutcome::Duplicate;
        }

        if let Some(index) = self.find_pending_match(&incoming) {
            debug!(
                "Confirmed pending {} as {} at index {}",
                self.messages[index].id, incoming.id, index
            );
            self.messages[index] = incoming;
            return ReconcileOutcome::Confirmed { index };
        }

        self.messages.push(incoming);
        ReconcileOutcome::Appended {
            index: self.messages.len() - 1,
        }
    }

    fn find_pending_match(&self, incoming: &Message) -> Option<usize> {
        match incoming.temp_id.as_deref() {
            Some(token) => self
                .messages
                .iter()
                .position(|m| m.pending && m.temp_id.as_deref() == Some(token)),
            None => self.messages.iter().position(|m| {
                m.pending && m.content == incoming.content && m.from == incoming.from
            }),
        }
    }

    fn position_of_confirmed(&self, id: &str) -> Option<usize> {
        self.messages
            .iter()
            .position(|m| m.state() == MessageState::Confirmed && m.id == id)
    }

    /// All messages in display order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of messages still awaiting confirmation
    pub fn pending_count(&self) -> usize {
        self.messages.iter().filter(|m| m.pending).count()
    }

    /// Look up a message by id
    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Drop every message
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
