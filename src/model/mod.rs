//! Chat data model
//!
//! - `message` - Message structure and pending/confirmed state
//! - `summary` - Conversation list entries

pub mod message;
pub mod summary;

pub use message::{new_temp_id, Message, MessageState, TEMP_ID_PREFIX};
pub use summary::ConversationSummary;
