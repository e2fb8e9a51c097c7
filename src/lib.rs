//! FixItNow Chat - real-time chat client core
//!
//! This library provides the client side of FixItNow's two-party chat:
//! connection lifecycle, history loading, optimistic sends and the
//! reconciliation of pending, historical and live messages into a single
//! ordered conversation.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod connection;
pub mod conversation;
pub mod history;
pub mod model;
pub mod protocol;
pub mod reconcile;

#[cfg(test)]
mod tests;

/// Result type alias for chat client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for chat client operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Backlog or conversation list fetch returned a non-2xx status
    #[error("History fetch failed with status {status}")]
    HistoryFetch {
        /// HTTP status code returned by the backend
        status: u16,
    },

    /// Inbound payload could not be parsed into a chat event
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// Transport-level connection failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Initialize the chat library with logging
///
/// Honors `RUST_LOG`, falling back to `info`. Safe to call more than once;
/// only the first call installs a subscriber.
pub fn init() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
