//! Client settings and injected session context

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default REST base URL of the FixItNow backend
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8087";

/// Default WebSocket endpoint for chat
pub const DEFAULT_WS_URL: &str = "ws://localhost:8087/ws/chat";

/// Client settings
///
/// Stored as JSON and loaded at startup. Missing fields fall back to their
/// defaults, so a partial file is valid.
///
/// # Example
/// ```rust,no_run
/// use fixitnow_chat::config::Settings;
///
/// let settings = Settings::load("chat.json").expect("Failed to load");
/// println!("API: {}", settings.api_base_url);
/// println!("WS:  {}", settings.ws_url);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL for REST calls (history, conversation list)
    pub api_base_url: String,
    /// WebSocket endpoint; the bearer token is appended as `?token=`
    pub ws_url: String,
    /// Timeout for REST requests in seconds
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file
    ///
    /// Returns default settings if the file doesn't exist or is empty.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read settings: {}", e)))?;

        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        let settings: Self = serde_json::from_str(&data)
            .map_err(|e| Error::Config(format!("Failed to parse settings: {}", e)))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)
            .map_err(|e| Error::Config(format!("Failed to write settings: {}", e)))?;
        Ok(())
    }

    /// Check that the configured endpoints use the expected schemes
    pub fn validate(&self) -> Result<()> {
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "api_base_url must be http(s): {}",
                self.api_base_url
            )));
        }
        if !(self.ws_url.starts_with("ws://") || self.ws_url.starts_with("wss://")) {
            return Err(Error::Config(format!("ws_url must be ws(s): {}", self.ws_url)));
        }
        Ok(())
    }

    /// REST base URL without a trailing slash
    pub fn api_base(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }
}

/// Credential and identity of the signed-in user
#[derive(Clone, Default, PartialEq)]
pub struct Session {
    /// Opaque bearer token issued at sign-in
    pub token: String,
    /// Local user identifier
    pub user_id: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

impl Session {
    /// Create a new session
    pub fn new(token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            user_id: user_id.into(),
        }
    }

    /// Bearer token, if one is present
    pub fn bearer(&self) -> Option<&str> {
        if self.token.is_empty() {
            None
        } else {
            Some(&self.token)
        }
    }
}

/// Everything a conversation view needs from the outside world
#[derive(Debug, Clone, Default)]
pub struct ChatContext {
    /// Endpoint settings
    pub settings: Settings,
    /// Signed-in user
    pub session: Session,
}

impl ChatContext {
    /// Create a new context
    pub fn new(settings: Settings, session: Session) -> Self {
        Self { settings, session }
    }
}
