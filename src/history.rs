//! History loader
//!
//! REST side of the chat: the backlog of a two-party conversation and the
//! list of conversations a user takes part in.

use crate::config::Settings;
use crate::model::{ConversationSummary, Message};
use crate::protocol::normalize_records;
use crate::{Error, Result};
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Path of the history endpoint
pub const HISTORY_PATH: &str = "/api/chat/history";

/// Path of the conversation list endpoint
pub const CONVERSATIONS_PATH: &str = "/api/chat/conversations";

/// HTTP client for chat history
#[derive(Debug, Clone)]
pub struct HistoryClient {
    client: Client,
    api_base: String,
}

impl HistoryClient {
    /// Create a client for the configured backend
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_base: settings.api_base().to_string(),
        })
    }

    /// Fetch the backlog between `user_id` and `peer_id`
    ///
    /// Returns an empty list without touching the network when either id is
    /// empty, since identity resolution may not have finished yet.
    ///
    /// # Example
    /// ```rust,no_run
    /// use fixitnow_chat::config::Settings;
    /// use fixitnow_chat::history::HistoryClient;
    ///
    /// # async fn example() -> fixitnow_chat::Result<()> {
    /// let client = HistoryClient::new(&Settings::default())?;
    /// let messages = client.fetch_history("42", "17", Some("token")).await?;
    /// println!("{} messages", messages.len());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn fetch_history(
        &self,
        user_id: &str,
        peer_id: &str,
        bearer: Option<&str>,
    ) -> Result<Vec<Message>> {
        if user_id.is_empty() || peer_id.is_empty() {
            debug!("Skipping history fetch: identity not resolved");
            return Ok(Vec::new());
        }

        let url = format!("{}{}", self.api_base, HISTORY_PATH);
        info!("Fetching chat history {} <-> {}", user_id, peer_id);

        let mut request = self
            .client
            .get(&url)
            .query(&[("userA", user_id), ("userB", peer_id)]);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = check_status(request.send().await?)?;
        let body: Value = response.json().await?;
        let messages = normalize_records(&body)?;

        info!("Loaded {} history messages", messages.len());
        Ok(messages)
    }

    /// Fetch the conversations `user_id` takes part in, most recent first
    pub async fn fetch_conversations(
        &self,
        user_id: &str,
        bearer: Option<&str>,
    ) -> Result<Vec<ConversationSummary>> {
        if user_id.is_empty() {
            debug!("Skipping conversation list: identity not resolved");
            return Ok(Vec::new());
        }

        let url = format!("{}{}", self.api_base, CONVERSATIONS_PATH);
        let mut request = self.client.get(&url).query(&[("userId", user_id)]);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = check_status(request.send().await?)?;
        let summaries: Vec<ConversationSummary> = response.json().await?;

        info!("Loaded {} conversations for {}", summaries.len(), user_id);
        Ok(summaries)
    }
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        warn!("Chat REST call to {} failed with status {}", response.url(), status);
        Err(Error::HistoryFetch {
            status: status.as_u16(),
        })
    }
}
