//! Conversation view
//!
//! [`ConversationView`] owns one two-party conversation: its message log,
//! its connection status, the input buffer, and the background tasks that
//! feed it. Every asynchronous result arrives as a [`ViewEvent`] on a
//! single channel and is applied by [`ConversationView::handle`], so the
//! log has exactly one mutator.
//!
//! Each event carries the generation it was produced for. Switching peers
//! or tearing down bumps the generation, so results that were already in
//! flight are ignored instead of leaking into the wrong conversation.

use crate::config::ChatContext;
use crate::connection::{Connection, ConnectionEvent, ConnectionStatus};
use crate::history::HistoryClient;
use crate::model::{new_temp_id, Message};
use crate::protocol::{parse_inbound, InboundEvent, OutboundEnvelope};
use crate::reconcile::{MessageLog, ReconcileOutcome};
use crate::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Status text shown when a send can't go out
pub const NOT_CONNECTED: &str = "not connected";

/// An asynchronous result destined for a conversation view
#[derive(Debug)]
pub enum ViewEvent {
    /// History fetch finished
    History {
        /// Generation the fetch was started for
        generation: u64,
        /// Backlog or fetch error
        result: Result<Vec<Message>>,
    },
    /// Something happened on the socket
    Connection {
        /// Generation the socket was opened for
        generation: u64,
        /// The socket event
        event: ConnectionEvent,
    },
}

/// What [`ConversationView::handle`] did with an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    /// Backlog replaced the log
    HistoryLoaded {
        /// Number of messages in the log after loading
        count: usize,
    },
    /// Backlog fetch failed; the log was left as it was
    HistoryFailed,
    /// Connection status changed
    Status(ConnectionStatus),
    /// A system announcement updated the status text
    System,
    /// A chat message went through reconciliation
    Reconciled(ReconcileOutcome),
    /// A chat message for a different conversation on the same socket
    OtherConversation,
    /// Unparsable payload, dropped
    Malformed,
    /// Stale generation or view already torn down
    Ignored,
}

/// Result of a send attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Nothing to send after trimming
    Empty,
    /// Pending message added and frame handed to the socket
    Sent {
        /// Correlation token of the pending message
        temp_id: String,
    },
    /// Pending message added but the socket is not connected; it stays
    /// pending until the conversation is reopened
    NotConnected {
        /// Correlation token of the pending message
        temp_id: String,
    },
    /// The view has been torn down
    Closed,
}

/// One open two-party conversation
pub struct ConversationView {
    context: ChatContext,
    peer: String,
    log: MessageLog,
    status: ConnectionStatus,
    status_text: String,
    input: String,
    generation: u64,
    torn_down: bool,
    spawns_tasks: bool,
    connection: Option<Connection>,
    history_task: Option<JoinHandle<()>>,
    events_tx: mpsc::UnboundedSender<ViewEvent>,
    events_rx: mpsc::UnboundedReceiver<ViewEvent>,
}

impl ConversationView {
    /// Open a conversation with `peer`, starting the history fetch and the
    /// socket in the background
    ///
    /// Must be called inside a tokio runtime. Failures never escape: they
    /// show up as an empty log and an `Error` status.
    ///
    /// # Example
    /// ```rust,no_run
    /// use fixitnow_chat::config::{ChatContext, Session, Settings};
    /// use fixitnow_chat::conversation::ConversationView;
    ///
    /// # async fn example() {
    /// let context = ChatContext::new(Settings::default(), Session::new("token", "42"));
    /// let mut view = ConversationView::open(context, "17");
    ///
    /// view.set_input("Is Tuesday fine?");
    /// view.send_input();
    ///
    /// while let Some(event) = view.next_event().await {
    ///     view.handle(event);
    ///     for msg in view.messages() {
    ///         println!("{}: {} {}", msg.from, msg.content, msg.status_indicator());
    ///     }
    /// }
    /// # }
    /// ```
    pub fn open(context: ChatContext, peer: impl Into<String>) -> Self {
        let mut view = Self::build(context, peer.into(), true);
        view.activate();
        view
    }

    /// Create a view that starts no background work
    ///
    /// Events are fed in by hand through [`ConversationView::handle`].
    pub fn detached(context: ChatContext, peer: impl Into<String>) -> Self {
        Self::build(context, peer.into(), false)
    }

    fn build(context: ChatContext, peer: String, spawns_tasks: bool) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            context,
            peer,
            log: MessageLog::new(),
            status: ConnectionStatus::Connecting,
            status_text: String::new(),
            input: String::new(),
            generation: 0,
            torn_down: false,
            spawns_tasks,
            connection: None,
            history_task: None,
            events_tx,
            events_rx,
        }
    }

    fn activate(&mut self) {
        if !self.spawns_tasks {
            return;
        }
        let generation = self.generation;
        info!(
            "Opening conversation {} <-> {} (generation {})",
            self.context.session.user_id, self.peer, generation
        );

        match HistoryClient::new(&self.context.settings) {
            Ok(client) => {
                let tx = self.events_tx.clone();
                let user_id = self.context.session.user_id.clone();
                let peer = self.peer.clone();
                let bearer = self.context.session.bearer().map(str::to_string);
                self.history_task = Some(tokio::spawn(async move {
                    let result = client.fetch_history(&user_id, &peer, bearer.as_deref()).await;
                    let _ = tx.send(ViewEvent::History { generation, result });
                }));
            }
            Err(e) => error!("Failed to create history client: {}", e),
        }

        let token = match self.context.session.bearer() {
            Some(token) => token.to_string(),
            None => {
                warn!("No session token; chat connection not opened");
                self.status = ConnectionStatus::Error;
                self.status_text = "missing session token".to_string();
                return;
            }
        };

        let tx = self.events_tx.clone();
        let opened = Connection::open(&self.context.settings.ws_url, &token, move |event| {
            let _ = tx.send(ViewEvent::Connection { generation, event });
        });
        match opened {
            Ok(conn) => self.connection = Some(conn),
            Err(e) => {
                error!("Failed to open chat connection: {}", e);
                self.status = ConnectionStatus::Error;
                self.status_text = e.to_string();
            }
        }
    }

    fn deactivate(&mut self) {
        self.generation += 1;
        if let Some(task) = self.history_task.take() {
            task.abort();
        }
        if let Some(conn) = self.connection.take() {
            conn.close();
        }
    }

    /// Wait for the next background event
    ///
    /// Returns `None` once the view has been torn down.
    pub async fn next_event(&mut self) -> Option<ViewEvent> {
        if self.torn_down {
            return None;
        }
        self.events_rx.recv().await
    }

    /// Apply one background event
    pub fn handle(&mut self, event: ViewEvent) -> Handled {
        let generation = match &event {
            ViewEvent::History { generation, .. } | ViewEvent::Connection { generation, .. } => {
                *generation
            }
        };
        if self.torn_down || generation != self.generation {
            debug!(
                "Ignoring event for generation {} (current {}, torn down: {})",
                generation, self.generation, self.torn_down
            );
            return Handled::Ignored;
        }

        match event {
            ViewEvent::History { result, .. } => self.apply_history(result),
            ViewEvent::Connection { event, .. } => self.apply_connection_event(event),
        }
    }

    fn apply_history(&mut self, result: Result<Vec<Message>>) -> Handled {
        self.history_task = None;
        match result {
            Ok(messages) => {
                self.log.seed(messages);
                Handled::HistoryLoaded {
                    count: self.log.len(),
                }
            }
            Err(e) => {
                error!("Failed to load chat history with {}: {}", self.peer, e);
                Handled::HistoryFailed
            }
        }
    }

    fn apply_connection_event(&mut self, event: ConnectionEvent) -> Handled {
        match event {
            ConnectionEvent::Opened => {
                self.status = ConnectionStatus::Connected;
                self.status_text = ConnectionStatus::Connected.label().to_string();
                Handled::Status(self.status)
            }
            ConnectionEvent::Frame(text) => self.apply_frame(&text),
            ConnectionEvent::Failed(reason) => {
                self.status = ConnectionStatus::Error;
                self.status_text = format!("connection error: {}", reason);
                self.connection = None;
                Handled::Status(self.status)
            }
            ConnectionEvent::Closed => {
                self.status = ConnectionStatus::Disconnected;
                self.status_text = ConnectionStatus::Disconnected.label().to_string();
                self.connection = None;
                Handled::Status(self.status)
            }
        }
    }

    fn apply_frame(&mut self, text: &str) -> Handled {
        match parse_inbound(text) {
            Ok(InboundEvent::System { message }) => {
                debug!("System message: {}", message);
                self.status_text = message;
                Handled::System
            }
            Ok(InboundEvent::Chat(msg)) => {
                if !self.belongs_here(&msg) {
                    debug!("Message {} is for another conversation", msg.id);
                    return Handled::OtherConversation;
                }
                Handled::Reconciled(self.log.reconcile(msg))
            }
            Err(e) => {
                warn!("Dropping inbound frame: {}", e);
                Handled::Malformed
            }
        }
    }

    fn belongs_here(&self, msg: &Message) -> bool {
        if msg.from.is_empty() || msg.to.is_empty() {
            return true;
        }
        let me = self.context.session.user_id.as_str();
        let peer = self.peer.as_str();
        (msg.from == me && msg.to == peer) || (msg.from == peer && msg.to == me)
    }

    /// Replace the input buffer
    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Current input buffer
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Send the input buffer, clearing it whatever the outcome
    pub fn send_input(&mut self) -> SendOutcome {
        let text = std::mem::take(&mut self.input);
        self.send_text(&text)
    }

    /// Send `text` to the peer with an optimistic pending message
    pub fn send_text(&mut self, text: &str) -> SendOutcome {
        if self.torn_down {
            warn!("Send on a torn down conversation ignored");
            return SendOutcome::Closed;
        }

        let content = text.trim();
        if content.is_empty() {
            return SendOutcome::Empty;
        }

        let temp_id = new_temp_id();
        self.log.push_pending(Message::pending(
            temp_id.clone(),
            self.context.session.user_id.clone(),
            self.peer.clone(),
            content,
        ));

        let connection = match (&self.connection, self.status) {
            (Some(conn), ConnectionStatus::Connected) => conn,
            _ => {
                warn!("Not connected ({}); message {} stays pending", self.status, temp_id);
                self.status_text = NOT_CONNECTED.to_string();
                return SendOutcome::NotConnected { temp_id };
            }
        };

        let envelope = OutboundEnvelope::new(self.peer.clone(), content, temp_id.clone());
        match connection.send(&envelope) {
            Ok(()) => {
                debug!("Sent message {} to {}", temp_id, self.peer);
                SendOutcome::Sent { temp_id }
            }
            Err(e) => {
                warn!("Failed to hand message {} to the socket: {}", temp_id, e);
                self.status_text = NOT_CONNECTED.to_string();
                SendOutcome::NotConnected { temp_id }
            }
        }
    }

    /// Switch to a different peer
    ///
    /// Tears down the current socket and history fetch, clears the log,
    /// and opens a fresh connection for `new_peer`.
    pub fn change_peer(&mut self, new_peer: impl Into<String>) {
        let new_peer = new_peer.into();
        if self.torn_down {
            warn!("Peer change on a torn down conversation ignored");
            return;
        }
        if new_peer == self.peer {
            return;
        }

        let old_peer = std::mem::replace(&mut self.peer, new_peer);
        info!("Switching conversation {} -> {}", old_peer, self.peer);

        self.deactivate();
        self.log.clear();
        self.status = ConnectionStatus::Connecting;
        self.status_text.clear();
        self.input.clear();
        self.activate();
    }

    /// Close the socket, cancel the history fetch and discard the log
    ///
    /// Any event that arrives afterwards is ignored.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        info!("Closing conversation with {}", self.peer);
        self.deactivate();
        self.torn_down = true;
        self.log.clear();
        self.status = ConnectionStatus::Disconnected;
    }

    /// Attach a connection whose events are produced elsewhere
    #[cfg(test)]
    pub(crate) fn attach_connection(&mut self, connection: Connection) {
        self.connection = Some(connection);
    }

    /// Sender for feeding events into this view
    pub fn event_sender(&self) -> mpsc::UnboundedSender<ViewEvent> {
        self.events_tx.clone()
    }

    /// Messages in display order
    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    /// The underlying log
    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// Connection status
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Latest status text (system announcements, errors, "not connected")
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// The other participant
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// The local participant
    pub fn user_id(&self) -> &str {
        &self.context.session.user_id
    }

    /// Current generation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether [`ConversationView::teardown`] has run
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

impl Drop for ConversationView {
    fn drop(&mut self) {
        self.teardown();
    }
}
