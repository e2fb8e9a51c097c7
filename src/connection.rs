//! Connection lifecycle
//!
//! One WebSocket per open conversation view. The socket lives in its own
//! tokio task; the owner talks to it through a command channel and hears
//! back through an event handler callback. There is no automatic
//! reconnect: after a failure or close the owner has to open a new
//! connection.

use crate::protocol::OutboundEnvelope;
use crate::{Error, Result};
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

/// Connection status shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// Handshake in progress
    #[default]
    Connecting,
    /// Socket open, sends go out immediately
    Connected,
    /// Transport failure; no retry is attempted
    Error,
    /// Closed by either side
    Disconnected,
}

impl ConnectionStatus {
    /// Short label for status lines
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "error",
            ConnectionStatus::Disconnected => "disconnected",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Something that happened on the socket
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// Handshake completed
    Opened,
    /// A text frame arrived
    Frame(String),
    /// Transport failure with a reason
    Failed(String),
    /// The socket was closed
    Closed,
}

/// Callback type for connection events
pub type EventHandler = Box<dyn Fn(ConnectionEvent) + Send + Sync>;

/// Instructions for the socket task
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    Send(String),
    Close,
}

/// Handle to a live chat socket
pub struct Connection {
    commands: mpsc::UnboundedSender<Command>,
    task: Option<JoinHandle<()>>,
}

impl Connection {
    /// Start connecting to `ws_url` with `token` as the `token` query
    /// parameter
    ///
    /// Returns as soon as the task is spawned; the outcome of the handshake
    /// is reported through `on_event`. Must be called inside a tokio
    /// runtime.
    pub fn open<F>(ws_url: &str, token: &str, on_event: F) -> Result<Self>
    where
        F: Fn(ConnectionEvent) + Send + Sync + 'static,
    {
        let url = connect_url(ws_url, token)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let handler: EventHandler = Box::new(on_event);

        info!("Opening chat connection to {}", redact(&url));
        let task = tokio::spawn(run_socket(url, rx, handler));

        Ok(Self {
            commands: tx,
            task: Some(task),
        })
    }

    /// Wrap an existing command channel without a socket task
    #[cfg(test)]
    pub(crate) fn from_channel(commands: mpsc::UnboundedSender<Command>) -> Self {
        Self {
            commands,
            task: None,
        }
    }

    /// Queue an envelope for transmission
    pub fn send(&self, envelope: &OutboundEnvelope) -> Result<()> {
        let text = envelope.to_json()?;
        self.commands
            .send(Command::Send(text))
            .map_err(|_| Error::Connection("connection task has stopped".to_string()))
    }

    /// Ask the socket task to close the connection
    pub fn close(&self) {
        if self.commands.send(Command::Close).is_err() {
            debug!("Connection task already stopped");
        }
    }

    /// Whether the socket task has finished
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Close);
    }
}

/// Build the connect URL with the bearer token as a query parameter
///
/// The handshake can't carry custom headers in every transport, so the
/// token always goes in the query string.
pub fn connect_url(ws_url: &str, token: &str) -> Result<String> {
    let mut url = Url::parse(ws_url)
        .map_err(|e| Error::Config(format!("Invalid WebSocket URL {}: {}", ws_url, e)))?;
    url.query_pairs_mut().append_pair("token", token);
    Ok(url.to_string())
}

fn redact(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

async fn run_socket(
    url: String,
    mut commands: mpsc::UnboundedReceiver<Command>,
    on_event: EventHandler,
) {
    let connect = connect_async(url.as_str());
    tokio::pin!(connect);

    let stream = loop {
        tokio::select! {
            res = &mut connect => match res {
                Ok((stream, _response)) => break stream,
                Err(e) => {
                    error!("Chat connection failed: {}", e);
                    on_event(ConnectionEvent::Failed(e.to_string()));
                    return;
                }
            },
            cmd = commands.recv() => match cmd {
                Some(Command::Send(_)) => warn!("Dropping frame sent before the connection opened"),
                Some(Command::Close) | None => {
                    debug!("Connection closed before the handshake completed");
                    return;
                }
            },
        }
    };

    info!("Chat connection open");
    on_event(ConnectionEvent::Opened);

    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(Command::Send(text)) => {
                    if let Err(e) = write.send(WsMessage::Text(text)).await {
                        error!("Failed to send chat frame: {}", e);
                        on_event(ConnectionEvent::Failed(e.to_string()));
                        return;
                    }
                }
                Some(Command::Close) | None => {
                    if let Err(e) = write.send(WsMessage::Close(None)).await {
                        debug!("Close frame not delivered: {}", e);
                    }
                    info!("Chat connection closed by client");
                    on_event(ConnectionEvent::Closed);
                    return;
                }
            },
            frame = read.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => on_event(ConnectionEvent::Frame(text)),
                Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => on_event(ConnectionEvent::Frame(text)),
                    Err(_) => warn!("Dropping non-UTF-8 binary frame"),
                },
                Some(Ok(WsMessage::Close(_))) | None => {
                    info!("Chat connection closed by server");
                    on_event(ConnectionEvent::Closed);
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("Chat connection error: {}", e);
                    on_event(ConnectionEvent::Failed(e.to_string()));
                    return;
                }
            },
        }
    }
}
