//! FixItNow chat terminal client
//!
//! Lists conversations or opens one and streams it to the terminal.
//! Lines typed on stdin are sent to the peer; `/peer <id>` switches
//! conversation and `/quit` exits.

use anyhow::Context;
use clap::Parser;
use fixitnow_chat::config::{ChatContext, Session, Settings};
use fixitnow_chat::conversation::{ConversationView, Handled, SendOutcome};
use fixitnow_chat::history::HistoryClient;
use fixitnow_chat::model::Message;
use fixitnow_chat::reconcile::ReconcileOutcome;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Command line options
#[derive(Parser, Debug)]
#[command(name = "fixitnow-chat", about = "FixItNow chat client")]
struct Cli {
    /// Path to the JSON settings file
    #[arg(long, default_value = "chat.json")]
    config: PathBuf,
    /// Bearer token from sign-in
    #[arg(long)]
    token: String,
    /// Local user id
    #[arg(long)]
    user: String,
    /// Peer to chat with; omit to list conversations
    #[arg(long)]
    peer: Option<String>,
    /// List conversations and exit
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fixitnow_chat::init();
    let cli = Cli::parse();

    let settings = Settings::load(&cli.config)
        .with_context(|| format!("loading settings from {}", cli.config.display()))?;
    let context = ChatContext::new(settings, Session::new(cli.token, cli.user));

    match cli.peer {
        Some(peer) if !cli.list => run_conversation(context, peer).await,
        _ => list_conversations(&context).await,
    }
}

async fn list_conversations(context: &ChatContext) -> anyhow::Result<()> {
    let client = HistoryClient::new(&context.settings)?;
    let summaries = client
        .fetch_conversations(&context.session.user_id, context.session.bearer())
        .await
        .context("fetching conversations")?;

    if summaries.is_empty() {
        println!("No conversations yet.");
    }
    for summary in summaries {
        println!(
            "{:<12} {:<24} {}",
            summary.peer_id,
            summary.display_name(),
            summary.last_message.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

async fn run_conversation(context: ChatContext, peer: String) -> anyhow::Result<()> {
    let mut view = ConversationView::open(context, peer);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Chatting with {} (/peer <id> to switch, /quit to exit)", view.peer());

    loop {
        tokio::select! {
            event = view.next_event() => {
                let Some(event) = event else { break };
                match view.handle(event) {
                    Handled::HistoryLoaded { .. } => {
                        for msg in view.messages() {
                            print_message(msg, view.user_id());
                        }
                    }
                    Handled::HistoryFailed => println!("[history unavailable]"),
                    Handled::Status(_) | Handled::System => {
                        println!("[{}] {}", view.status(), view.status_text());
                    }
                    Handled::Reconciled(ReconcileOutcome::Confirmed { index })
                    | Handled::Reconciled(ReconcileOutcome::Appended { index }) => {
                        if let Some(msg) = view.messages().get(index) {
                            print_message(msg, view.user_id());
                        }
                    }
                    _ => {}
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line == "/quit" {
                    break;
                }
                if let Some(next) = line.strip_prefix("/peer ") {
                    view.change_peer(next.trim());
                    println!("Chatting with {}", view.peer());
                    continue;
                }
                view.set_input(line);
                match view.send_input() {
                    SendOutcome::Sent { .. } | SendOutcome::Empty => {}
                    SendOutcome::NotConnected { .. } => {
                        println!("[{}] message kept as sending…", view.status_text());
                    }
                    SendOutcome::Closed => break,
                }
            }
        }
    }

    view.teardown();
    Ok(())
}

fn print_message(msg: &Message, me: &str) {
    let who = if msg.is_from(me) { "You" } else { msg.from.as_str() };
    let time = msg.display_time().unwrap_or_default();
    if msg.pending {
        println!("{} {}: {} ({})", time, who, msg.content, msg.status_text());
    } else {
        println!("{} {}: {}", time, who, msg.content);
    }
}
