use super::helpers::{closed_port_addr, pump_until, spawn_chat_server, spawn_rest_server};
use crate::config::{ChatContext, Session};
use crate::connection::*;
use crate::conversation::{ConversationView, SendOutcome};
use crate::protocol::OutboundEnvelope;
use crate::Error;
use hyper::StatusCode;
use std::time::Duration;
use tokio::sync::mpsc;

async fn next_event(rx: &mut mpsc::UnboundedReceiver<ConnectionEvent>) -> ConnectionEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("Timed out waiting for connection event")
        .expect("Event channel closed")
}

#[test]
fn test_status_labels() {
    assert_eq!(ConnectionStatus::default(), ConnectionStatus::Connecting);
    assert_eq!(ConnectionStatus::Connected.to_string(), "connected");
    assert_eq!(ConnectionStatus::Error.label(), "error");
    assert_eq!(ConnectionStatus::Disconnected.label(), "disconnected");
}

#[test]
fn test_connect_url_appends_token() {
    let url = connect_url("ws://localhost:8087/ws/chat", "abc.def").unwrap();
    assert_eq!(url, "ws://localhost:8087/ws/chat?token=abc.def");

    let url = connect_url("ws://localhost:8087/ws/chat?lang=en", "a b&c").unwrap();
    assert_eq!(url, "ws://localhost:8087/ws/chat?lang=en&token=a+b%26c");
}

#[test]
fn test_connect_url_rejects_garbage() {
    assert!(matches!(connect_url("not a url", "t"), Err(Error::Config(_))));
}

#[tokio::test]
async fn test_open_receive_and_server_close() {
    let (ws_url, uri_rx) = spawn_chat_server("A", true).await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let conn = Connection::open(&ws_url, "secret-token", move |event| {
        let _ = tx.send(event);
    })
    .unwrap();

    assert_eq!(next_event(&mut rx).await, ConnectionEvent::Opened);
    match next_event(&mut rx).await {
        ConnectionEvent::Frame(text) => assert!(text.contains("\"system\":true")),
        other => panic!("Expected frame, got {:?}", other),
    }
    assert_eq!(next_event(&mut rx).await, ConnectionEvent::Closed);

    let uri = uri_rx.await.unwrap();
    assert!(uri.contains("token=secret-token"), "token missing from {}", uri);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(conn.is_finished());
    assert!(conn.send(&OutboundEnvelope::new("B", "late", "temp-1")).is_err());
}

#[tokio::test]
async fn test_send_is_echoed() {
    let (ws_url, _uri_rx) = spawn_chat_server("A", false).await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let conn = Connection::open(&ws_url, "tok", move |event| {
        let _ = tx.send(event);
    })
    .unwrap();

    assert_eq!(next_event(&mut rx).await, ConnectionEvent::Opened);
    next_event(&mut rx).await;

    conn.send(&OutboundEnvelope::new("B", "hello", "temp-42")).unwrap();

    match next_event(&mut rx).await {
        ConnectionEvent::Frame(text) => {
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            assert_eq!(value["tempId"], "temp-42");
            assert_eq!(value["content"], "hello");
        }
        other => panic!("Expected frame, got {:?}", other),
    }

    conn.close();
    assert_eq!(next_event(&mut rx).await, ConnectionEvent::Closed);
}

#[tokio::test]
async fn test_connect_failure_reports_failed() {
    let addr = closed_port_addr().await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let _conn = Connection::open(&format!("ws://{}/ws/chat", addr), "tok", move |event| {
        let _ = tx.send(event);
    })
    .unwrap();

    assert!(matches!(next_event(&mut rx).await, ConnectionEvent::Failed(_)));
}

#[tokio::test]
async fn test_conversation_round_trip() {
    let (mut settings, _seen) = spawn_rest_server(
        StatusCode::OK,
        r#"[{"id": "m1", "from": "A", "to": "B", "content": "hi", "sentAt": "2024-05-01T09:00:00"}]"#,
    )
    .await;
    let (ws_url, _uri_rx) = spawn_chat_server("A", false).await;
    settings.ws_url = ws_url;

    let mut view = ConversationView::open(ChatContext::new(settings, Session::new("tok", "A")), "B");
    pump_until(&mut view, |v| {
        v.status() == ConnectionStatus::Connected && v.messages().len() == 1
    })
    .await;

    let temp_id = match view.send_text("yo") {
        SendOutcome::Sent { temp_id } => temp_id,
        other => panic!("Expected Sent, got {:?}", other),
    };
    assert!(view.messages()[1].pending);

    pump_until(&mut view, |v| !v.messages()[1].pending).await;

    let messages = view.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].id, "m1");
    assert_eq!(messages[1].id, "srv-1");
    assert_eq!(messages[1].content, "yo");
    assert_eq!(messages[1].temp_id.as_deref(), Some(temp_id.as_str()));

    view.teardown();
    assert!(view.next_event().await.is_none());
}

#[tokio::test]
async fn test_conversation_unreachable_backend() {
    let addr = closed_port_addr().await;
    let mut settings = crate::config::Settings {
        api_base_url: format!("http://{}", addr),
        request_timeout_secs: 2,
        ..Default::default()
    };
    settings.ws_url = format!("ws://{}/ws/chat", addr);

    let mut view = ConversationView::open(ChatContext::new(settings, Session::new("tok", "A")), "B");
    pump_until(&mut view, |v| v.status() == ConnectionStatus::Error).await;

    assert!(view.messages().is_empty());
    assert!(matches!(view.send_text("hello"), SendOutcome::NotConnected { .. }));
    assert!(view.messages()[0].pending);
}
