// Test helpers - local HTTP and WebSocket servers standing in for the backend

use crate::config::Settings;
use crate::conversation::ConversationView;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request as WsRequest, Response as WsResponse};
use tokio_tungstenite::tungstenite::Message as WsMessage;

/// A request seen by the fake REST server
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub path: String,
    pub query: String,
    pub authorization: Option<String>,
}

pub type SeenRequests = Arc<Mutex<Vec<SeenRequest>>>;

/// Serve `body` with `status` for every request; returns settings pointing
/// at the server and the log of requests it received
pub async fn spawn_rest_server(status: StatusCode, body: &'static str) -> (Settings, SeenRequests) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen: SeenRequests = Arc::default();
    let seen_by_server = seen.clone();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let seen = seen_by_server.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let seen = seen.clone();
                    async move {
                        seen.lock().await.push(SeenRequest {
                            path: req.uri().path().to_string(),
                            query: req.uri().query().unwrap_or_default().to_string(),
                            authorization: req
                                .headers()
                                .get("authorization")
                                .and_then(|v| v.to_str().ok())
                                .map(str::to_string),
                        });
                        let response = Response::builder()
                            .status(status)
                            .header("content-type", "application/json")
                            .body(Full::new(Bytes::from_static(body.as_bytes())))
                            .unwrap();
                        Ok::<_, Infallible>(response)
                    }
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    let settings = Settings {
        api_base_url: format!("http://{}", addr),
        request_timeout_secs: 5,
        ..Settings::default()
    };
    (settings, seen)
}

/// Accept one chat socket, greet it, then echo every outbound envelope back
/// as a confirmed message from `user_id`
///
/// With `close_after_hello` the server closes right after the greeting.
/// Returns the endpoint URL and the request URI the client connected with.
pub async fn spawn_chat_server(
    user_id: &'static str,
    close_after_hello: bool,
) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (uri_tx, uri_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = |req: &WsRequest, resp: WsResponse| -> Result<WsResponse, ErrorResponse> {
            let _ = uri_tx.send(req.uri().to_string());
            Ok(resp)
        };
        let mut ws = accept_hdr_async(stream, callback).await.unwrap();

        let hello = json!({"system": true, "message": "connected"});
        ws.send(WsMessage::Text(hello.to_string())).await.unwrap();

        if close_after_hello {
            let _ = ws.close(None).await;
            return;
        }

        let mut next_id = 1;
        while let Some(Ok(msg)) = ws.next().await {
            if let WsMessage::Text(text) = msg {
                let envelope: Value = serde_json::from_str(&text).unwrap();
                let reply = json!({
                    "id": format!("srv-{}", next_id),
                    "from": user_id,
                    "to": envelope["to"],
                    "content": envelope["content"],
                    "sentAt": "2024-05-01T10:00:00",
                    "tempId": envelope["tempId"],
                });
                next_id += 1;
                if ws.send(WsMessage::Text(reply.to_string())).await.is_err() {
                    break;
                }
            }
        }
    });

    (format!("ws://{}/ws/chat", addr), uri_rx)
}

/// An address nothing listens on
pub async fn closed_port_addr() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Apply events until `done` holds, failing after five seconds
pub async fn pump_until<F>(view: &mut ConversationView, done: F)
where
    F: Fn(&ConversationView) -> bool,
{
    while !done(view) {
        let event = tokio::time::timeout(Duration::from_secs(5), view.next_event())
            .await
            .expect("Timed out waiting for view event")
            .expect("View event channel closed");
        view.handle(event);
    }
}
