//! Shared helpers for server integration tests.

#![allow(dead_code)]

use chatloop_server::config::UserEntry;
use chatloop_server::{build_router, AppState, Config};
use futures_util::stream::SplitStream;
use futures_util::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub type WsRead = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub base_url: String,
    pub state: Arc<AppState>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/ws?token={}", self.addr, token)
    }
}

pub fn test_config() -> Config {
    let users = ["alice", "bob", "carol"]
        .iter()
        .map(|id| UserEntry {
            id: id.to_string(),
            name: format!("{}{}", id[..1].to_uppercase(), &id[1..]),
            token: token(id),
        })
        .collect();

    let mut config = Config {
        host: "127.0.0.1".into(),
        port: 0,
        users,
        ..Config::default()
    };
    config.metrics.enabled = false;
    config
}

pub fn token(user: &str) -> String {
    format!("token-{user}")
}

/// Start the app on an ephemeral port.
pub async fn start_server(config: Config) -> TestServer {
    let state = Arc::new(AppState::from_config(config).expect("Failed to build state"));
    let app = build_router(Arc::clone(&state));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        addr,
        base_url: format!("http://{}", addr),
        state,
    }
}

/// Read JSON text frames until one carries `event`, with a timeout.
pub async fn next_event(read: &mut WsRead, event: &str) -> serde_json::Value {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let msg = tokio::time::timeout_at(deadline, read.next())
            .await
            .unwrap_or_else(|_| panic!("Timed out waiting for {event}"))
            .expect("WebSocket closed")
            .expect("WebSocket error");

        if let Message::Text(text) = msg {
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            if value["event"] == event {
                return value["data"].clone();
            }
        }
    }
}

/// Assert that no frame carrying `event` arrives within `wait`.
pub async fn assert_no_event(read: &mut WsRead, event: &str, wait: Duration) {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        match tokio::time::timeout_at(deadline, read.next()).await {
            Err(_) => return,
            Ok(Some(Ok(Message::Text(text)))) => {
                let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                assert_ne!(value["event"], event, "Unexpected {event}: {value}");
            }
            Ok(Some(Ok(_))) => {}
            Ok(_) => return,
        }
    }
}
