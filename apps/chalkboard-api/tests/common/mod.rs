#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::time;

use chalkboard_api::config::Config;
use chalkboard_api::db::notes::MemoryNoteStore;
use chalkboard_api::AppState;

/// Test configuration: bundled static files, no heartbeat, short timeouts.
pub fn test_config() -> Config {
    Config {
        port: 0,
        static_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("static"),
        write_timeout: Duration::from_millis(200),
        heartbeat_interval: None,
        ..Config::default()
    }
}

/// Build a test AppState over an empty in-memory store, with the hub running.
pub fn test_state() -> AppState {
    AppState::start(test_config(), Arc::new(MemoryNoteStore::new())).0
}

/// Build the full application router wired to a fresh test state.
pub fn test_app() -> (Router, AppState) {
    let state = test_state();
    let app = chalkboard_api::routes::router(&state.config).with_state(state.clone());
    (app, state)
}

/// Start an actual TCP server, needed for streaming responses.
/// The server runs in the background.
pub async fn start_server() -> (SocketAddr, AppState) {
    let (app, state) = test_app();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    (addr, state)
}

/// One parsed server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub kind: String,
    pub data: String,
}

impl SseEvent {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.data).expect("event data is JSON")
    }
}

/// Minimal `text/event-stream` reader over a live HTTP response.
pub struct EventReader {
    response: reqwest::Response,
    buffer: String,
}

impl EventReader {
    /// Open `/events`. Returns once the response headers arrived, which means
    /// the subscriber is registered with the hub.
    pub async fn connect(addr: SocketAddr) -> Self {
        Self::connect_to(addr, "/events").await
    }

    /// Open the event stream at `path`, e.g. `/boards/things/events`.
    pub async fn connect_to(addr: SocketAddr, path: &str) -> Self {
        let response = reqwest::Client::new()
            .get(format!("http://{addr}{path}"))
            .send()
            .await
            .expect("subscribe request");
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );
        Self {
            response,
            buffer: String::new(),
        }
    }

    /// Open `/events` and consume the greeting.
    pub async fn connect_greeted(addr: SocketAddr) -> Self {
        Self::connect_greeted_to(addr, "/events").await
    }

    pub async fn connect_greeted_to(addr: SocketAddr, path: &str) -> Self {
        let mut reader = Self::connect_to(addr, path).await;
        let hello = reader.next_event().await;
        assert_eq!(hello.kind, "hello");
        assert_eq!(hello.data, "\"keep alive\"");
        reader
    }

    /// Next event, skipping comment frames. Panics after five seconds.
    pub async fn next_event(&mut self) -> SseEvent {
        time::timeout(Duration::from_secs(5), self.read_event())
            .await
            .expect("timed out waiting for event")
    }

    /// `None` if nothing arrives within `wait`.
    pub async fn try_next_event(&mut self, wait: Duration) -> Option<SseEvent> {
        time::timeout(wait, self.read_event()).await.ok()
    }

    /// Read until the server ends the stream.
    pub async fn wait_closed(&mut self) {
        while let Ok(Some(_)) = self.response.chunk().await {}
    }

    async fn read_event(&mut self) -> SseEvent {
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let frame: String = self.buffer.drain(..end + 2).collect();
                if let Some(event) = parse_frame(&frame) {
                    return event;
                }
                continue;
            }
            let chunk = self
                .response
                .chunk()
                .await
                .expect("read chunk")
                .expect("stream ended");
            self.buffer.push_str(std::str::from_utf8(&chunk).expect("utf-8"));
        }
    }
}

fn parse_frame(frame: &str) -> Option<SseEvent> {
    let mut kind = None;
    let mut data = None;
    for line in frame.lines() {
        if let Some(rest) = line.strip_prefix("event: ") {
            kind = Some(rest.to_string());
        } else if let Some(rest) = line.strip_prefix("data: ") {
            data = Some(rest.to_string());
        }
    }
    Some(SseEvent {
        kind: kind?,
        data: data?,
    })
}

/// POST a mutation form to the default board.
pub async fn post_form(addr: SocketAddr, fields: &[(&str, &str)]) -> reqwest::Response {
    post_form_to(addr, "/", fields).await
}

/// POST a mutation form to the board page at `path`.
pub async fn post_form_to(
    addr: SocketAddr,
    path: &str,
    fields: &[(&str, &str)],
) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://{addr}{path}"))
        .form(fields)
        .send()
        .await
        .expect("mutate request")
}

/// Create a note and return the server's JSON answer.
pub async fn create_note(addr: SocketAddr, note: &str, x: i64, y: i64) -> serde_json::Value {
    let (x, y) = (x.to_string(), y.to_string());
    let resp = post_form(addr, &[("action", "add"), ("note", note), ("x", &x), ("y", &y)]).await;
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    resp.json().await.expect("created note JSON")
}

/// Poll the hub until it reports `expected` subscribers.
pub async fn wait_for_subscribers(state: &AppState, expected: usize) {
    for _ in 0..100 {
        if state.hub.subscriber_count().await.unwrap() == expected {
            return;
        }
        time::sleep(Duration::from_millis(20)).await;
    }
    panic!("hub never reached {expected} subscribers");
}
