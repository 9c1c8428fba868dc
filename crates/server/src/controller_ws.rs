//! The controller channel's WebSocket transport: an `axum` upgrade handler
//! plus the [`ControllerSink`] adapter the events crate sends envelopes
//! through, keeping `resonance-events` itself transport-agnostic.
//!
//! Grounded in the teacher's `websocket.rs` handler shape and
//! `original_source/backend/events/websocket.py`.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use resonance_events::ControllerSink;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::state::AppState;

pub async fn events_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

#[derive(Deserialize)]
struct HelloFrame {
    #[serde(rename = "type")]
    frame_type: String,
    #[serde(default)]
    client: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sink, mut receiver) = socket.split();
    let shared_sink = Arc::new(Mutex::new(sink));

    state
        .orchestrator
        .attach_controller(Box::new(AxumControllerSink { sink: shared_sink.clone() }))
        .await;

    // The only thing this connection ever reads is an optional hello frame
    // (spec §6); everything else server->client flows exclusively through
    // the orchestrator's controller-sink handle above.
    while let Some(Ok(message)) = receiver.next().await {
        match message {
            Message::Text(text) => {
                let Ok(hello) = serde_json::from_str::<HelloFrame>(&text) else { continue };
                if hello.frame_type != "hello" {
                    continue;
                }
                info!(client = ?hello.client, version = ?hello.version, "controller hello received");
                let ack = json!({
                    "type": "hello.ack",
                    "server": "resonance-server",
                    "version": env!("CARGO_PKG_VERSION"),
                });
                let mut guard = shared_sink.lock().await;
                if let Err(err) = guard.send(Message::Text(ack.to_string())).await {
                    warn!(%err, "failed to send hello.ack");
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}

/// Wraps the sending half of an `axum` WebSocket so `resonance-events` can
/// drive it through [`ControllerSink`] without depending on `axum` itself.
/// Shares its sink with the hello/hello.ack handler above via the same
/// `Arc<Mutex<..>>` so both writers serialize on one connection.
struct AxumControllerSink {
    sink: Arc<Mutex<SplitSink<WebSocket, Message>>>,
}

#[async_trait::async_trait]
impl ControllerSink for AxumControllerSink {
    async fn send_text(&mut self, text: String) -> bool {
        self.sink.lock().await.send(Message::Text(text)).await.is_ok()
    }

    async fn close(&mut self, code: u16, reason: &str) {
        let frame = CloseFrame { code, reason: reason.to_string().into() };
        if let Err(err) = self.sink.lock().await.send(Message::Close(Some(frame))).await {
            warn!(%err, "failed to send close frame to replaced controller socket");
        }
    }
}
