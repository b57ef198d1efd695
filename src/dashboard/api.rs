//! Dashboard HTTP API
//!
//! REST endpoints and the WebSocket feed for the frontend.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use super::DashboardMemory;
use crate::monitor::{BroadcastSink, MonitorEvent};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Create the API router with all endpoints
pub fn create_router(memory: Arc<DashboardMemory>, broadcaster: BroadcastSink) -> Router {
    Router::new()
        // Main endpoints
        .route("/api/state", get(get_state))
        .route("/api/notices", get(get_notices))
        // WebSocket
        .route("/ws", get(websocket_handler))
        // State
        .with_state((memory, broadcaster))
        // CORS for frontend
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

// ─────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────

/// GET /api/state - Latest snapshot plus recent notices
async fn get_state(
    State((memory, _)): State<(Arc<DashboardMemory>, BroadcastSink)>,
) -> impl IntoResponse {
    let state = memory.get_state().await;
    Json(ApiResponse::success(state))
}

/// GET /api/notices - Recent lifecycle notices only
async fn get_notices(
    State((memory, _)): State<(Arc<DashboardMemory>, BroadcastSink)>,
) -> impl IntoResponse {
    let state = memory.get_state().await;
    Json(ApiResponse::success(state.notices))
}

// ─────────────────────────────────────────────────────────────────
// WebSocket Handler
// ─────────────────────────────────────────────────────────────────

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::Response,
};

/// WebSocket upgrade handler
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State((memory, broadcaster)): State<(Arc<DashboardMemory>, BroadcastSink)>,
) -> Response {
    ws.on_upgrade(move |socket| handle_websocket(socket, memory, broadcaster))
}

/// Outgoing message type for WebSocket
enum OutgoingMessage {
    Text(String),
    Pong(Vec<u8>),
}

/// Handle one WebSocket connection: replay the latest snapshot, then
/// forward everything the monitor broadcasts
async fn handle_websocket(
    socket: WebSocket,
    memory: Arc<DashboardMemory>,
    broadcaster: BroadcastSink,
) {
    use futures_util::{SinkExt, StreamExt};

    tracing::info!("🖥️ New WebSocket connection");

    let (mut sender, mut receiver) = socket.split();

    // Send the latest snapshot so the client does not wait a full cycle
    if let Some(snapshot) = memory.latest_snapshot().await {
        if let Ok(json) = serde_json::to_string(&MonitorEvent::Snapshot(snapshot)) {
            if sender.send(Message::Text(json)).await.is_err() {
                return;
            }
        }
    }

    // Subscribe to broadcasts
    let mut rx = broadcaster.subscribe();

    // Channel for outgoing messages
    let (out_tx, mut out_rx) = tokio::sync::mpsc::channel::<OutgoingMessage>(32);

    // Spawn task to send outgoing messages
    let send_task = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let result = match msg {
                OutgoingMessage::Text(text) => sender.send(Message::Text(text)).await,
                OutgoingMessage::Pong(data) => sender.send(Message::Pong(data)).await,
            };
            if result.is_err() {
                break;
            }
        }
    });

    // Handle incoming messages (ping/pong) and broadcast updates
    loop {
        tokio::select! {
            broadcast_msg = rx.recv() => {
                if let Ok(msg) = broadcast_msg {
                    if out_tx.send(OutgoingMessage::Text(msg)).await.is_err() {
                        break;
                    }
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Ping(data))) => {
                        if out_tx.send(OutgoingMessage::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received WebSocket message: {}", text);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }

    send_task.abort();
    tracing::info!("🖥️ WebSocket connection closed");
}
