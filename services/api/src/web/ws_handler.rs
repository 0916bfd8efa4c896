//! services/api/src/web/ws_handler.rs
//!
//! The WebSocket endpoint. Each connection gets a forwarding task that relays
//! broadcast progression and sync events, while the main loop handles the
//! client's own messages.

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tokio::sync::{broadcast::error::RecvError, Mutex};
use tracing::{debug, error, info, warn};

type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("New WebSocket connection established");

    let (sender, mut receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(sender));

    // --- 1. Event Forwarding ---
    let forward_task = {
        let ws_sender = ws_sender.clone();
        let mut events = app_state.events.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(msg) => {
                        if !send(&ws_sender, &msg).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("WebSocket client lagged; {} events dropped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    };

    // --- 2. Main Message Loop ---
    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                handle_text_message(text.as_str(), &app_state, &ws_sender).await
            }
            Ok(Message::Close(_)) => {
                info!("Client sent close message.");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    // --- 3. Cleanup ---
    forward_task.abort();
    info!("WebSocket connection closed.");
}

async fn handle_text_message(text: &str, app_state: &AppState, ws_sender: &WsSender) {
    let reply = match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Toggle { id }) => {
            match app_state
                .mutate(|store| store.toggle_quest_or_habit(id))
                .await
            {
                Ok(completed) => ServerMessage::Toggled { id, completed },
                Err(e) => {
                    warn!("Toggle over WebSocket rejected: {}", e);
                    ServerMessage::Error {
                        message: e.to_string(),
                    }
                }
            }
        }
        Ok(ClientMessage::Ping) => ServerMessage::Pong,
        Err(e) => {
            debug!("Unparseable client message: {}", e);
            ServerMessage::Error {
                message: format!("Invalid message: {}", e),
            }
        }
    };
    send(ws_sender, &reply).await;
}

/// Serializes and sends one message. Returns `false` once the socket is gone.
async fn send(ws_sender: &WsSender, msg: &ServerMessage) -> bool {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            return true;
        }
    };
    ws_sender
        .lock()
        .await
        .send(Message::Text(json.into()))
        .await
        .is_ok()
}
