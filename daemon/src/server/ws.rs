//! WebSocket notification stream

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::notify::broadcaster::Broadcaster;
use crate::server::state::ServerState;

/// Upgrade to a WebSocket that receives every app event as a JSON text frame
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<ServerState>>) -> Response {
    let broadcaster = state.broadcaster.clone();
    ws.on_upgrade(move |socket| stream_events(socket, broadcaster))
}

async fn stream_events(mut socket: WebSocket, broadcaster: Arc<Broadcaster>) {
    let Some(mut events) = broadcaster.subscribe() else {
        let _ = socket.send(Message::Close(None)).await;
        return;
    };
    debug!("Notification client connected ({} total)", broadcaster.client_count());

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to serialize {} event: {}", event.event, e);
                            continue;
                        }
                    };
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Notification client lagged, {} events dropped", skipped);
                }
                Err(RecvError::Closed) => {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    debug!("Notification client disconnected");
}
