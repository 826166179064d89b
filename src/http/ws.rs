//! `GET /api/events/stream` (§6): server-push only. Each connection
//! subscribes to the broadcaster, forwards every payload it receives as a
//! binary WebSocket frame, and drains (and ignores) anything the client
//! sends. Modeled on `ferrex-server`'s `handle_websocket` split-sink pattern.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tracing::debug;

use crate::http::AppState;

pub async fn stream_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (id, mut rx) = state.broadcaster.subscribe();
    let (mut sink, mut stream) = socket.split();

    let forward = async {
        while let Some(payload) = rx.recv().await {
            if sink.send(Message::Binary(payload)).await.is_err() {
                break;
            }
        }
    };

    let drain = async {
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    };

    tokio::select! {
        _ = forward => {}
        _ = drain => {}
    }

    state.broadcaster.unsubscribe(id);
    debug!(%id, "websocket subscriber disconnected");
}
