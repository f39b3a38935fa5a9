use super::RelayState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error};

/// A message pushed to live viewers.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveUpdate {
    /// The buffer changed; fetch `/logs` again.
    LogsChanged,
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<RelayState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: RelayState) {
    let (mut sender, mut receiver) = socket.split();
    let mut updates = state.updates();

    let send_task = tokio::spawn(async move {
        loop {
            let update = match updates.recv().await {
                Ok(update) => update,
                // Every update means "refetch", so a lagging client only needs one.
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!("Live viewer lagged by {} updates", n);
                    LiveUpdate::LogsChanged
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            let json = match serde_json::to_string(&update) {
                Ok(j) => j,
                Err(e) => {
                    error!("Failed to serialize live update: {}", e);
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Close(_)) => {
                debug!("Live viewer disconnected");
                break;
            }
            Err(e) => {
                debug!("Live viewer connection error: {}", e);
                break;
            }
            _ => {}
        }
    }

    send_task.abort();
}
