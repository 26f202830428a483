use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use tracing::{info, warn};

use crate::state::AppState;

/// A subscriber sending nothing for this long is considered gone.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

pub async fn ws_handler(
    Path(route_id): Path<i64>,
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, route_id))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, route_id: i64) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.bus.subscribe(route_id);

    info!(route_id, "route subscriber connected");

    // A lagged receiver returns an error here, which disconnects the slow
    // subscriber instead of stalling the publisher.
    let mut send_task = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize route event for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Inbound frames are liveness tokens; their content is ignored.
    let mut recv_task = tokio::spawn(async move {
        loop {
            match tokio::time::timeout(IDLE_TIMEOUT, receiver.next()).await {
                Ok(Some(Ok(_msg))) => {}
                _ => break,
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!(route_id, "route subscriber disconnected");
}
