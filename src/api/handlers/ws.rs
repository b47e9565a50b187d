//! WebSocket endpoint streaming progress events to one client.

use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(client_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    info!(client_id, "websocket upgrade requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state, client_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, client_id: String) {
    let (mut sender, mut receiver) = socket.split();
    let mut sub = state.publisher.register(&client_id);

    loop {
        tokio::select! {
            event = sub.recv() => {
                match event {
                    Some(event) => {
                        let payload = match serde_json::to_string(&event) {
                            Ok(json) => json,
                            Err(e) => {
                                debug!(client_id, error = %e, "unserializable event, dropping");
                                continue;
                            }
                        };
                        if sender.send(Message::Text(payload.into())).await.is_err() {
                            info!(client_id, "websocket client disconnected");
                            break;
                        }
                    }
                    // Channel replaced by a reconnect under the same id.
                    None => break,
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        info!(client_id, "websocket closed by client");
                        break;
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = sender.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(_)) => {
                        // Client messages are not part of the protocol.
                    }
                    Some(Err(e)) => {
                        debug!(client_id, error = %e, "websocket receive error");
                        break;
                    }
                }
            }
        }
    }

    state.publisher.unregister(&sub);
}
