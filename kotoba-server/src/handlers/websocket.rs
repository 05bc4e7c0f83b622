//! `GET /ws` (spec §4.3, §6). Grounded on
//! `ferrex-server/src/handlers/handle_websocket.rs`'s upgrade/split
//! pattern, adapted to bridge the Event Bus instead of the teacher's
//! room broadcast.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::StreamExt;

use crate::state::AppState;

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let Some(connection_id) = state.connections.try_connect() else {
        let _ = socket
            .send(Message::Close(Some(axum::extract::ws::CloseFrame {
                code: 1008,
                reason: "Maximum connections reached".into(),
            })))
            .await;
        return;
    };

    let mut events = Box::pin(state.events.subscribe());

    loop {
        tokio::select! {
            event = events.next() => {
                match event {
                    Some(event) => {
                        if event.is_shutdown() {
                            let _ = socket.close().await;
                            break;
                        }
                        let Ok(payload) = serde_json::to_string(&event) else { continue };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    state.connections.disconnect(connection_id);
}
