//! Realtime connection endpoint
//!
//! One connection = one [`ConnectionHandle`]. The socket is split: a writer
//! task drains the handle's queue into JSON text frames, and the reader loop
//! holds the connection open until the client goes away.

use crate::config::AppState;
use crate::realtime::{ConnectionHandle, EventReceiver};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsQuery {
    pub user_id: Option<String>,
}

/// GET /ws?userId=..
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let user_id = query.user_id.filter(|id| !id.trim().is_empty());
    ws.on_upgrade(move |socket| run_connection(socket, state, user_id))
}

async fn run_connection(socket: WebSocket, state: AppState, user_id: Option<String>) {
    let (sink, mut stream) = socket.split();
    let (handle, rx) = ConnectionHandle::new(user_id);

    let writer = tokio::spawn(writer_task(sink, rx));
    state.hub.on_connect(handle.clone());

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Close(_)) => break,
            Ok(_) => {
                // Inbound traffic goes through the HTTP routes
            }
            Err(e) => {
                debug!("[Realtime] Read error on {}: {}", handle.id(), e);
                break;
            }
        }
    }

    state.hub.on_disconnect(&handle);
    writer.abort();
}

async fn writer_task(mut sink: SplitSink<WebSocket, Message>, mut rx: EventReceiver) {
    while let Some(event) = rx.recv().await {
        let text = match serde_json::to_string(&event) {
            Ok(text) => text,
            Err(e) => {
                warn!("[Realtime] Failed to encode {}: {}", event.kind(), e);
                continue;
            }
        };
        if sink.send(Message::Text(text.into())).await.is_err() {
            break;
        }
    }
}
