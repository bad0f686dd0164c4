//! WebSocket Subscriber Endpoint
//!
//! Each accepted connection becomes a subscriber that receives a full cache
//! snapshot after every committed write. The connection is push-only: frames
//! sent by the client are read and discarded.
//!
//! A connection moves through `Connecting -> Registered -> Receiving* -> Closed`.
//! It is registered once the upgrade completes and unregistered as soon as
//! either half of the socket finishes. Ids are not reused, so a closed
//! connection can never re-enter the registry.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::api::AppState;
use crate::broadcast::{Payload, SubscriberId};

/// Handler for GET /ws
///
/// Upgrades the connection and hands it to the subscriber loop.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (id, outbound) = state.subscribers.register(state.subscriber_buffer);
    info!("Subscriber {} connected", id);

    let (sink, stream) = socket.split();
    let mut writer = tokio::spawn(forward_pushes(id, sink, outbound));
    let mut reader = tokio::spawn(discard_inbound(id, stream));

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    state.subscribers.remove(id);
    info!("Subscriber {} disconnected", id);
}

/// Writes queued snapshots to the socket until the queue closes or a send fails.
///
/// The queue closes when the fan-out step unregisters this subscriber.
async fn forward_pushes(
    id: SubscriberId,
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Payload>,
) {
    while let Some(payload) = outbound.recv().await {
        if let Err(e) = sink.send(Message::Text(payload.to_string())).await {
            debug!("Send to {} failed: {}", id, e);
            return;
        }
    }
    if let Err(e) = sink.close().await {
        debug!("Close of {} failed: {}", id, e);
    }
}

async fn discard_inbound(id: SubscriberId, mut stream: SplitStream<WebSocket>) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Read from {} failed: {}", id, e);
                break;
            }
        }
    }
}
