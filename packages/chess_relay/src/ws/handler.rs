//! WebSocket Handler
//!
//! One task per connection: a reader loop feeding the router, and a writer
//! draining the connection's outbox onto the socket.

use axum::extract::ws::{Message, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::game::ConnectionId;
use crate::metrics::ServerMetrics;

use super::protocol::ServerMessage;
use super::router::ConnectionRouter;

/// Serve one game connection until either side closes it.
pub async fn handle_game_ws(
    socket: WebSocket,
    router: Arc<ConnectionRouter>,
    metrics: Arc<ServerMetrics>,
    send_channel_capacity: usize,
) {
    let conn_id = ConnectionId::new();
    info!(conn_id = %conn_id, "New WebSocket connection");
    metrics.connection_opened();

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Outbox: replies and broadcasts for this connection
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(send_channel_capacity.max(1));
    router.connect(conn_id, tx).await;

    // Task to send messages to WebSocket
    let metrics_send = metrics.clone();
    let mut sender_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                metrics_send.websocket_error();
                break;
            }
            metrics_send.message_sent();
        }
    });

    // Read loop. Only the wait for the next frame races the writer; a frame
    // already being dispatched always runs to completion.
    loop {
        let msg = tokio::select! {
            msg = ws_receiver.next() => msg,
            _ = &mut sender_task => {
                debug!(conn_id = %conn_id, "Writer finished, closing connection");
                break;
            }
        };
        match msg {
            Some(Ok(Message::Text(text))) => {
                router.handle_text(conn_id, text.as_str()).await;
            }
            Some(Ok(Message::Binary(bytes))) => {
                router.handle_binary(conn_id, &bytes).await;
            }
            Some(Ok(Message::Close(_))) | None => {
                debug!(conn_id = %conn_id, "Client closed connection");
                break;
            }
            // Ping/pong are answered by axum
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                metrics.websocket_error();
                warn!(conn_id = %conn_id, "WebSocket receive error: {}", e);
                break;
            }
        }
    }

    router.disconnect(conn_id).await;
    // Disconnect dropped the last router-side sender; let queued frames flush
    if !sender_task.is_finished() {
        let _ = sender_task.await;
    }
    metrics.connection_closed();
    info!(conn_id = %conn_id, "WebSocket connection closed");
}
