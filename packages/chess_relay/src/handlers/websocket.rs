use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};

use crate::AppState;
use crate::ws;

/// Game WebSocket handler - one connection per player
pub async fn game_websocket_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let router = state.router.clone();
    let metrics = state.metrics.clone();
    let capacity = state.server_config.websocket.send_channel_capacity;

    ws.on_upgrade(move |socket| ws::handle_game_ws(socket, router, metrics, capacity))
}
