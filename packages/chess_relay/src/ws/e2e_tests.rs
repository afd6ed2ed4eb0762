//! End-to-end tests: the real axum server on an ephemeral port, driven by
//! WebSocket clients over TCP.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::config::{FileConfig, ServerConfig};
use crate::{AppState, build_app};

/// Timeout for each async operation in tests.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server() -> SocketAddr {
    let state = AppState::new(ServerConfig::from_file(&FileConfig::default()));
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_app(state)).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr) -> Socket {
    let (socket, _) = timeout(TEST_TIMEOUT, connect_async(format!("ws://{addr}/ws")))
        .await
        .expect("connect timed out")
        .expect("failed to connect");
    socket
}

async fn send(socket: &mut Socket, json: serde_json::Value) {
    socket
        .send(Message::text(json.to_string()))
        .await
        .expect("send failed");
}

/// Next text frame, parsed.
async fn recv(socket: &mut Socket) -> serde_json::Value {
    loop {
        let msg = timeout(TEST_TIMEOUT, socket.next())
            .await
            .expect("recv timed out")
            .expect("stream ended")
            .expect("websocket error");
        if msg.is_text() {
            return serde_json::from_str(msg.to_text().unwrap()).expect("invalid JSON");
        }
    }
}

async fn http_get(addr: SocketAddr, path: &str) -> serde_json::Value {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n").as_bytes())
        .await
        .unwrap();
    let mut response = String::new();
    timeout(TEST_TIMEOUT, stream.read_to_string(&mut response))
        .await
        .expect("http timed out")
        .unwrap();
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    let body = response.split("\r\n\r\n").nth(1).unwrap();
    serde_json::from_str(body).unwrap()
}

/// Create a game on one socket and join it from another.
async fn start_game(addr: SocketAddr) -> (Socket, Socket, String) {
    let mut white = connect(addr).await;
    send(&mut white, serde_json::json!({"type": "CREATE_GAME"})).await;
    let created = recv(&mut white).await;
    assert_eq!(created["type"], "GAME_CREATED");
    assert_eq!(created["color"], "white");
    let game_id = created["gameId"].as_str().unwrap().to_string();

    let mut black = connect(addr).await;
    send(
        &mut black,
        serde_json::json!({"type": "JOIN_GAME", "gameId": game_id.to_lowercase()}),
    )
    .await;
    let joined = recv(&mut black).await;
    assert_eq!(joined["type"], "GAME_JOINED");
    assert_eq!(joined["color"], "black");

    let white_start = recv(&mut white).await;
    let black_start = recv(&mut black).await;
    assert_eq!(white_start["type"], "GAME_START");
    assert_eq!(white_start, black_start);

    (white, black, game_id)
}

#[tokio::test]
async fn test_e2e_create_join_and_move() {
    let addr = start_server().await;
    let (mut white, mut black, _) = start_game(addr).await;

    send(&mut white, serde_json::json!({"type": "MOVE", "move": "e2e4"})).await;
    let to_white = recv(&mut white).await;
    let to_black = recv(&mut black).await;
    assert_eq!(to_white, to_black);
    assert_eq!(to_white["type"], "MOVE");
    assert_eq!(to_white["move"]["san"], "e4");
    assert_eq!(to_white["move"]["color"], "white");
    assert_eq!(to_white["state"]["turn"], "black");
}

#[tokio::test]
async fn test_e2e_fools_mate() {
    let addr = start_server().await;
    let (mut white, mut black, _) = start_game(addr).await;

    let moves = [
        serde_json::json!({"from": "f2", "to": "f3"}),
        serde_json::json!("e5"),
        serde_json::json!("g2g4"),
        serde_json::json!("Qh4#"),
    ];
    for (i, mv) in moves.into_iter().enumerate() {
        let mover = if i % 2 == 0 { &mut white } else { &mut black };
        send(mover, serde_json::json!({"type": "MOVE", "move": mv})).await;
        assert_eq!(recv(&mut white).await["type"], "MOVE");
        assert_eq!(recv(&mut black).await["type"], "MOVE");
    }

    for socket in [&mut white, &mut black] {
        let over = recv(socket).await;
        assert_eq!(over["type"], "GAME_OVER");
        assert_eq!(over["result"], "black");
        assert_eq!(over["reason"], "checkmate");
    }
}

#[tokio::test]
async fn test_e2e_mate_then_drop_still_ends_game() {
    let addr = start_server().await;
    let (mut white, mut black, _) = start_game(addr).await;

    for (i, mv) in ["f2f3", "e7e5", "g2g4"].into_iter().enumerate() {
        let mover = if i % 2 == 0 { &mut white } else { &mut black };
        send(mover, serde_json::json!({"type": "MOVE", "move": mv})).await;
        assert_eq!(recv(&mut white).await["type"], "MOVE");
        assert_eq!(recv(&mut black).await["type"], "MOVE");
    }

    // Mate and vanish without a close handshake
    send(&mut black, serde_json::json!({"type": "MOVE", "move": "Qh4#"})).await;
    drop(black);

    assert_eq!(recv(&mut white).await["type"], "MOVE");
    let over = recv(&mut white).await;
    assert_eq!(over["type"], "GAME_OVER");
    assert_eq!(over["reason"], "checkmate");
    assert_eq!(recv(&mut white).await["type"], "PLAYER_DISCONNECTED");
}

#[tokio::test]
async fn test_e2e_errors_reach_sender_only() {
    let addr = start_server().await;
    let (mut white, mut black, _) = start_game(addr).await;

    send(&mut black, serde_json::json!({"type": "MOVE", "move": "e7e5"})).await;
    let err = recv(&mut black).await;
    assert_eq!(err["type"], "ERROR");
    assert_eq!(err["message"], "Not your turn");

    black.send(Message::text("hello")).await.unwrap();
    assert_eq!(recv(&mut black).await["message"], "Invalid message format");

    black
        .send(Message::binary(br#"{"type":"GET_STATE"}"#.to_vec()))
        .await
        .unwrap();
    let state = recv(&mut black).await;
    assert_eq!(state["type"], "STATE");
    assert_eq!(state["state"]["turn"], "white");

    // White saw none of it
    send(&mut white, serde_json::json!({"type": "GET_STATE"})).await;
    assert_eq!(recv(&mut white).await["type"], "STATE");
}

#[tokio::test]
async fn test_e2e_disconnect() {
    let addr = start_server().await;
    let (mut white, mut black, game_id) = start_game(addr).await;

    white.close(None).await.unwrap();
    let notice = recv(&mut black).await;
    assert_eq!(notice["type"], "PLAYER_DISCONNECTED");
    assert_eq!(notice["message"], "Opponent disconnected");

    black.close(None).await.unwrap();

    // The game disappears once the last player has gone
    let mut games = 1;
    for _ in 0..100 {
        games = http_get(addr, "/health").await["games"].as_u64().unwrap();
        if games == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(games, 0);

    let mut late = connect(addr).await;
    send(
        &mut late,
        serde_json::json!({"type": "JOIN_GAME", "gameId": game_id}),
    )
    .await;
    assert_eq!(recv(&mut late).await["message"], "Game not found");
}

#[tokio::test]
async fn test_e2e_health_endpoints() {
    let addr = start_server().await;
    let (_white, _black, _) = start_game(addr).await;

    let health = http_get(addr, "/health").await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["games"], 1);
    assert_eq!(health["connections"], 2);
    assert!(health["uptimeSecs"].is_u64());

    let live = http_get(addr, "/health/live").await;
    assert_eq!(live["status"], "alive");

    let metrics = http_get(addr, "/metrics").await;
    assert_eq!(metrics["games"]["created"], 1);
    assert_eq!(metrics["connections"]["active"], 2);
}
