use std::sync::Arc;

use position_engine::{
    AppliedMove, ChessEngine, EngineError, GameStatus, MoveInput, PositionEngine, Side,
};
use tokio::sync::mpsc;

use crate::game::{ConnectionId, EngineFactory, Outbox, SessionRegistry};
use crate::metrics::ServerMetrics;
use crate::ws::{ConnectionRouter, ServerMessage};

/// An outbox with room for every message a test scenario produces.
pub fn outbox() -> (Outbox, mpsc::Receiver<ServerMessage>) {
    mpsc::channel(64)
}

/// Router over a standard-chess registry with fresh metrics.
pub fn test_router() -> ConnectionRouter {
    ConnectionRouter::new(
        Arc::new(SessionRegistry::new()),
        Arc::new(ServerMetrics::new()),
    )
}

/// Every game starts from `fen`.
pub fn engine_from_fen(fen: &'static str) -> EngineFactory {
    Arc::new(move || -> Box<dyn PositionEngine> {
        Box::new(ChessEngine::from_fen(fen).expect("valid test FEN"))
    })
}

/// A connection driven directly against the router, with its outbox exposed.
pub struct Client {
    pub id: ConnectionId,
    rx: mpsc::Receiver<ServerMessage>,
}

impl Client {
    pub async fn connect(router: &ConnectionRouter) -> Self {
        let id = ConnectionId::new();
        let (tx, rx) = outbox();
        router.connect(id, tx).await;
        Self { id, rx }
    }

    pub async fn send(&mut self, router: &ConnectionRouter, text: &str) {
        router.handle_text(self.id, text).await;
    }

    /// Next queued message. Everything the router sends is queued before
    /// `handle_text` returns, so no waiting is needed.
    pub fn next(&mut self) -> Option<ServerMessage> {
        self.rx.try_recv().ok()
    }

    /// Next message, which must be an `ERROR`; returns its text.
    pub fn error(&mut self) -> String {
        match self.next() {
            Some(ServerMessage::Error { message }) => message,
            other => panic!("Expected Error, got {other:?}"),
        }
    }

    pub fn drain(&mut self) -> Vec<ServerMessage> {
        std::iter::from_fn(|| self.next()).collect()
    }

    pub fn is_idle(&mut self) -> bool {
        self.rx.try_recv().is_err()
    }

    /// Close the outbox as a dead transport would; later sends to it fail.
    pub fn hang_up(&mut self) {
        self.rx.close();
    }
}

/// Engine that accepts any move and reports a chosen status.
pub struct ScriptedEngine {
    status: GameStatus,
    /// Status adopted after the first accepted move.
    after_move: GameStatus,
    turn: Side,
}

impl ScriptedEngine {
    /// Reports `status` from the start.
    pub fn new(status: GameStatus) -> Self {
        Self {
            status,
            after_move: status,
            turn: Side::White,
        }
    }

    /// Ongoing until one move is played, then `status`.
    pub fn ending_with(status: GameStatus) -> Self {
        Self {
            status: GameStatus::Ongoing,
            after_move: status,
            turn: Side::White,
        }
    }
}

impl PositionEngine for ScriptedEngine {
    fn apply_move(&mut self, mv: &MoveInput) -> Result<AppliedMove, EngineError> {
        if self.status.is_over() {
            return Err(EngineError::GameOver);
        }
        let token = mv.to_string();
        if token.len() < 4 || !token.is_ascii() {
            return Err(EngineError::InvalidNotation(token));
        }
        let applied = AppliedMove {
            color: self.turn,
            from: token[0..2].to_string(),
            to: token[2..4].to_string(),
            promotion: None,
            san: token.clone(),
            uci: token,
        };
        self.turn = self.turn.opposite();
        self.status = self.after_move;
        Ok(applied)
    }

    fn side_to_move(&self) -> Side {
        self.turn
    }

    fn status(&self) -> GameStatus {
        self.status
    }

    fn is_check(&self) -> bool {
        self.status == GameStatus::Checkmate
    }

    fn board(&self) -> String {
        format!("scripted {}", self.turn)
    }
}
