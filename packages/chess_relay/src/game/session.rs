//! One game: two participant slots, the position engine, and fan-out.

use chrono::{DateTime, Utc};
use position_engine::{AppliedMove, EngineError, GameStatus, MoveInput, PositionEngine, Side};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use super::{ConnectionId, GameId};
use crate::ws::ServerMessage;

/// Outbound queue of a single connection.
pub type Outbox = mpsc::Sender<ServerMessage>;

/// Serializable view of a position, taken at call time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    /// FEN
    pub board: String,
    pub turn: Side,
    pub is_game_over: bool,
    pub is_check: bool,
    pub is_checkmate: bool,
    pub is_draw: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
    White,
    Black,
    Draw,
}

impl From<Side> for GameResult {
    fn from(side: Side) -> Self {
        match side {
            Side::White => Self::White,
            Side::Black => Self::Black,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndReason {
    Checkmate,
    Draw,
    Stalemate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOutcome {
    pub result: GameResult,
    pub reason: EndReason,
}

impl GameSnapshot {
    /// Outcome of a terminal position; `None` while the game is running.
    ///
    /// Checkmate is checked first, then the draw flag; any other terminal
    /// position is reported as stalemate.
    pub fn outcome(&self) -> Option<GameOutcome> {
        if !self.is_game_over {
            return None;
        }
        let outcome = if self.is_checkmate {
            GameOutcome {
                result: self.turn.opposite().into(),
                reason: EndReason::Checkmate,
            }
        } else if self.is_draw {
            GameOutcome {
                result: GameResult::Draw,
                reason: EndReason::Draw,
            }
        } else {
            GameOutcome {
                result: GameResult::Draw,
                reason: EndReason::Stalemate,
            }
        };
        Some(outcome)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    #[error("game is full")]
    Full,
    #[error("side {0} is already taken")]
    SideTaken(Side),
}

/// A connection seated in a game.
#[derive(Debug)]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub side: Side,
    outbox: Outbox,
}

pub struct Session {
    id: GameId,
    participants: Vec<Participant>,
    engine: Box<dyn PositionEngine>,
    created_at: DateTime<Utc>,
    /// Set once removed from the registry.
    retired: bool,
}

impl Session {
    pub fn new(id: GameId, engine: Box<dyn PositionEngine>) -> Self {
        Self {
            id,
            participants: Vec::with_capacity(2),
            engine,
            created_at: Utc::now(),
            retired: false,
        }
    }

    pub fn id(&self) -> &GameId {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn bind(
        &mut self,
        connection_id: ConnectionId,
        side: Side,
        outbox: Outbox,
    ) -> Result<(), BindError> {
        if self.is_full() {
            return Err(BindError::Full);
        }
        if self.participants.iter().any(|p| p.side == side) {
            return Err(BindError::SideTaken(side));
        }
        self.participants.push(Participant {
            connection_id,
            side,
            outbox,
        });
        Ok(())
    }

    /// Remove a connection. Returns false if it was not seated here.
    pub fn unbind(&mut self, connection_id: ConnectionId) -> bool {
        let before = self.participants.len();
        self.participants
            .retain(|p| p.connection_id != connection_id);
        self.participants.len() != before
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() == 2
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// First unassigned side in seating order.
    pub fn vacant_side(&self) -> Option<Side> {
        Side::SEATING
            .into_iter()
            .find(|side| !self.participants.iter().any(|p| p.side == *side))
    }

    pub fn side_of(&self, connection_id: ConnectionId) -> Option<Side> {
        self.participants
            .iter()
            .find(|p| p.connection_id == connection_id)
            .map(|p| p.side)
    }

    /// Delegate to the engine. Turn ownership is the caller's concern.
    pub fn apply_move(&mut self, mv: &MoveInput) -> Result<AppliedMove, EngineError> {
        self.engine.apply_move(mv)
    }

    pub fn side_to_move(&self) -> Side {
        self.engine.side_to_move()
    }

    /// Outcome once the position is terminal.
    pub fn game_over(&self) -> Option<GameOutcome> {
        self.snapshot().outcome()
    }

    pub fn snapshot(&self) -> GameSnapshot {
        let status = self.engine.status();
        GameSnapshot {
            board: self.engine.board(),
            turn: self.engine.side_to_move(),
            is_game_over: status.is_over(),
            is_check: self.engine.is_check(),
            is_checkmate: status == GameStatus::Checkmate,
            is_draw: status == GameStatus::Draw,
        }
    }

    /// Deliver one copy of `message` to every participant whose connection is
    /// still open. Closed connections are skipped; the disconnect path cleans
    /// them up. Returns the number of deliveries.
    pub async fn broadcast(&self, message: ServerMessage) -> usize {
        let mut delivered = 0;
        for participant in &self.participants {
            if participant.outbox.is_closed() {
                debug!(
                    game_id = %self.id,
                    conn_id = %participant.connection_id,
                    "Skipping closed participant"
                );
                continue;
            }
            if participant.outbox.send(message.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    pub(crate) fn retire(&mut self) {
        self.retired = true;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("participants", &self.participants)
            .field("created_at", &self.created_at)
            .field("retired", &self.retired)
            .finish_non_exhaustive()
    }
}
