//! WebSocket Protocol Types
//!
//! Message types for client-server communication. Every frame is a JSON
//! object with a SCREAMING_SNAKE_CASE `type` tag and camelCase fields.

use position_engine::{AppliedMove, MoveInput, Side};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::game::{EndReason, GameId, GameResult, GameSnapshot};

/// Messages sent FROM the client TO the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    /// Start a new game and take the first side
    CreateGame,
    /// Take the free side of an existing game
    JoinGame { game_id: GameId },
    /// Play a move in the bound game
    Move {
        #[serde(rename = "move")]
        mv: MoveInput,
    },
    /// Request the current position
    GetState,
}

/// Messages sent FROM the server TO the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// Unicast to the creator
    GameCreated {
        game_id: GameId,
        color: Side,
        state: GameSnapshot,
    },
    /// Unicast to the joiner, ahead of `GameStart`
    GameJoined { game_id: GameId, color: Side },
    /// Broadcast once both sides are seated
    GameStart { state: GameSnapshot },
    /// Broadcast after every accepted move
    Move {
        #[serde(rename = "move")]
        mv: AppliedMove,
        state: GameSnapshot,
    },
    /// Broadcast after the move that ended the game
    GameOver {
        result: GameResult,
        reason: EndReason,
    },
    /// Unicast reply to `GetState`
    State { state: GameSnapshot },
    /// Broadcast to whoever is left when a participant drops
    PlayerDisconnected { message: String },
    /// Unicast failure reply
    Error { message: String },
}

const CLIENT_MESSAGE_TYPES: [&str; 4] = ["CREATE_GAME", "JOIN_GAME", "MOVE", "GET_STATE"];

/// Inbound decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Not JSON, not an object, no string `type`, or bad fields for a known type.
    #[error("Invalid message format")]
    InvalidFormat,
    #[error("Unknown message type")]
    UnknownType(String),
}

/// Decode one inbound frame, separating unknown types from malformed input.
pub fn decode_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    let value: Value = serde_json::from_str(text).map_err(|_| ProtocolError::InvalidFormat)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::InvalidFormat)?;
    if !CLIENT_MESSAGE_TYPES.contains(&kind) {
        return Err(ProtocolError::UnknownType(kind.to_string()));
    }
    serde_json::from_value(value).map_err(|_| ProtocolError::InvalidFormat)
}
