//! Position Engine - move validation and game-termination rules
//!
//! This crate owns the rules of the game and nothing else. It has no
//! networking and no knowledge of sessions or participants. Callers hold a
//! [`PositionEngine`] and feed it candidate moves; the engine either accepts
//! a move (and advances the position) or rejects it without changing anything.
//!
//! # Example
//!
//! ```
//! use position_engine::{ChessEngine, GameStatus, MoveInput, PositionEngine, Side};
//!
//! let mut engine = ChessEngine::new();
//! assert_eq!(engine.side_to_move(), Side::White);
//!
//! let applied = engine.apply_move(&MoveInput::notation("e2e4")).unwrap();
//! assert_eq!(applied.san, "e4");
//! assert_eq!(engine.side_to_move(), Side::Black);
//! assert_eq!(engine.status(), GameStatus::Ongoing);
//! ```

mod engine;
mod error;
mod types;

pub use engine::ChessEngine;
pub use error::EngineError;
pub use types::{AppliedMove, GameStatus, MoveInput, Side};

/// Capability interface over a two-sided, turn-based rules engine.
///
/// Implementations must leave the position untouched when they reject a move.
pub trait PositionEngine: Send + Sync {
    /// Validate `mv` against the current position and apply it.
    fn apply_move(&mut self, mv: &MoveInput) -> Result<AppliedMove, EngineError>;

    /// The side whose turn it is.
    fn side_to_move(&self) -> Side;

    /// Classify the current position.
    fn status(&self) -> GameStatus;

    /// Whether the side to move is in check.
    fn is_check(&self) -> bool;

    /// Board encoding of the current position (FEN for chess).
    fn board(&self) -> String;
}
