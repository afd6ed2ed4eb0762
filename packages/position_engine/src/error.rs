/// Reasons a move or position is rejected by the engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The move could not be parsed as squares, UCI, or SAN.
    #[error("invalid move notation: {0}")]
    InvalidNotation(String),

    /// The move parsed but is not legal in the current position.
    #[error("illegal move: {0}")]
    IllegalMove(String),

    /// The position is terminal; no further moves are accepted.
    #[error("game is already over")]
    GameOver,

    /// A starting position could not be parsed.
    #[error("invalid FEN: {0}")]
    InvalidFen(String),
}
