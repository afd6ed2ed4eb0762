//! Standard chess rules on top of shakmaty.

use std::collections::HashMap;

use shakmaty::{
    CastlingMode, Chess, EnPassantMode, Move, Position,
    fen::Fen,
    san::{San, SanPlus},
    uci::UciMove,
};
use tracing::trace;

use crate::error::EngineError;
use crate::types::{AppliedMove, GameStatus, MoveInput, Side};
use crate::PositionEngine;

/// Halfmove clock value at which the fifty-move rule applies.
const FIFTY_MOVE_HALFMOVES: u32 = 100;

/// Occurrences of the same position that make a draw.
const REPETITION_LIMIT: u32 = 3;

/// A standard chess game: current position plus the repetition history
/// needed for threefold detection.
#[derive(Debug, Clone)]
pub struct ChessEngine {
    position: Chess,
    /// Position key (FEN without clocks) -> times seen.
    repetitions: HashMap<String, u32>,
}

impl ChessEngine {
    /// Standard starting position.
    pub fn new() -> Self {
        Self::with_position(Chess::default())
    }

    /// Start from an arbitrary position.
    pub fn from_fen(fen: &str) -> Result<Self, EngineError> {
        let fen: Fen = fen
            .parse()
            .map_err(|e| EngineError::InvalidFen(format!("{e}")))?;
        let position: Chess = fen
            .into_position(CastlingMode::Standard)
            .map_err(|e| EngineError::InvalidFen(format!("{e}")))?;
        Ok(Self::with_position(position))
    }

    fn with_position(position: Chess) -> Self {
        let mut engine = Self {
            position,
            repetitions: HashMap::new(),
        };
        engine.record_position();
        engine
    }

    pub fn to_fen(&self) -> String {
        Fen::from_position(self.position.clone(), EnPassantMode::Legal).to_string()
    }

    pub fn halfmove_clock(&self) -> u32 {
        self.position.halfmoves()
    }

    pub fn fullmove_number(&self) -> u32 {
        self.position.fullmoves().get()
    }

    /// Drawn by rule. Stalemate is classified separately.
    pub fn is_draw(&self) -> bool {
        self.position.is_insufficient_material()
            || self.halfmove_clock() >= FIFTY_MOVE_HALFMOVES
            || self.repetition_count() >= REPETITION_LIMIT
    }

    fn repetition_count(&self) -> u32 {
        self.repetitions
            .get(&self.position_key())
            .copied()
            .unwrap_or(0)
    }

    /// Placement, side to move, castling rights and en passant square.
    fn position_key(&self) -> String {
        self.to_fen()
            .split_whitespace()
            .take(4)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn record_position(&mut self) {
        *self.repetitions.entry(self.position_key()).or_insert(0) += 1;
    }

    fn parse_move(&self, mv: &MoveInput) -> Result<Move, EngineError> {
        match mv {
            MoveInput::Squares {
                from,
                to,
                promotion,
            } => {
                let token = format!(
                    "{}{}{}",
                    from.trim().to_ascii_lowercase(),
                    to.trim().to_ascii_lowercase(),
                    promotion_suffix(promotion.as_deref())?
                );
                self.parse_uci(&token)?
                    .ok_or_else(|| EngineError::InvalidNotation(mv.to_string()))
            }
            MoveInput::Notation(token) => {
                let token = token.trim();
                if let Some(m) = self.parse_uci(token)? {
                    return Ok(m);
                }
                let san: SanPlus = token
                    .parse()
                    .map_err(|_| EngineError::InvalidNotation(token.to_string()))?;
                san.san
                    .to_move(&self.position)
                    .map_err(|_| EngineError::IllegalMove(token.to_string()))
            }
        }
    }

    /// `Ok(None)` when the token is not UCI at all, so the caller can try SAN.
    fn parse_uci(&self, token: &str) -> Result<Option<Move>, EngineError> {
        let Ok(uci) = token.parse::<UciMove>() else {
            return Ok(None);
        };
        uci.to_move(&self.position)
            .map(Some)
            .map_err(|_| EngineError::IllegalMove(token.to_string()))
    }
}

impl Default for ChessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionEngine for ChessEngine {
    fn apply_move(&mut self, mv: &MoveInput) -> Result<AppliedMove, EngineError> {
        if self.status().is_over() {
            return Err(EngineError::GameOver);
        }

        let m = self.parse_move(mv)?;
        if !self.position.is_legal(&m) {
            return Err(EngineError::IllegalMove(mv.to_string()));
        }

        // SAN depends on the position before the move
        let san = San::from_move(&self.position, &m).to_string();
        let uci = UciMove::from_move(&m, CastlingMode::Standard).to_string();
        let color = self.side_to_move();

        self.position = self
            .position
            .clone()
            .play(&m)
            .map_err(|_| EngineError::IllegalMove(mv.to_string()))?;
        self.record_position();

        trace!(%uci, %san, "move applied");

        Ok(AppliedMove {
            color,
            from: m.from().map_or_else(String::new, |sq| sq.to_string()),
            to: m.to().to_string(),
            promotion: m.promotion().map(|role| role.char().to_string()),
            san,
            uci,
        })
    }

    fn side_to_move(&self) -> Side {
        self.position.turn().into()
    }

    fn status(&self) -> GameStatus {
        if self.position.is_checkmate() {
            GameStatus::Checkmate
        } else if self.position.is_stalemate() {
            GameStatus::Stalemate
        } else if self.is_draw() {
            GameStatus::Draw
        } else {
            GameStatus::Ongoing
        }
    }

    fn is_check(&self) -> bool {
        self.position.is_check()
    }

    fn board(&self) -> String {
        self.to_fen()
    }
}

/// Map a promotion piece (`"q"`, `"Q"`, `"queen"`, ...) to its UCI suffix.
fn promotion_suffix(promotion: Option<&str>) -> Result<&'static str, EngineError> {
    let Some(piece) = promotion.map(str::trim).filter(|p| !p.is_empty()) else {
        return Ok("");
    };
    match piece.to_ascii_lowercase().as_str() {
        "q" | "queen" => Ok("q"),
        "r" | "rook" => Ok("r"),
        "b" | "bishop" => Ok("b"),
        "n" | "knight" => Ok("n"),
        _ => Err(EngineError::InvalidNotation(format!(
            "unknown promotion piece: {piece}"
        ))),
    }
}
