use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two sides of a game. White always moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    /// Sides in seating order: the first participant gets `White`.
    pub const SEATING: [Side; 2] = [Side::White, Side::Black];

    pub const fn opposite(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Black => "black",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<shakmaty::Color> for Side {
    fn from(c: shakmaty::Color) -> Self {
        match c {
            shakmaty::Color::White => Self::White,
            shakmaty::Color::Black => Self::Black,
        }
    }
}

impl From<Side> for shakmaty::Color {
    fn from(s: Side) -> Self {
        match s {
            Side::White => Self::White,
            Side::Black => Self::Black,
        }
    }
}

/// A candidate move as sent by a client.
///
/// Accepts either explicit squares (`{"from":"e7","to":"e8","promotion":"q"}`)
/// or a single notation token, tried as UCI (`"e2e4"`) and then SAN (`"Nf3"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MoveInput {
    Squares {
        from: String,
        to: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        promotion: Option<String>,
    },
    Notation(String),
}

impl MoveInput {
    pub fn squares(from: &str, to: &str) -> Self {
        Self::Squares {
            from: from.to_string(),
            to: to.to_string(),
            promotion: None,
        }
    }

    pub fn notation(token: &str) -> Self {
        Self::Notation(token.to_string())
    }
}

impl fmt::Display for MoveInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Squares {
                from,
                to,
                promotion,
            } => write!(f, "{}{}{}", from, to, promotion.as_deref().unwrap_or("")),
            Self::Notation(token) => f.write_str(token),
        }
    }
}

/// A move the engine accepted, described in every form a client may want.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedMove {
    /// Side that made the move.
    pub color: Side,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
    pub san: String,
    pub uci: String,
}

/// Classification of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Ongoing,
    Checkmate,
    /// Drawn by rule: insufficient material, fifty-move rule, or repetition.
    Draw,
    Stalemate,
}

impl GameStatus {
    pub const fn is_over(self) -> bool {
        !matches!(self, Self::Ongoing)
    }
}
