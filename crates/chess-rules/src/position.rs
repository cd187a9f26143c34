//! Position encoding (FEN) and side-to-move helpers.

use serde::{Deserialize, Serialize};
use shakmaty::{fen::Fen, CastlingMode, Chess, Color, EnPassantMode, Position};

use crate::error::RulesError;

pub const STANDARD_START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// FEN fields after the placement, used when a stored position is truncated.
const DEFAULT_FEN_TAIL: [&str; 5] = ["w", "-", "-", "0", "1"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// Result string crediting this side with the win.
    pub fn winning_result(self) -> &'static str {
        match self {
            Side::White => "1-0",
            Side::Black => "0-1",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::White => "white",
            Side::Black => "black",
        }
    }

    pub fn parse(s: &str) -> Option<Side> {
        match s.trim().to_ascii_lowercase().as_str() {
            "white" | "w" => Some(Side::White),
            "black" | "b" => Some(Side::Black),
            _ => None,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Color> for Side {
    fn from(color: Color) -> Self {
        match color {
            Color::White => Side::White,
            Color::Black => Side::Black,
        }
    }
}

impl From<Side> for Color {
    fn from(side: Side) -> Self {
        match side {
            Side::White => Color::White,
            Side::Black => Color::Black,
        }
    }
}

/// Fill in missing trailing FEN fields so placement-only encodings parse.
fn normalize_fen(fen: &str) -> String {
    let mut fields: Vec<&str> = fen.split_whitespace().collect();
    if (1..6).contains(&fields.len()) {
        let given = fields.len();
        fields.extend(DEFAULT_FEN_TAIL[given - 1..].iter().copied());
    }
    fields.join(" ")
}

/// Parse a stored position. Placement-only strings default to white to move.
pub fn parse_position(fen: &str) -> Result<Chess, RulesError> {
    if fen.trim().is_empty() {
        return Err(RulesError::InvalidPosition("empty position".into()));
    }
    let normalized = normalize_fen(fen);
    let parsed: Fen = normalized
        .parse()
        .map_err(|e| RulesError::InvalidPosition(format!("{normalized}: {e}")))?;
    parsed
        .into_position::<Chess>(CastlingMode::Standard)
        .map_err(|e| RulesError::InvalidPosition(format!("{normalized}: {e}")))
}

pub fn encode_position(pos: &Chess) -> String {
    Fen::from_position(pos, EnPassantMode::Legal).to_string()
}

pub fn side_to_move(pos: &Chess) -> Side {
    pos.turn().into()
}
