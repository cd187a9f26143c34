//! Move application and terminal detection.
//!
//! A rejected move is an ordinary [`MoveOutcome::Illegal`] value. `Err` is
//! reserved for inputs that cannot be interpreted at all (bad squares, corrupt
//! stored positions, unreadable solution entries).

use serde::Serialize;
use shakmaty::{
    san::SanPlus, uci::UciMove, CastlingMode, Chess, Move, Position, Rank, Role, Square,
};

use crate::error::RulesError;
use crate::position::{encode_position, parse_position, side_to_move, Side};

/// Halfmove clock at which the game is drawn without a claim (75-move rule).
const AUTOMATIC_DRAW_HALFMOVES: u32 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveInput {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Role>,
}

impl MoveInput {
    pub fn parse(from: &str, to: &str, promotion: Option<&str>) -> Result<Self, RulesError> {
        let promotion = match promotion.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => Some(parse_promotion(p)?),
            None => None,
        };
        Ok(Self {
            from: parse_square(from)?,
            to: parse_square(to)?,
            promotion,
        })
    }

    /// Parse a long-algebraic move such as `e2e4` or `e7e8q`.
    pub fn from_uci(uci: &str) -> Result<Self, RulesError> {
        let uci = uci.trim();
        if !(4..=5).contains(&uci.len()) || !uci.is_ascii() {
            return Err(RulesError::InvalidNotation(uci.to_string()));
        }
        Self::parse(&uci[0..2], &uci[2..4], uci.get(4..5))
    }
}

fn parse_square(s: &str) -> Result<Square, RulesError> {
    s.trim()
        .to_ascii_lowercase()
        .parse::<Square>()
        .map_err(|_| RulesError::InvalidSquare(s.to_string()))
}

fn parse_promotion(s: &str) -> Result<Role, RulesError> {
    match s.to_ascii_lowercase().as_str() {
        "q" | "queen" => Ok(Role::Queen),
        "r" | "rook" => Ok(Role::Rook),
        "b" | "bishop" => Ok(Role::Bishop),
        "n" | "knight" => Ok(Role::Knight),
        _ => Err(RulesError::InvalidPromotion(s.to_string())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Terminal {
    Checkmate { winner: Side },
    Stalemate,
    InsufficientMaterial,
    SeventyFiveMoveRule,
}

impl Terminal {
    pub fn is_draw(&self) -> bool {
        !matches!(self, Terminal::Checkmate { .. })
    }
}

#[derive(Debug, Clone)]
pub struct AppliedMove {
    pub uci: String,
    /// SAN including the `+`/`#` suffix.
    pub san: String,
    pub mover: Side,
    /// Full-move number the move was played on.
    pub fullmove: u32,
    /// FEN after the move.
    pub position: String,
    pub side_to_move: Side,
    pub terminal: Option<Terminal>,
    pub board: Chess,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllegalMove {
    pub attempted: String,
}

#[derive(Debug, Clone)]
pub enum MoveOutcome {
    Applied(AppliedMove),
    Illegal(IllegalMove),
}

pub fn terminal_of(pos: &Chess) -> Option<Terminal> {
    if pos.is_checkmate() {
        Some(Terminal::Checkmate {
            winner: side_to_move(pos).opponent(),
        })
    } else if pos.is_stalemate() {
        Some(Terminal::Stalemate)
    } else if pos.is_insufficient_material() {
        Some(Terminal::InsufficientMaterial)
    } else if pos.halfmoves() >= AUTOMATIC_DRAW_HALFMOVES {
        Some(Terminal::SeventyFiveMoveRule)
    } else {
        None
    }
}

fn last_rank_for(pos: &Chess, from: Square) -> Option<Rank> {
    let piece = pos.board().piece_at(from)?;
    if piece.role != Role::Pawn {
        return None;
    }
    Some(match side_to_move(pos) {
        Side::White => Rank::Eighth,
        Side::Black => Rank::First,
    })
}

/// Play an already-legal move and describe the result.
fn play_legal(pos: &Chess, mv: &Move) -> AppliedMove {
    let mover = side_to_move(pos);
    let fullmove = u32::from(pos.fullmoves());
    let uci = mv.to_uci(CastlingMode::Standard).to_string();
    let mut board = pos.clone();
    let san = SanPlus::from_move_and_play_unchecked(&mut board, *mv).to_string();

    AppliedMove {
        uci,
        san,
        mover,
        fullmove,
        position: encode_position(&board),
        side_to_move: side_to_move(&board),
        terminal: terminal_of(&board),
        board,
    }
}

/// Apply a from/to move to an in-memory board.
pub fn apply_to(pos: &Chess, input: &MoveInput) -> MoveOutcome {
    let promotion = input.promotion.or_else(|| {
        last_rank_for(pos, input.from)
            .filter(|rank| input.to.rank() == *rank)
            .map(|_| Role::Queen)
    });
    let uci = UciMove::Normal {
        from: input.from,
        to: input.to,
        promotion,
    };

    match uci.to_move(pos) {
        Ok(mv) => MoveOutcome::Applied(play_legal(pos, &mv)),
        Err(_) => MoveOutcome::Illegal(IllegalMove {
            attempted: uci.to_string(),
        }),
    }
}

/// Validate and apply a move against a stored position.
pub fn apply_move(position: &str, input: &MoveInput) -> Result<MoveOutcome, RulesError> {
    let pos = parse_position(position)?;
    Ok(apply_to(&pos, input))
}

/// Squares the piece on `square` can legally move to, sorted.
pub fn legal_targets(position: &str, square: &str) -> Result<Vec<String>, RulesError> {
    let pos = parse_position(position)?;
    let from = parse_square(square)?;

    let mut targets: Vec<String> = pos
        .legal_moves()
        .iter()
        .filter(|m| m.from() == Some(from))
        .filter_map(|m| match m.to_uci(CastlingMode::Standard) {
            UciMove::Normal { to, .. } => Some(to.to_string()),
            _ => None,
        })
        .collect();
    targets.sort();
    targets.dedup();
    Ok(targets)
}

/// Play one solution entry given in SAN (UCI accepted as a fallback).
pub fn play_san(pos: &Chess, notation: &str) -> Result<AppliedMove, RulesError> {
    let notation = notation.trim();
    let invalid = || RulesError::InvalidNotation(notation.to_string());

    let mv = match notation.parse::<SanPlus>() {
        Ok(san_plus) => san_plus.san.to_move(pos).map_err(|_| invalid())?,
        Err(_) => {
            let uci: UciMove = notation.parse().map_err(|_| invalid())?;
            uci.to_move(pos).map_err(|_| invalid())?
        }
    };
    Ok(play_legal(pos, &mv))
}

/// Rebuild a board by playing `plies` from `start`.
pub fn replay_san(start: &str, plies: &[String]) -> Result<Chess, RulesError> {
    let mut pos = parse_position(start)?;
    for notation in plies {
        pos = play_san(&pos, notation)?.board;
    }
    Ok(pos)
}

/// Compare a played move to an expected solution entry.
///
/// Accepts the canonical SAN, or the long form (`uci` plus the same check or
/// mate suffix, e.g. `h5h7#`).
pub fn notation_matches(expected: &str, played: &AppliedMove) -> bool {
    let expected = expected.trim();
    if expected == played.san {
        return true;
    }
    let suffix = match played.san.chars().last() {
        Some(c @ ('#' | '+')) => c.to_string(),
        _ => String::new(),
    };
    expected == format!("{}{}", played.uci, suffix)
}
