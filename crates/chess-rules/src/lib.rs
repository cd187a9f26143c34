//! Chess rules glue over shakmaty.
//!
//! Everything the session engine needs to know about chess goes through this
//! crate: parsing and encoding positions, applying a from/to move, classifying
//! terminal positions, listing legal targets and keeping the move log.

pub mod error;
pub mod movelog;
pub mod position;
pub mod rules;

pub use error::RulesError;
pub use position::{encode_position, parse_position, side_to_move, Side, STANDARD_START_FEN};
pub use rules::{
    apply_move, apply_to, legal_targets, notation_matches, play_san, replay_san, terminal_of, AppliedMove,
    IllegalMove, MoveInput, MoveOutcome, Terminal,
};
