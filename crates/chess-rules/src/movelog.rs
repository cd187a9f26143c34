//! Move-list encoding: numbered SAN, e.g. `1. e4 e5 2. Nf3`.

use std::sync::LazyLock;

use regex::Regex;
use shakmaty::Chess;

use crate::error::RulesError;
use crate::position::{parse_position, Side};
use crate::rules::play_san;

static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{[^}]*\}").unwrap());
static VARIATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\([^)]*\)").unwrap());
static MOVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[KQRBN]?[a-h]?[1-8]?x?[a-h][1-8](?:=[QRBN])?[+#]?|O-O-O[+#]?|O-O[+#]?").unwrap()
});

/// Append one ply to a move log.
pub fn append(log: &str, fullmove: u32, mover: Side, san: &str) -> String {
    let mut out = log.trim_end().to_string();
    if !out.is_empty() {
        out.push(' ');
    }
    match mover {
        Side::White => out.push_str(&format!("{fullmove}. {san}")),
        // Logs that start on a black move need the `N...` marker.
        Side::Black if out.is_empty() => out.push_str(&format!("{fullmove}... {san}")),
        Side::Black => out.push_str(san),
    }
    out
}

/// Extract SAN tokens from a move log (comments, variations and results ignored).
pub fn parse(log: &str) -> Vec<String> {
    let no_comments = COMMENT_RE.replace_all(log, "");
    let no_variations = VARIATION_RE.replace_all(&no_comments, "");

    MOVE_RE
        .find_iter(&no_variations)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Rebuild the position reached by playing a move log from `start`.
pub fn replay(start: &str, log: &str) -> Result<Chess, RulesError> {
    let mut pos = parse_position(start)?;
    for san in parse(log) {
        pos = play_san(&pos, &san)?.board;
    }
    Ok(pos)
}
