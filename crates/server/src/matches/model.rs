//! Match record, side identities and the views handed back to callers.

use chess_rules::{Side, STANDARD_START_FEN};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::gate::Role;

pub const MIN_AI_LEVEL: u8 = 1;
pub const MAX_AI_LEVEL: u8 = 8;

/// Who controls one side of a match. Stored once at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SideIdentity {
    /// Registered account (tournament or authenticated play).
    User { user_id: i64 },
    /// Anonymous player holding the per-match token.
    Guest { token: String },
    Bot { level: u8 },
}

impl SideIdentity {
    pub fn new_guest() -> Self {
        SideIdentity::Guest {
            token: uuid::Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn bot_level(&self) -> Option<u8> {
        match self {
            SideIdentity::Bot { level } => Some(*level),
            _ => None,
        }
    }

    pub fn guest_token(&self) -> Option<&str> {
        match self {
            SideIdentity::Guest { token } => Some(token),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Ongoing,
    Checkmate,
    Draw,
    Resignation,
    Timeout,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Ongoing => "ongoing",
            MatchStatus::Checkmate => "checkmate",
            MatchStatus::Draw => "draw",
            MatchStatus::Resignation => "resignation",
            MatchStatus::Timeout => "timeout",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ongoing" => Some(MatchStatus::Ongoing),
            "checkmate" => Some(MatchStatus::Checkmate),
            "draw" => Some(MatchStatus::Draw),
            "resignation" => Some(MatchStatus::Resignation),
            "timeout" => Some(MatchStatus::Timeout),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self != MatchStatus::Ongoing
    }
}

pub const DRAW_RESULT: &str = "1/2-1/2";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub id: i64,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_move_at: Option<DateTime<Utc>>,
    pub position: String,
    pub move_log: String,
    pub status: MatchStatus,
    pub result: Option<String>,
    pub side_to_move: Side,
    pub draw_offer: Option<Side>,
    pub white: SideIdentity,
    pub black: SideIdentity,
    pub base_seconds: i32,
    pub increment_seconds: i32,
    pub white_remaining_ms: i64,
    pub black_remaining_ms: i64,
    /// Bumped on every write; writes are conditioned on the previous value.
    pub version: i64,
}

impl Match {
    /// A fresh match from the standard starting position. `id` is assigned by the store.
    pub fn new(
        title: Option<String>,
        white: SideIdentity,
        black: SideIdentity,
        base_seconds: i32,
        increment_seconds: i32,
    ) -> Self {
        let clock_ms = i64::from(base_seconds) * 1000;
        Self {
            id: 0,
            title,
            created_at: Utc::now(),
            last_move_at: None,
            position: STANDARD_START_FEN.to_string(),
            move_log: String::new(),
            status: MatchStatus::Ongoing,
            result: None,
            side_to_move: Side::White,
            draw_offer: None,
            white,
            black,
            base_seconds,
            increment_seconds,
            white_remaining_ms: clock_ms,
            black_remaining_ms: clock_ms,
            version: 0,
        }
    }

    pub fn identity(&self, side: Side) -> &SideIdentity {
        match side {
            Side::White => &self.white,
            Side::Black => &self.black,
        }
    }

    pub fn is_ongoing(&self) -> bool {
        self.status == MatchStatus::Ongoing
    }

    pub fn is_timed(&self) -> bool {
        self.base_seconds > 0
    }

    /// The bot-controlled side and its level, if any.
    pub fn bot(&self) -> Option<(Side, u8)> {
        [Side::White, Side::Black]
            .into_iter()
            .find_map(|side| self.identity(side).bot_level().map(|level| (side, level)))
    }

    /// Anonymous live match: no bot and no registered account on either side.
    pub fn is_ephemeral(&self) -> bool {
        [&self.white, &self.black]
            .iter()
            .all(|id| matches!(id, SideIdentity::Guest { .. }))
    }

    pub fn remaining_ms(&self, side: Side) -> i64 {
        match side {
            Side::White => self.white_remaining_ms,
            Side::Black => self.black_remaining_ms,
        }
    }

    pub fn set_remaining_ms(&mut self, side: Side, ms: i64) {
        match side {
            Side::White => self.white_remaining_ms = ms,
            Side::Black => self.black_remaining_ms = ms,
        }
    }

    /// Instant the side to move started thinking.
    pub fn turn_started_at(&self) -> DateTime<Utc> {
        self.last_move_at.unwrap_or(self.created_at)
    }

    /// Enter a terminal state. Clears any pending draw offer.
    pub fn finish(&mut self, status: MatchStatus, result: impl Into<String>) {
        debug_assert!(self.is_ongoing(), "terminal states are final");
        debug_assert!(status.is_terminal());
        self.status = status;
        self.result = Some(result.into());
        self.draw_offer = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SideView {
    Guest,
    User {
        #[serde(rename = "userId")]
        user_id: i64,
    },
    Bot { level: u8 },
}

impl From<&SideIdentity> for SideView {
    fn from(identity: &SideIdentity) -> Self {
        match identity {
            SideIdentity::User { user_id } => SideView::User { user_id: *user_id },
            SideIdentity::Guest { .. } => SideView::Guest,
            SideIdentity::Bot { level } => SideView::Bot { level: *level },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockView {
    pub base_seconds: i32,
    pub increment_seconds: i32,
    pub white_remaining_ms: i64,
    pub black_remaining_ms: i64,
}

/// Match as returned to callers. Never carries side credentials.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchView {
    pub id: i64,
    pub title: Option<String>,
    pub position: String,
    pub move_log: String,
    pub status: MatchStatus,
    pub result: Option<String>,
    pub side_to_move: Side,
    pub draw_offer: Option<Side>,
    pub white: SideView,
    pub black: SideView,
    pub clock: ClockView,
    pub created_at: String,
    pub last_move_at: Option<String>,
    pub version: i64,
    pub viewer: Role,
}

impl MatchView {
    pub fn new(m: &Match, viewer: Role) -> Self {
        Self {
            id: m.id,
            title: m.title.clone(),
            position: m.position.clone(),
            move_log: m.move_log.clone(),
            status: m.status,
            result: m.result.clone(),
            side_to_move: m.side_to_move,
            draw_offer: m.draw_offer,
            white: SideView::from(&m.white),
            black: SideView::from(&m.black),
            clock: ClockView {
                base_seconds: m.base_seconds,
                increment_seconds: m.increment_seconds,
                white_remaining_ms: m.white_remaining_ms,
                black_remaining_ms: m.black_remaining_ms,
            },
            created_at: m.created_at.to_rfc3339(),
            last_move_at: m.last_move_at.map(|t| t.to_rfc3339()),
            version: m.version,
            viewer,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub id: i64,
    pub title: Option<String>,
    pub status: MatchStatus,
    pub side_to_move: Side,
    pub vs_ai: bool,
    pub ai_level: Option<u8>,
    pub ai_side: Option<Side>,
    pub base_seconds: i32,
    pub increment_seconds: i32,
    pub created_at: String,
    pub last_move_at: Option<String>,
}

impl From<&Match> for MatchSummary {
    fn from(m: &Match) -> Self {
        let bot = m.bot();
        Self {
            id: m.id,
            title: m.title.clone(),
            status: m.status,
            side_to_move: m.side_to_move,
            vs_ai: bot.is_some(),
            ai_level: bot.map(|(_, level)| level),
            ai_side: bot.map(|(side, _)| side),
            base_seconds: m.base_seconds,
            increment_seconds: m.increment_seconds,
            created_at: m.created_at.to_rfc3339(),
            last_move_at: m.last_move_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guest_match() -> Match {
        Match::new(None, SideIdentity::new_guest(), SideIdentity::new_guest(), 300, 5)
    }

    #[test]
    fn test_new_match_starts_ongoing_with_full_clocks() {
        let m = guest_match();
        assert!(m.is_ongoing());
        assert_eq!(m.side_to_move, Side::White);
        assert_eq!(m.white_remaining_ms, 300_000);
        assert_eq!(m.black_remaining_ms, 300_000);
        assert!(m.result.is_none());
        assert!(m.is_ephemeral());
        assert!(m.bot().is_none());
    }

    #[test]
    fn test_guest_tokens_are_distinct() {
        let m = guest_match();
        assert_ne!(m.white.guest_token(), m.black.guest_token());
        assert_eq!(m.white.guest_token().map(str::len), Some(32));
    }

    #[test]
    fn test_bot_side_is_explicit() {
        let m = Match::new(
            None,
            SideIdentity::Guest { token: "tok".into() },
            SideIdentity::Bot { level: 3 },
            0,
            0,
        );
        assert_eq!(m.bot(), Some((Side::Black, 3)));
        assert!(!m.is_ephemeral());

        let summary = MatchSummary::from(&m);
        assert!(summary.vs_ai);
        assert_eq!(summary.ai_level, Some(3));
        assert_eq!(summary.ai_side, Some(Side::Black));
    }

    #[test]
    fn test_user_match_is_not_ephemeral() {
        let m = Match::new(
            None,
            SideIdentity::User { user_id: 1 },
            SideIdentity::User { user_id: 2 },
            0,
            0,
        );
        assert!(!m.is_ephemeral());
    }

    #[test]
    fn test_view_never_contains_tokens() {
        let m = guest_match();
        let token = m.white.guest_token().unwrap().to_string();
        let json = serde_json::to_string(&MatchView::new(&m, Role::White)).unwrap();
        assert!(!json.contains(&token));
        assert!(json.contains("\"viewer\":\"white\""));
        assert!(json.contains("\"kind\":\"guest\""));
    }

    #[test]
    fn test_finish_clears_draw_offer() {
        let mut m = guest_match();
        m.draw_offer = Some(Side::White);
        m.finish(MatchStatus::Resignation, "1-0");
        assert_eq!(m.status, MatchStatus::Resignation);
        assert_eq!(m.result.as_deref(), Some("1-0"));
        assert!(m.draw_offer.is_none());
    }

    #[test]
    fn test_status_text_round_trips() {
        for status in [
            MatchStatus::Ongoing,
            MatchStatus::Checkmate,
            MatchStatus::Draw,
            MatchStatus::Resignation,
            MatchStatus::Timeout,
        ] {
            assert_eq!(MatchStatus::parse(status.as_str()), Some(status));
        }
    }
}
