//! Match lifecycle: creation, moves, resignation, timeouts, admin closure and
//! the engine's turn.
//!
//! The controller holds no match state between requests. Each mutation loads
//! the record, checks it, and writes it back conditioned on the version it
//! read (see [`MatchStore::update_match`]).

use std::sync::Arc;

use chess_rules::{
    apply_to, movelog, parse_position, AppliedMove, MoveInput, MoveOutcome, Side, Terminal,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::gate::{require_admin, require_side, resolve_role, Role};
use crate::auth::middleware::Credential;
use crate::clients::engine::{depth_for_level, MoveSuggester, Suggestion};
use crate::db::MatchStore;
use crate::error::AppError;
use crate::matches::events::{EventSender, MatchEvent};
use crate::matches::model::{
    Match, MatchStatus, MatchSummary, MatchView, SideIdentity, DRAW_RESULT, MAX_AI_LEVEL,
    MIN_AI_LEVEL,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HumanSide {
    White,
    Black,
    Random,
}

impl HumanSide {
    fn pick(self) -> Side {
        match self {
            HumanSide::White => Side::White,
            HumanSide::Black => Side::Black,
            HumanSide::Random => {
                if uuid::Uuid::new_v4().as_bytes()[0] & 1 == 0 {
                    Side::White
                } else {
                    Side::Black
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateMatch {
    pub title: Option<String>,
    pub vs_ai: bool,
    pub ai_level: Option<u8>,
    pub human_side: Option<HumanSide>,
    pub base_seconds: i32,
    pub increment_seconds: i32,
    /// Tournament pairing; admin only.
    pub white_user_id: Option<i64>,
    pub black_user_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiParams {
    pub side: Side,
    pub level: u8,
    pub depth: u8,
}

/// Creation response; the only place side credentials are ever returned.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedMatch {
    #[serde(rename = "match")]
    pub view: MatchView,
    pub white_token: Option<String>,
    pub black_token: Option<String>,
    pub ai: Option<AiParams>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveView {
    pub uci: String,
    pub san: String,
    pub mover: Side,
    pub terminal: Option<Terminal>,
}

impl From<&AppliedMove> for MoveView {
    fn from(m: &AppliedMove) -> Self {
        Self {
            uci: m.uci.clone(),
            san: m.san.clone(),
            mover: m.mover,
            terminal: m.terminal,
        }
    }
}

#[derive(Debug, Clone)]
pub enum MoveResult {
    Applied { played: MoveView, view: MatchView },
    /// Rejected by the rules; the match is unchanged.
    Illegal { attempted: String, view: MatchView },
    /// The mover's clock had already run out; the match ended on time instead.
    Flagged { view: MatchView },
}

#[derive(Debug, Clone)]
pub enum BotTurn {
    Played { played: MoveView, view: MatchView },
    /// Recoverable: the match is unchanged and the turn can be retried.
    NoMoveAvailable { reason: String, view: MatchView },
    /// The engine's clock ran out before its move was recorded.
    Flagged { view: MatchView },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseReason {
    Draw,
    Timeout,
    Resignation,
}

/// Deduct the mover's thinking time and credit the increment.
fn charge_clock(m: &mut Match, mover: Side, now: DateTime<Utc>) {
    let elapsed = (now - m.turn_started_at()).num_milliseconds().max(0);
    let remaining = (m.remaining_ms(mover) - elapsed).max(0);
    m.set_remaining_ms(mover, remaining + i64::from(m.increment_seconds) * 1000);
}

/// Time left for the side to move, computed from stored fields only.
pub fn time_left_ms(m: &Match, now: DateTime<Utc>) -> i64 {
    let elapsed = (now - m.turn_started_at()).num_milliseconds().max(0);
    m.remaining_ms(m.side_to_move) - elapsed
}

/// Fold an applied move into the record. A move withdraws any draw offer.
pub(crate) fn record_move(m: &mut Match, applied: &AppliedMove, now: DateTime<Utc>) {
    if m.is_timed() {
        charge_clock(m, applied.mover, now);
    }
    m.position = applied.position.clone();
    m.move_log = movelog::append(&m.move_log, applied.fullmove, applied.mover, &applied.san);
    m.side_to_move = applied.side_to_move;
    m.last_move_at = Some(now);
    m.draw_offer = None;

    match applied.terminal {
        Some(Terminal::Checkmate { .. }) => {
            m.finish(MatchStatus::Checkmate, applied.mover.winning_result())
        }
        Some(_) => m.finish(MatchStatus::Draw, DRAW_RESULT),
        None => {}
    }
}

#[derive(Clone)]
pub struct MatchController {
    store: Arc<dyn MatchStore>,
    engine: Arc<dyn MoveSuggester>,
    events: EventSender,
}

impl MatchController {
    pub fn new(
        store: Arc<dyn MatchStore>,
        engine: Arc<dyn MoveSuggester>,
        events: EventSender,
    ) -> Self {
        Self {
            store,
            engine,
            events,
        }
    }

    pub(crate) async fn load(&self, id: i64) -> Result<Match, AppError> {
        self.store
            .get_match(id)
            .await?
            .ok_or_else(|| AppError::match_not_found(id))
    }

    pub(crate) async fn load_ongoing(&self, id: i64) -> Result<Match, AppError> {
        let m = self.load(id).await?;
        if !m.is_ongoing() {
            return Err(AppError::not_ongoing());
        }
        Ok(m)
    }

    /// Persist `m` over the version it was read at and emit events for
    /// terminal transitions.
    pub(crate) async fn commit(&self, mut m: Match, expected_version: i64) -> Result<Match, AppError> {
        m.version = expected_version + 1;
        if !self.store.update_match(&m, expected_version).await? {
            tracing::warn!(match_id = m.id, expected_version, "Lost write race on match");
            return Err(AppError::Conflict(
                "Match was updated concurrently; reload and retry".into(),
            ));
        }

        if m.status.is_terminal() {
            tracing::info!(
                match_id = m.id,
                status = m.status.as_str(),
                result = m.result.as_deref().unwrap_or(""),
                "Match finished"
            );
            self.events.emit(MatchEvent::finished(&m));
        }
        Ok(m)
    }

    /// End the match on time if the side to move has no time left at `now`.
    /// Returns the committed match when it did.
    async fn flag_if_expired(
        &self,
        m: &Match,
        now: DateTime<Utc>,
    ) -> Result<Option<Match>, AppError> {
        if !m.is_timed() || time_left_ms(m, now) > 0 {
            return Ok(None);
        }
        let flagged = m.side_to_move;
        let mut ended = m.clone();
        ended.set_remaining_ms(flagged, 0);
        ended.finish(MatchStatus::Timeout, flagged.opponent().winning_result());
        tracing::info!(match_id = m.id, side = flagged.as_str(), "Side flagged");
        Ok(Some(self.commit(ended, m.version).await?))
    }

    pub async fn create_match(
        &self,
        req: CreateMatch,
        credential: &Credential,
    ) -> Result<CreatedMatch, AppError> {
        if req.base_seconds < 0 || req.increment_seconds < 0 {
            return Err(AppError::BadRequest("Clock values must not be negative".into()));
        }

        let paired = req.white_user_id.is_some() || req.black_user_id.is_some();
        let (white, black) = if paired {
            require_admin(credential)?;
            if req.vs_ai {
                return Err(AppError::BadRequest(
                    "Tournament pairings cannot include the engine".into(),
                ));
            }
            let side = |user: Option<i64>| match user {
                Some(user_id) => SideIdentity::User { user_id },
                None => SideIdentity::new_guest(),
            };
            (side(req.white_user_id), side(req.black_user_id))
        } else if req.vs_ai {
            let level = req.ai_level.unwrap_or(MIN_AI_LEVEL);
            if !(MIN_AI_LEVEL..=MAX_AI_LEVEL).contains(&level) {
                return Err(AppError::BadRequest(format!(
                    "AI level must be between {MIN_AI_LEVEL} and {MAX_AI_LEVEL}"
                )));
            }
            let human = match credential.user {
                Some(user) => SideIdentity::User { user_id: user.id },
                None => SideIdentity::new_guest(),
            };
            let bot = SideIdentity::Bot { level };
            match req.human_side.unwrap_or(HumanSide::White).pick() {
                Side::White => (human, bot),
                Side::Black => (bot, human),
            }
        } else {
            (SideIdentity::new_guest(), SideIdentity::new_guest())
        };

        let title = req
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let m = Match::new(title, white, black, req.base_seconds, req.increment_seconds);
        let stored = self.store.insert_match(&m).await?;

        let ai = stored.bot().map(|(side, level)| AiParams {
            side,
            level,
            depth: depth_for_level(level),
        });
        tracing::info!(
            match_id = stored.id,
            vs_ai = ai.is_some(),
            base_seconds = stored.base_seconds,
            increment_seconds = stored.increment_seconds,
            "Match created"
        );

        Ok(CreatedMatch {
            view: MatchView::new(&stored, resolve_role(&stored, credential)),
            white_token: stored.white.guest_token().map(str::to_string),
            black_token: stored.black.guest_token().map(str::to_string),
            ai,
        })
    }

    pub async fn list_ongoing(&self) -> Result<Vec<MatchSummary>, AppError> {
        let matches = self.store.list_ongoing().await?;
        Ok(matches.iter().map(MatchSummary::from).collect())
    }

    pub async fn get_match(&self, id: i64, credential: &Credential) -> Result<MatchView, AppError> {
        let m = self.load(id).await?;
        Ok(MatchView::new(&m, resolve_role(&m, credential)))
    }

    pub async fn apply_move(
        &self,
        id: i64,
        credential: &Credential,
        from: &str,
        to: &str,
        promotion: Option<&str>,
    ) -> Result<MoveResult, AppError> {
        let mut m = self.load_ongoing(id).await?;
        let role = resolve_role(&m, credential);
        let side = require_side(role)?;
        if side != m.side_to_move {
            return Err(AppError::not_your_turn());
        }

        let now = Utc::now();
        if let Some(ended) = self.flag_if_expired(&m, now).await? {
            return Ok(MoveResult::Flagged {
                view: MatchView::new(&ended, role),
            });
        }

        let input = MoveInput::parse(from, to, promotion)?;
        let pos = parse_position(&m.position)?;
        let applied = match apply_to(&pos, &input) {
            MoveOutcome::Applied(applied) => applied,
            MoveOutcome::Illegal(illegal) => {
                tracing::debug!(match_id = id, attempted = %illegal.attempted, "Illegal move rejected");
                return Ok(MoveResult::Illegal {
                    attempted: illegal.attempted,
                    view: MatchView::new(&m, role),
                });
            }
        };

        let expected = m.version;
        record_move(&mut m, &applied, now);
        let m = self.commit(m, expected).await?;

        Ok(MoveResult::Applied {
            played: MoveView::from(&applied),
            view: MatchView::new(&m, role),
        })
    }

    pub async fn resign(&self, id: i64, credential: &Credential) -> Result<MatchView, AppError> {
        let mut m = self.load_ongoing(id).await?;
        let role = resolve_role(&m, credential);
        let side = require_side(role)?;

        let expected = m.version;
        m.finish(MatchStatus::Resignation, side.opponent().winning_result());
        let m = self.commit(m, expected).await?;
        tracing::info!(match_id = id, side = side.as_str(), "Side resigned");
        Ok(MatchView::new(&m, role))
    }

    /// Admin closure. Skips turn and ownership checks but still requires an
    /// ongoing match. `loser` defaults to the side to move.
    pub async fn force_close(
        &self,
        id: i64,
        credential: &Credential,
        reason: CloseReason,
        loser: Option<Side>,
    ) -> Result<MatchView, AppError> {
        require_admin(credential)?;
        let mut m = self.load_ongoing(id).await?;
        let loser = loser.unwrap_or(m.side_to_move);

        let expected = m.version;
        match reason {
            CloseReason::Draw => m.finish(MatchStatus::Draw, DRAW_RESULT),
            CloseReason::Timeout => {
                m.finish(MatchStatus::Timeout, loser.opponent().winning_result())
            }
            CloseReason::Resignation => {
                m.finish(MatchStatus::Resignation, loser.opponent().winning_result())
            }
        }
        let m = self.commit(m, expected).await?;
        tracing::info!(match_id = id, reason = ?reason, "Match closed by admin");
        Ok(MatchView::new(&m, resolve_role(&m, credential)))
    }

    /// Timeout decided from the stored clock, never from the caller's word.
    pub async fn claim_timeout(
        &self,
        id: i64,
        credential: &Credential,
    ) -> Result<MatchView, AppError> {
        let m = self.load_ongoing(id).await?;
        let role = resolve_role(&m, credential);
        if role == Role::Spectator {
            return Err(AppError::Unauthorized);
        }
        if !m.is_timed() {
            return Err(AppError::InvalidState("Match is untimed".into()));
        }

        let now = Utc::now();
        match self.flag_if_expired(&m, now).await? {
            Some(ended) => Ok(MatchView::new(&ended, role)),
            None => Err(AppError::InvalidState(format!(
                "Clock has not expired ({} ms left)",
                time_left_ms(&m, now)
            ))),
        }
    }

    pub async fn legal_targets(&self, id: i64, square: &str) -> Result<Vec<String>, AppError> {
        let m = self.load(id).await?;
        if !m.is_ongoing() {
            return Ok(Vec::new());
        }
        Ok(chess_rules::legal_targets(&m.position, square)?)
    }

    /// Ask the engine for the bot's move and play it.
    ///
    /// Nothing is held while the engine thinks; the write is conditioned on
    /// the version read before the call.
    pub async fn play_bot_turn(
        &self,
        id: i64,
        credential: &Credential,
    ) -> Result<BotTurn, AppError> {
        let mut m = self.load_ongoing(id).await?;
        let role = resolve_role(&m, credential);
        if role == Role::Spectator {
            return Err(AppError::Unauthorized);
        }
        let (_, level) = m
            .bot()
            .filter(|(side, _)| *side == m.side_to_move)
            .ok_or_else(|| AppError::InvalidState("It is not the engine's turn".into()))?;

        if let Some(ended) = self.flag_if_expired(&m, Utc::now()).await? {
            return Ok(BotTurn::Flagged {
                view: MatchView::new(&ended, role),
            });
        }

        let expected = m.version;
        let suggestion = self.engine.suggest(&m.position, level).await;

        let uci = match suggestion {
            Suggestion::Move(uci) => uci,
            Suggestion::NoMoveAvailable(reason) => {
                tracing::warn!(match_id = id, level, "No engine move available: {reason}");
                return Ok(BotTurn::NoMoveAvailable {
                    reason,
                    view: MatchView::new(&m, role),
                });
            }
        };

        let pos = parse_position(&m.position)?;
        let applied = match MoveInput::from_uci(&uci).map(|input| apply_to(&pos, &input)) {
            Ok(MoveOutcome::Applied(applied)) => applied,
            Ok(MoveOutcome::Illegal(_)) | Err(_) => {
                tracing::warn!(match_id = id, level, uci = %uci, "Engine suggested an unplayable move");
                return Ok(BotTurn::NoMoveAvailable {
                    reason: format!("Engine suggested an illegal move: {uci}"),
                    view: MatchView::new(&m, role),
                });
            }
        };

        // Thinking time counts against the engine's clock.
        let now = Utc::now();
        if let Some(ended) = self.flag_if_expired(&m, now).await? {
            return Ok(BotTurn::Flagged {
                view: MatchView::new(&ended, role),
            });
        }
        record_move(&mut m, &applied, now);
        let m = self.commit(m, expected).await?;
        tracing::info!(match_id = id, level, san = %applied.san, "Engine move played");

        Ok(BotTurn::Played {
            played: MoveView::from(&applied),
            view: MatchView::new(&m, role),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::matches::events::channel;

    /// Engine double that replays a fixed script, then gives up.
    #[derive(Default)]
    pub(crate) struct ScriptedEngine {
        replies: Mutex<Vec<Suggestion>>,
    }

    impl ScriptedEngine {
        pub(crate) fn new(moves: &[&str]) -> Self {
            let mut replies: Vec<Suggestion> =
                moves.iter().map(|m| Suggestion::Move(m.to_string())).collect();
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
            }
        }
    }

    #[async_trait]
    impl MoveSuggester for ScriptedEngine {
        async fn suggest(&self, _fen: &str, _level: u8) -> Suggestion {
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Suggestion::NoMoveAvailable("script exhausted".into()))
        }
    }

    pub(crate) fn setup(
        engine: ScriptedEngine,
    ) -> (MatchController, Arc<MemoryStore>, UnboundedReceiver<MatchEvent>) {
        let store = Arc::new(MemoryStore::new());
        let (events, rx) = channel();
        let controller = MatchController::new(store.clone(), Arc::new(engine), events);
        (controller, store, rx)
    }

    async fn guest_pair(c: &MatchController) -> (i64, Credential, Credential) {
        let created = c
            .create_match(CreateMatch::default(), &Credential::anonymous())
            .await
            .unwrap();
        (
            created.view.id,
            Credential::token(created.white_token.unwrap()),
            Credential::token(created.black_token.unwrap()),
        )
    }

    async fn play(c: &MatchController, id: i64, who: &Credential, uci: &str) -> MatchView {
        match c.apply_move(id, who, &uci[..2], &uci[2..4], None).await.unwrap() {
            MoveResult::Applied { view, .. } => view,
            other => panic!("move {uci} not applied: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_guest_vs_bot_first_moves() {
        let (c, _, _) = setup(ScriptedEngine::new(&["e7e5"]));
        let created = c
            .create_match(
                CreateMatch {
                    vs_ai: true,
                    human_side: Some(HumanSide::White),
                    ..Default::default()
                },
                &Credential::anonymous(),
            )
            .await
            .unwrap();
        assert!(created.black_token.is_none());
        let ai = created.ai.unwrap();
        assert_eq!((ai.side, ai.level, ai.depth), (Side::Black, 1, 2));

        let white = Credential::token(created.white_token.unwrap());
        let id = created.view.id;
        let view = play(&c, id, &white, "e2e4").await;
        assert_eq!(view.side_to_move, Side::Black);
        assert_eq!(view.move_log, "1. e4");
        assert_eq!(view.status, MatchStatus::Ongoing);

        match c.play_bot_turn(id, &white).await.unwrap() {
            BotTurn::Played { played, view } => {
                assert_eq!(played.san, "e5");
                assert_eq!(view.move_log, "1. e4 e5");
                assert_eq!(view.side_to_move, Side::White);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timed_vs_ai_opening_charges_only_the_mover() {
        let (c, store, _) = setup(ScriptedEngine::default());
        let created = c
            .create_match(
                CreateMatch {
                    vs_ai: true,
                    human_side: Some(HumanSide::White),
                    base_seconds: 300,
                    increment_seconds: 5,
                    ..Default::default()
                },
                &Credential::anonymous(),
            )
            .await
            .unwrap();
        let id = created.view.id;
        let stored = store.get_match(id).await.unwrap().unwrap();
        assert_eq!(stored.black, SideIdentity::Bot { level: 1 });
        assert!(matches!(stored.white, SideIdentity::Guest { .. }));

        let white = Credential::token(created.white_token.unwrap());
        let view = play(&c, id, &white, "e2e4").await;
        assert_eq!(view.status, MatchStatus::Ongoing);
        assert_eq!(view.side_to_move, Side::Black);
        assert_eq!(view.clock.black_remaining_ms, 300_000);
        // Thinking time is charged, then the increment is credited.
        assert!(view.clock.white_remaining_ms > 300_000);
        assert!(view.clock.white_remaining_ms <= 305_000);
    }

    #[tokio::test]
    async fn test_authenticated_human_side_is_bound_to_account() {
        let (c, store, _) = setup(ScriptedEngine::default());
        let created = c
            .create_match(
                CreateMatch {
                    vs_ai: true,
                    ai_level: Some(4),
                    human_side: Some(HumanSide::Black),
                    ..Default::default()
                },
                &Credential::user(7),
            )
            .await
            .unwrap();
        assert!(created.white_token.is_none() && created.black_token.is_none());
        assert_eq!(created.view.viewer, Role::Black);

        let m = store.get_match(created.view.id).await.unwrap().unwrap();
        assert_eq!(m.black, SideIdentity::User { user_id: 7 });
        assert_eq!(m.bot(), Some((Side::White, 4)));
    }

    #[tokio::test]
    async fn test_ai_level_out_of_range_is_rejected() {
        let (c, _, _) = setup(ScriptedEngine::default());
        let err = c
            .create_match(
                CreateMatch {
                    vs_ai: true,
                    ai_level: Some(MAX_AI_LEVEL + 1),
                    ..Default::default()
                },
                &Credential::anonymous(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_pairing_by_user_id_requires_admin() {
        let (c, _, _) = setup(ScriptedEngine::default());
        let req = CreateMatch {
            white_user_id: Some(1),
            black_user_id: Some(2),
            ..Default::default()
        };
        let err = c.create_match(req.clone(), &Credential::user(1)).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let created = c.create_match(req, &Credential::admin(99)).await.unwrap();
        assert!(created.white_token.is_none());
        assert_eq!(created.view.viewer, Role::Admin);

        let as_white = c.get_match(created.view.id, &Credential::user(1)).await.unwrap();
        assert_eq!(as_white.viewer, Role::White);
    }

    #[tokio::test]
    async fn test_out_of_turn_and_spectator_moves_are_refused() {
        let (c, store, _) = setup(ScriptedEngine::default());
        let (id, _, black) = guest_pair(&c).await;

        let err = c.apply_move(id, &black, "e7", "e5", None).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = c
            .apply_move(id, &Credential::anonymous(), "e2", "e4", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));

        let err = c
            .apply_move(id, &Credential::token("forged"), "e2", "e4", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));

        assert_eq!(store.get_match(id).await.unwrap().unwrap().version, 0);
    }

    #[tokio::test]
    async fn test_illegal_move_leaves_match_unchanged() {
        let (c, store, _) = setup(ScriptedEngine::default());
        let (id, white, _) = guest_pair(&c).await;
        let before = store.get_match(id).await.unwrap().unwrap();

        match c.apply_move(id, &white, "e2", "e5", None).await.unwrap() {
            MoveResult::Illegal { attempted, view } => {
                assert_eq!(attempted, "e2e5");
                assert_eq!(view.side_to_move, Side::White);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(store.get_match(id).await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn test_malformed_square_is_a_validation_error() {
        let (c, _, _) = setup(ScriptedEngine::default());
        let (id, white, _) = guest_pair(&c).await;
        let err = c.apply_move(id, &white, "z9", "e4", None).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_checkmate_finishes_and_freezes_match() {
        let (c, _, mut rx) = setup(ScriptedEngine::default());
        let (id, white, black) = guest_pair(&c).await;

        play(&c, id, &white, "f2f3").await;
        play(&c, id, &black, "e7e5").await;
        play(&c, id, &white, "g2g4").await;
        let view = play(&c, id, &black, "d8h4").await;

        assert_eq!(view.status, MatchStatus::Checkmate);
        assert_eq!(view.result.as_deref(), Some("0-1"));
        assert_eq!(view.move_log, "1. f3 e5 2. g4 Qh4#");

        let err = c.apply_move(id, &white, "a2", "a3", None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert!(c.resign(id, &white).await.is_err());

        assert_eq!(
            rx.try_recv().unwrap(),
            MatchEvent::Finished {
                match_id: id,
                status: MatchStatus::Checkmate,
                result: Some("0-1".into()),
                ephemeral: true,
            }
        );
    }

    #[tokio::test]
    async fn test_resignation_credits_opponent() {
        let (c, _, mut rx) = setup(ScriptedEngine::default());
        let (id, white, _) = guest_pair(&c).await;

        let view = c.resign(id, &white).await.unwrap();
        assert_eq!(view.status, MatchStatus::Resignation);
        assert_eq!(view.result.as_deref(), Some("0-1"));
        assert!(matches!(rx.try_recv(), Ok(MatchEvent::Finished { .. })));
    }

    #[tokio::test]
    async fn test_black_resignation_credits_white() {
        let (c, _, _) = setup(ScriptedEngine::default());
        let (id, white, black) = guest_pair(&c).await;
        play(&c, id, &white, "e2e4").await;

        let view = c.resign(id, &black).await.unwrap();
        assert_eq!(view.status, MatchStatus::Resignation);
        assert_eq!(view.result.as_deref(), Some("1-0"));
        assert_eq!(view.viewer, Role::Black);
    }

    #[tokio::test]
    async fn test_stale_write_is_a_conflict() {
        let (c, store, _) = setup(ScriptedEngine::default());
        let (id, white, _) = guest_pair(&c).await;
        let stale = store.get_match(id).await.unwrap().unwrap();

        play(&c, id, &white, "e2e4").await;

        let err = c.commit(stale.clone(), stale.version).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.get_match(id).await.unwrap().unwrap().move_log, "1. e4");
    }

    #[tokio::test]
    async fn test_force_close_is_admin_only() {
        let (c, _, _) = setup(ScriptedEngine::default());
        let (id, white, _) = guest_pair(&c).await;

        let err = c
            .force_close(id, &white, CloseReason::Draw, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
        let err = c
            .force_close(id, &Credential::user(3), CloseReason::Draw, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let view = c
            .force_close(id, &Credential::admin(1), CloseReason::Timeout, Some(Side::Black))
            .await
            .unwrap();
        assert_eq!(view.status, MatchStatus::Timeout);
        assert_eq!(view.result.as_deref(), Some("1-0"));

        let err = c
            .force_close(id, &Credential::admin(1), CloseReason::Draw, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    async fn timed_match(store: &MemoryStore, base_seconds: i32, started_ago: Duration) -> Match {
        let mut m = Match::new(
            None,
            SideIdentity::Guest { token: "w".into() },
            SideIdentity::Guest { token: "b".into() },
            base_seconds,
            0,
        );
        m.created_at = Utc::now() - started_ago;
        store.insert_match(&m).await.unwrap()
    }

    #[tokio::test]
    async fn test_claim_timeout_uses_stored_clock() {
        let (c, store, _) = setup(ScriptedEngine::default());
        let fresh = timed_match(&store, 60, Duration::seconds(1)).await;
        let err = c
            .claim_timeout(fresh.id, &Credential::token("b"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let flagged = timed_match(&store, 1, Duration::seconds(5)).await;
        let err = c
            .claim_timeout(flagged.id, &Credential::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));

        let view = c
            .claim_timeout(flagged.id, &Credential::token("b"))
            .await
            .unwrap();
        assert_eq!(view.status, MatchStatus::Timeout);
        assert_eq!(view.result.as_deref(), Some("0-1"));
        assert_eq!(view.clock.white_remaining_ms, 0);
    }

    #[tokio::test]
    async fn test_move_on_expired_clock_ends_on_time() {
        let (c, store, mut rx) = setup(ScriptedEngine::default());
        let mut m = Match::new(
            None,
            SideIdentity::Guest { token: "w".into() },
            SideIdentity::Guest { token: "b".into() },
            1,
            5,
        );
        m.created_at = Utc::now() - Duration::seconds(30);
        let id = store.insert_match(&m).await.unwrap().id;

        let result = c
            .apply_move(id, &Credential::token("w"), "e2", "e4", None)
            .await
            .unwrap();
        let MoveResult::Flagged { view } = result else {
            panic!("expired clock should not allow a move: {result:?}");
        };
        assert_eq!(view.status, MatchStatus::Timeout);
        assert_eq!(view.result.as_deref(), Some("0-1"));
        assert_eq!(view.clock.white_remaining_ms, 0);
        assert_eq!(view.move_log, "");

        let stored = store.get_match(id).await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Timeout);
        assert_eq!(stored.move_log, "");
        assert!(matches!(
            rx.try_recv(),
            Ok(MatchEvent::Finished { status: MatchStatus::Timeout, .. })
        ));

        let err = c.claim_timeout(id, &Credential::token("b")).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_engine_with_expired_clock_is_flagged() {
        let (c, store, _) = setup(ScriptedEngine::new(&["e2e4"]));
        let mut m = Match::new(
            None,
            SideIdentity::Bot { level: 2 },
            SideIdentity::Guest { token: "b".into() },
            1,
            0,
        );
        m.created_at = Utc::now() - Duration::seconds(10);
        let id = store.insert_match(&m).await.unwrap().id;

        match c.play_bot_turn(id, &Credential::token("b")).await.unwrap() {
            BotTurn::Flagged { view } => {
                assert_eq!(view.status, MatchStatus::Timeout);
                assert_eq!(view.result.as_deref(), Some("0-1"));
                assert_eq!(view.move_log, "");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_claim_timeout_on_untimed_match() {
        let (c, _, _) = setup(ScriptedEngine::default());
        let (id, white, _) = guest_pair(&c).await;
        let err = c.claim_timeout(id, &white).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[test]
    fn test_record_move_charges_clock_and_adds_increment() {
        let mut m = Match::new(
            None,
            SideIdentity::new_guest(),
            SideIdentity::new_guest(),
            60,
            2,
        );
        let now = Utc::now();
        m.created_at = now - Duration::seconds(10);

        let pos = parse_position(&m.position).unwrap();
        let input = MoveInput::parse("e2", "e4", None).unwrap();
        let MoveOutcome::Applied(applied) = apply_to(&pos, &input) else {
            panic!("e2e4 should be legal");
        };
        m.draw_offer = Some(Side::Black);
        record_move(&mut m, &applied, now);

        assert_eq!(m.white_remaining_ms, 60_000 - 10_000 + 2_000);
        assert_eq!(m.black_remaining_ms, 60_000);
        assert_eq!(m.last_move_at, Some(now));
        assert!(m.draw_offer.is_none());
        assert_eq!(time_left_ms(&m, now), 60_000);
    }

    #[tokio::test]
    async fn test_bot_turn_refusals() {
        let (c, _, _) = setup(ScriptedEngine::new(&["e2e4"]));
        let created = c
            .create_match(
                CreateMatch {
                    vs_ai: true,
                    human_side: Some(HumanSide::White),
                    ..Default::default()
                },
                &Credential::anonymous(),
            )
            .await
            .unwrap();
        let id = created.view.id;
        let white = Credential::token(created.white_token.unwrap());

        let err = c.play_bot_turn(id, &white).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        play(&c, id, &white, "d2d4").await;
        // e2e4 is not a black move.
        match c.play_bot_turn(id, &white).await.unwrap() {
            BotTurn::NoMoveAvailable { view, .. } => assert_eq!(view.side_to_move, Side::Black),
            other => panic!("unexpected {other:?}"),
        }
        // Script is now exhausted.
        assert!(matches!(
            c.play_bot_turn(id, &white).await.unwrap(),
            BotTurn::NoMoveAvailable { .. }
        ));
    }

    #[tokio::test]
    async fn test_legal_targets_lists_destinations() {
        let (c, _, _) = setup(ScriptedEngine::default());
        let (id, _, _) = guest_pair(&c).await;
        assert_eq!(c.legal_targets(id, "g1").await.unwrap(), vec!["f3", "h3"]);
        assert!(c.legal_targets(id, "e4").await.unwrap().is_empty());
        assert!(matches!(
            c.legal_targets(id, "k9").await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_list_ongoing_excludes_finished() {
        let (c, _, _) = setup(ScriptedEngine::default());
        let (a, white, _) = guest_pair(&c).await;
        let (b, _, _) = guest_pair(&c).await;
        c.resign(a, &white).await.unwrap();

        let ids: Vec<i64> = c.list_ongoing().await.unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![b]);
    }
}
