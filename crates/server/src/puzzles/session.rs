//! Puzzle sessions: per-user progress through a fixed solution line.
//!
//! The board is rebuilt from the stored solution on every submission; the
//! client's copy is never consulted.

use std::sync::Arc;

use chess_rules::{
    apply_to, encode_position, notation_matches, parse_position, play_san, replay_san,
    terminal_of, MoveInput, MoveOutcome,
};
use serde::Serialize;

use crate::db::PuzzleStore;
use crate::error::AppError;
use crate::puzzles::model::{AttemptStatus, Puzzle, PuzzleAttempt};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedAttempt {
    pub attempt_id: i64,
    pub puzzle_id: i64,
    pub title: Option<String>,
    /// The puzzle's own starting position.
    pub initial_position: String,
    /// Position after the confirmed plies.
    pub position: String,
    pub progress: i32,
    pub total: i32,
    pub status: AttemptStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptedReply {
    pub san: String,
    pub uci: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleMoveResult {
    pub correct: bool,
    pub solved: bool,
    pub progress: i32,
    pub total: i32,
    pub position: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Revealed on a wrong move.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub played: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<ScriptedReply>,
}

impl PuzzleMoveResult {
    fn rejected(attempt: &PuzzleAttempt, total: i32, position: String, message: &str) -> Self {
        Self {
            correct: false,
            solved: false,
            progress: attempt.progress,
            total,
            position,
            message: Some(message.to_string()),
            expected: None,
            played: None,
            reply: None,
        }
    }
}

fn solution_len(puzzle: &Puzzle) -> i32 {
    i32::try_from(puzzle.solution.len()).unwrap_or(i32::MAX)
}

/// Number of solution plies already confirmed, as an index into the solution.
fn confirmed_plies(puzzle: &Puzzle, progress: i32) -> Result<usize, AppError> {
    usize::try_from(progress)
        .map(|plies| plies.min(puzzle.solution.len()))
        .map_err(|_| {
            AppError::Internal(format!("puzzle {}: negative progress {progress}", puzzle.id))
        })
}

/// Board after the first `progress` solution plies.
fn current_board(puzzle: &Puzzle, progress: i32) -> Result<shakmaty::Chess, AppError> {
    let confirmed = confirmed_plies(puzzle, progress)?;
    replay_san(&puzzle.fen, &puzzle.solution[..confirmed]).map_err(|e| {
        tracing::error!(puzzle_id = puzzle.id, "Stored solution does not replay: {e}");
        AppError::from(e)
    })
}

#[derive(Clone)]
pub struct PuzzleController {
    store: Arc<dyn PuzzleStore>,
}

impl PuzzleController {
    pub fn new(store: Arc<dyn PuzzleStore>) -> Self {
        Self { store }
    }

    async fn load_puzzle(&self, puzzle_id: i64) -> Result<Puzzle, AppError> {
        self.store
            .get_puzzle(puzzle_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Puzzle {puzzle_id} not found")))
    }

    async fn save(&self, attempt: &PuzzleAttempt, expected_progress: i32) -> Result<(), AppError> {
        if self.store.update_attempt(attempt, expected_progress).await? {
            Ok(())
        } else {
            tracing::warn!(attempt_id = attempt.id, expected_progress, "Lost write race on attempt");
            Err(AppError::Conflict(
                "Attempt was updated concurrently; reload and retry".into(),
            ))
        }
    }

    pub async fn start_attempt(
        &self,
        user_id: i64,
        puzzle_id: i64,
    ) -> Result<StartedAttempt, AppError> {
        let puzzle = self.load_puzzle(puzzle_id).await?;
        let attempt = self.store.find_or_create_attempt(user_id, puzzle_id).await?;
        let board = current_board(&puzzle, attempt.progress)?;

        tracing::debug!(user_id, puzzle_id, attempt_id = attempt.id, progress = attempt.progress, "Puzzle attempt started");
        Ok(StartedAttempt {
            attempt_id: attempt.id,
            puzzle_id,
            title: puzzle.title.clone(),
            initial_position: encode_position(&parse_position(&puzzle.fen)?),
            position: encode_position(&board),
            progress: attempt.progress,
            total: solution_len(&puzzle),
            status: attempt.status,
        })
    }

    pub async fn submit_move(
        &self,
        user_id: i64,
        attempt_id: i64,
        puzzle_id: i64,
        from: &str,
        to: &str,
        promotion: Option<&str>,
    ) -> Result<PuzzleMoveResult, AppError> {
        let mut attempt = self
            .store
            .get_attempt(attempt_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Attempt {attempt_id} not found")))?;
        if attempt.user_id != user_id || attempt.puzzle_id != puzzle_id {
            return Err(AppError::InvalidAttempt);
        }
        if attempt.status == AttemptStatus::Solved {
            return Err(AppError::InvalidState("Puzzle already solved".into()));
        }

        let puzzle = self.load_puzzle(puzzle_id).await?;
        let total = solution_len(&puzzle);
        let expected_progress = attempt.progress;
        let board = current_board(&puzzle, attempt.progress)?;

        // Nothing left to play: record the solve and stop.
        if attempt.progress >= total || terminal_of(&board).is_some() {
            attempt.mark_solved();
            self.save(&attempt, expected_progress).await?;
            return Ok(PuzzleMoveResult {
                correct: true,
                solved: true,
                progress: attempt.progress,
                total,
                position: encode_position(&board),
                message: None,
                expected: None,
                played: None,
                reply: None,
            });
        }

        let input = MoveInput::parse(from, to, promotion)?;
        let applied = match apply_to(&board, &input) {
            MoveOutcome::Applied(applied) => applied,
            MoveOutcome::Illegal(_) => {
                return Ok(PuzzleMoveResult::rejected(
                    &attempt,
                    total,
                    encode_position(&board),
                    "Illegal move",
                ));
            }
        };

        let expected = puzzle
            .solution
            .get(confirmed_plies(&puzzle, attempt.progress)?)
            .ok_or_else(|| AppError::Internal(format!("puzzle {puzzle_id}: solution exhausted")))?;
        if !notation_matches(expected, &applied) {
            tracing::debug!(attempt_id, expected = %expected, played = %applied.san, "Puzzle move mismatch");
            return Ok(PuzzleMoveResult {
                expected: Some(expected.clone()),
                played: Some(applied.san.clone()),
                ..PuzzleMoveResult::rejected(
                    &attempt,
                    total,
                    encode_position(&board),
                    "Incorrect move",
                )
            });
        }

        attempt.progress += 1;
        let mut position = applied.position.clone();
        let mut reply = None;
        if let Some(scripted) = puzzle.solution.get(confirmed_plies(&puzzle, attempt.progress)?) {
            let answered = play_san(&applied.board, scripted).map_err(|e| {
                tracing::error!(puzzle_id, "Scripted reply {scripted} does not play: {e}");
                AppError::from(e)
            })?;
            attempt.progress += 1;
            position = answered.position.clone();
            reply = Some(ScriptedReply {
                san: answered.san,
                uci: answered.uci,
            });
        }

        let solved = attempt.progress >= total;
        if solved {
            attempt.mark_solved();
        }
        self.save(&attempt, expected_progress).await?;
        if solved {
            tracing::info!(user_id, puzzle_id, attempt_id, "Puzzle solved");
        }

        Ok(PuzzleMoveResult {
            correct: true,
            solved,
            progress: attempt.progress,
            total,
            position,
            message: None,
            expected: None,
            played: Some(applied.san),
            reply,
        })
    }
}
