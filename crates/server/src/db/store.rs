//! Store seams. Each mutation is a single conditioned write; the condition is
//! the only concurrency guard between requests.

use async_trait::async_trait;

use crate::error::AppError;
use crate::matches::model::Match;
use crate::puzzles::model::{Puzzle, PuzzleAttempt};

#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Insert a new match; the returned copy carries the assigned id.
    async fn insert_match(&self, m: &Match) -> Result<Match, AppError>;

    async fn get_match(&self, id: i64) -> Result<Option<Match>, AppError>;

    async fn list_ongoing(&self) -> Result<Vec<Match>, AppError>;

    /// Write `m` only if the stored row is still ongoing at `expected_version`.
    /// Returns `false` when another write got there first.
    async fn update_match(&self, m: &Match, expected_version: i64) -> Result<bool, AppError>;

    async fn delete_match(&self, id: i64) -> Result<bool, AppError>;
}

#[async_trait]
pub trait PuzzleStore: Send + Sync {
    async fn get_puzzle(&self, id: i64) -> Result<Option<Puzzle>, AppError>;

    /// Fetch the (user, puzzle) attempt, creating it on first use.
    async fn find_or_create_attempt(
        &self,
        user_id: i64,
        puzzle_id: i64,
    ) -> Result<PuzzleAttempt, AppError>;

    async fn get_attempt(&self, id: i64) -> Result<Option<PuzzleAttempt>, AppError>;

    /// Write `attempt` only if the stored progress still equals `expected_progress`.
    async fn update_attempt(
        &self,
        attempt: &PuzzleAttempt,
        expected_progress: i32,
    ) -> Result<bool, AppError>;
}
