//! In-memory store for tests and database-less development.
//!
//! Applies the same write conditions as the Postgres store.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::db::store::{MatchStore, PuzzleStore};
use crate::error::AppError;
use crate::matches::model::Match;
use crate::puzzles::model::{AttemptStatus, Puzzle, PuzzleAttempt};

#[derive(Default)]
struct Tables {
    matches: HashMap<i64, Match>,
    puzzles: HashMap<i64, Puzzle>,
    attempts: HashMap<i64, PuzzleAttempt>,
    next_match_id: i64,
    next_attempt_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_puzzles(puzzles: impl IntoIterator<Item = Puzzle>) -> Self {
        let store = Self::new();
        for puzzle in puzzles {
            store.put_puzzle(puzzle);
        }
        store
    }

    /// Seed or replace a catalogue entry.
    pub fn put_puzzle(&self, puzzle: Puzzle) {
        if let Ok(mut t) = self.tables.lock() {
            t.puzzles.insert(puzzle.id, puzzle);
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Tables>, AppError> {
        self.tables
            .lock()
            .map_err(|_| AppError::Internal("memory store poisoned".into()))
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn insert_match(&self, m: &Match) -> Result<Match, AppError> {
        let mut t = self.lock()?;
        t.next_match_id += 1;
        let stored = Match {
            id: t.next_match_id,
            ..m.clone()
        };
        t.matches.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_match(&self, id: i64) -> Result<Option<Match>, AppError> {
        Ok(self.lock()?.matches.get(&id).cloned())
    }

    async fn list_ongoing(&self) -> Result<Vec<Match>, AppError> {
        let t = self.lock()?;
        let mut ongoing: Vec<Match> = t.matches.values().filter(|m| m.is_ongoing()).cloned().collect();
        ongoing.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(ongoing)
    }

    async fn update_match(&self, m: &Match, expected_version: i64) -> Result<bool, AppError> {
        let mut t = self.lock()?;
        match t.matches.get_mut(&m.id) {
            Some(stored) if stored.version == expected_version && stored.is_ongoing() => {
                *stored = m.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_match(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.lock()?.matches.remove(&id).is_some())
    }
}

#[async_trait]
impl PuzzleStore for MemoryStore {
    async fn get_puzzle(&self, id: i64) -> Result<Option<Puzzle>, AppError> {
        Ok(self.lock()?.puzzles.get(&id).cloned())
    }

    async fn find_or_create_attempt(
        &self,
        user_id: i64,
        puzzle_id: i64,
    ) -> Result<PuzzleAttempt, AppError> {
        let mut t = self.lock()?;
        if let Some(existing) = t
            .attempts
            .values()
            .find(|a| a.user_id == user_id && a.puzzle_id == puzzle_id)
        {
            return Ok(existing.clone());
        }
        t.next_attempt_id += 1;
        let attempt = PuzzleAttempt {
            id: t.next_attempt_id,
            ..PuzzleAttempt::new(user_id, puzzle_id)
        };
        t.attempts.insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    async fn get_attempt(&self, id: i64) -> Result<Option<PuzzleAttempt>, AppError> {
        Ok(self.lock()?.attempts.get(&id).cloned())
    }

    async fn update_attempt(
        &self,
        attempt: &PuzzleAttempt,
        expected_progress: i32,
    ) -> Result<bool, AppError> {
        let mut t = self.lock()?;
        match t.attempts.get_mut(&attempt.id) {
            Some(stored)
                if stored.progress == expected_progress
                    && stored.status == AttemptStatus::Attempting =>
            {
                *stored = attempt.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
