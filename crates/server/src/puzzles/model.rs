use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Puzzle as managed by the catalogue. Read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Puzzle {
    pub id: i64,
    pub title: Option<String>,
    /// Starting position; placement-only FEN is accepted.
    pub fen: String,
    /// Canonical solution in SAN, alternating solver and scripted replies.
    pub solution: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Attempting,
    Solved,
}

impl AttemptStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttemptStatus::Attempting => "attempting",
            AttemptStatus::Solved => "solved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "attempting" => Some(AttemptStatus::Attempting),
            "solved" => Some(AttemptStatus::Solved),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuzzleAttempt {
    pub id: i64,
    pub user_id: i64,
    pub puzzle_id: i64,
    /// Solution plies already confirmed.
    pub progress: i32,
    pub status: AttemptStatus,
    pub created_at: DateTime<Utc>,
    pub solved_at: Option<DateTime<Utc>>,
}

impl PuzzleAttempt {
    pub fn new(user_id: i64, puzzle_id: i64) -> Self {
        Self {
            id: 0,
            user_id,
            puzzle_id,
            progress: 0,
            status: AttemptStatus::Attempting,
            created_at: Utc::now(),
            solved_at: None,
        }
    }

    pub fn mark_solved(&mut self) {
        if self.status != AttemptStatus::Solved {
            self.status = AttemptStatus::Solved;
            self.solved_at = Some(Utc::now());
        }
    }
}
