use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool};

use crate::db::store::PuzzleStore;
use crate::error::AppError;
use crate::puzzles::model::{AttemptStatus, Puzzle, PuzzleAttempt};

#[derive(Debug, sqlx::FromRow)]
struct PuzzleRow {
    id: i64,
    title: Option<String>,
    fen: String,
    solution: Json<Vec<String>>,
}

#[derive(Debug, sqlx::FromRow)]
struct AttemptRow {
    id: i64,
    user_id: i64,
    puzzle_id: i64,
    progress: i32,
    status: String,
    created_at: DateTime<Utc>,
    solved_at: Option<DateTime<Utc>>,
}

impl TryFrom<AttemptRow> for PuzzleAttempt {
    type Error = AppError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        let status = AttemptStatus::parse(&row.status).ok_or_else(|| {
            AppError::Internal(format!("attempt {}: bad status '{}'", row.id, row.status))
        })?;
        Ok(PuzzleAttempt {
            id: row.id,
            user_id: row.user_id,
            puzzle_id: row.puzzle_id,
            progress: row.progress,
            status,
            created_at: row.created_at,
            solved_at: row.solved_at,
        })
    }
}

#[derive(Clone)]
pub struct PgPuzzleStore {
    pool: PgPool,
}

impl PgPuzzleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PuzzleStore for PgPuzzleStore {
    async fn get_puzzle(&self, id: i64) -> Result<Option<Puzzle>, AppError> {
        let row = sqlx::query_as::<_, PuzzleRow>(
            "SELECT id, title, fen, solution FROM puzzles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Sqlx)?;

        Ok(row.map(|r| Puzzle {
            id: r.id,
            title: r.title,
            fen: r.fen,
            solution: r.solution.0,
        }))
    }

    async fn find_or_create_attempt(
        &self,
        user_id: i64,
        puzzle_id: i64,
    ) -> Result<PuzzleAttempt, AppError> {
        sqlx::query(
            r#"INSERT INTO puzzle_attempts (user_id, puzzle_id)
               VALUES ($1, $2)
               ON CONFLICT (user_id, puzzle_id) DO NOTHING"#,
        )
        .bind(user_id)
        .bind(puzzle_id)
        .execute(&self.pool)
        .await
        .map_err(AppError::Sqlx)?;

        let row = sqlx::query_as::<_, AttemptRow>(
            r#"SELECT id, user_id, puzzle_id, progress, status, created_at, solved_at
               FROM puzzle_attempts WHERE user_id = $1 AND puzzle_id = $2"#,
        )
        .bind(user_id)
        .bind(puzzle_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Sqlx)?;

        row.try_into()
    }

    async fn get_attempt(&self, id: i64) -> Result<Option<PuzzleAttempt>, AppError> {
        let row = sqlx::query_as::<_, AttemptRow>(
            r#"SELECT id, user_id, puzzle_id, progress, status, created_at, solved_at
               FROM puzzle_attempts WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Sqlx)?;

        row.map(PuzzleAttempt::try_from).transpose()
    }

    async fn update_attempt(
        &self,
        attempt: &PuzzleAttempt,
        expected_progress: i32,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"UPDATE puzzle_attempts
               SET progress = $2, status = $3, solved_at = $4
               WHERE id = $1 AND progress = $5 AND status = 'attempting'"#,
        )
        .bind(attempt.id)
        .bind(attempt.progress)
        .bind(attempt.status.as_str())
        .bind(attempt.solved_at)
        .bind(expected_progress)
        .execute(&self.pool)
        .await
        .map_err(AppError::Sqlx)?;

        Ok(result.rows_affected() == 1)
    }
}
