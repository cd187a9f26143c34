use async_trait::async_trait;
use chess_rules::Side;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool};

use crate::db::store::MatchStore;
use crate::error::AppError;
use crate::matches::model::{Match, MatchStatus, SideIdentity};

const MATCH_COLUMNS: &str = r#"id, title, position, move_log, status, result, side_to_move,
    draw_offer, white, black, base_seconds, increment_seconds,
    white_remaining_ms, black_remaining_ms, version, created_at, last_move_at"#;

#[derive(Debug, sqlx::FromRow)]
struct MatchRow {
    id: i64,
    title: Option<String>,
    position: String,
    move_log: String,
    status: String,
    result: Option<String>,
    side_to_move: String,
    draw_offer: Option<String>,
    white: Json<SideIdentity>,
    black: Json<SideIdentity>,
    base_seconds: i32,
    increment_seconds: i32,
    white_remaining_ms: i64,
    black_remaining_ms: i64,
    version: i64,
    created_at: DateTime<Utc>,
    last_move_at: Option<DateTime<Utc>>,
}

impl TryFrom<MatchRow> for Match {
    type Error = AppError;

    fn try_from(row: MatchRow) -> Result<Self, Self::Error> {
        let corrupt = |field: &str, value: &str| {
            AppError::Internal(format!("match {}: bad {field} '{value}'", row.id))
        };
        let status = MatchStatus::parse(&row.status).ok_or_else(|| corrupt("status", &row.status))?;
        let side_to_move =
            Side::parse(&row.side_to_move).ok_or_else(|| corrupt("side_to_move", &row.side_to_move))?;
        let draw_offer = match row.draw_offer.as_deref() {
            Some(s) => Some(Side::parse(s).ok_or_else(|| corrupt("draw_offer", s))?),
            None => None,
        };

        Ok(Match {
            id: row.id,
            title: row.title,
            created_at: row.created_at,
            last_move_at: row.last_move_at,
            position: row.position,
            move_log: row.move_log,
            status,
            result: row.result,
            side_to_move,
            draw_offer,
            white: row.white.0,
            black: row.black.0,
            base_seconds: row.base_seconds,
            increment_seconds: row.increment_seconds,
            white_remaining_ms: row.white_remaining_ms,
            black_remaining_ms: row.black_remaining_ms,
            version: row.version,
        })
    }
}

#[derive(Clone)]
pub struct PgMatchStore {
    pool: PgPool,
}

impl PgMatchStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MatchStore for PgMatchStore {
    async fn insert_match(&self, m: &Match) -> Result<Match, AppError> {
        let row: (i64,) = sqlx::query_as(
            r#"INSERT INTO matches (
                title, position, move_log, status, result, side_to_move, draw_offer,
                white, black, base_seconds, increment_seconds,
                white_remaining_ms, black_remaining_ms, version, created_at, last_move_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING id"#,
        )
        .bind(&m.title)
        .bind(&m.position)
        .bind(&m.move_log)
        .bind(m.status.as_str())
        .bind(&m.result)
        .bind(m.side_to_move.as_str())
        .bind(m.draw_offer.map(Side::as_str))
        .bind(Json(&m.white))
        .bind(Json(&m.black))
        .bind(m.base_seconds)
        .bind(m.increment_seconds)
        .bind(m.white_remaining_ms)
        .bind(m.black_remaining_ms)
        .bind(m.version)
        .bind(m.created_at)
        .bind(m.last_move_at)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Sqlx)?;

        Ok(Match { id: row.0, ..m.clone() })
    }

    async fn get_match(&self, id: i64) -> Result<Option<Match>, AppError> {
        let row = sqlx::query_as::<_, MatchRow>(&format!(
            "SELECT {MATCH_COLUMNS} FROM matches WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Sqlx)?;

        row.map(Match::try_from).transpose()
    }

    async fn list_ongoing(&self) -> Result<Vec<Match>, AppError> {
        let rows = sqlx::query_as::<_, MatchRow>(&format!(
            "SELECT {MATCH_COLUMNS} FROM matches WHERE status = 'ongoing' ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Sqlx)?;

        rows.into_iter().map(Match::try_from).collect()
    }

    async fn update_match(&self, m: &Match, expected_version: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"UPDATE matches SET
                position = $2,
                move_log = $3,
                status = $4,
                result = $5,
                side_to_move = $6,
                draw_offer = $7,
                white_remaining_ms = $8,
                black_remaining_ms = $9,
                last_move_at = $10,
                version = $11
            WHERE id = $1 AND version = $12 AND status = 'ongoing'"#,
        )
        .bind(m.id)
        .bind(&m.position)
        .bind(&m.move_log)
        .bind(m.status.as_str())
        .bind(&m.result)
        .bind(m.side_to_move.as_str())
        .bind(m.draw_offer.map(Side::as_str))
        .bind(m.white_remaining_ms)
        .bind(m.black_remaining_ms)
        .bind(m.last_move_at)
        .bind(m.version)
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(AppError::Sqlx)?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_match(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM matches WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Sqlx)?;
        Ok(result.rows_affected() > 0)
    }
}
