use axum::{extract::Path, Extension, Json};
use serde::Deserialize;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::error::AppError;
use crate::puzzles::session::{PuzzleMoveResult, StartedAttempt};
use crate::puzzles::PuzzleController;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleMoveBody {
    pub puzzle_id: i64,
    #[validate(length(equal = 2))]
    pub from: String,
    #[validate(length(equal = 2))]
    pub to: String,
    #[validate(length(equal = 1))]
    pub promotion: Option<String>,
}

/// POST /api/puzzles/{puzzle_id}/attempts
/// Fetch-or-create the caller's attempt.
pub async fn start_attempt(
    Extension(puzzles): Extension<PuzzleController>,
    Path(puzzle_id): Path<i64>,
    user: AuthUser,
) -> Result<Json<StartedAttempt>, AppError> {
    Ok(Json(puzzles.start_attempt(user.id, puzzle_id).await?))
}

/// POST /api/puzzles/attempts/{attempt_id}/move
pub async fn submit_move(
    Extension(puzzles): Extension<PuzzleController>,
    Path(attempt_id): Path<i64>,
    user: AuthUser,
    Json(body): Json<PuzzleMoveBody>,
) -> Result<Json<PuzzleMoveResult>, AppError> {
    body.validate()?;
    let result = puzzles
        .submit_move(
            user.id,
            attempt_id,
            body.puzzle_id,
            &body.from,
            &body.to,
            body.promotion.as_deref(),
        )
        .await?;
    Ok(Json(result))
}
