use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chess_rules::Side;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use validator::Validate;

use crate::auth::middleware::Credential;
use crate::error::AppError;
use crate::matches::lifecycle::{BotTurn, CloseReason, CreateMatch, HumanSide, MoveResult};
use crate::matches::model::{MatchSummary, MatchView, MAX_AI_LEVEL, MIN_AI_LEVEL};
use crate::matches::MatchController;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMatchBody {
    #[validate(length(max = 120))]
    pub title: Option<String>,
    #[serde(default, alias = "vsAI")]
    pub vs_ai: bool,
    #[validate(range(min = MIN_AI_LEVEL, max = MAX_AI_LEVEL))]
    pub ai_level: Option<u8>,
    pub human_side: Option<HumanSide>,
    #[serde(default)]
    #[validate(range(min = 0, max = 10800))]
    pub base_seconds: i32,
    #[serde(default)]
    #[validate(range(min = 0, max = 180))]
    pub increment_seconds: i32,
    pub white_user_id: Option<i64>,
    pub black_user_id: Option<i64>,
}

impl From<CreateMatchBody> for CreateMatch {
    fn from(body: CreateMatchBody) -> Self {
        Self {
            title: body.title,
            vs_ai: body.vs_ai,
            ai_level: body.ai_level,
            human_side: body.human_side,
            base_seconds: body.base_seconds,
            increment_seconds: body.increment_seconds,
            white_user_id: body.white_user_id,
            black_user_id: body.black_user_id,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct MoveBody {
    #[validate(length(equal = 2))]
    pub from: String,
    #[validate(length(equal = 2))]
    pub to: String,
    #[validate(length(equal = 1))]
    pub promotion: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CloseBody {
    pub reason: CloseReason,
    pub loser: Option<Side>,
}

#[derive(Debug, Deserialize)]
pub struct TargetsQuery {
    pub square: String,
}

fn with_match(view: MatchView) -> Json<JsonValue> {
    Json(json!({ "ok": true, "match": view }))
}

/// POST /api/matches
/// Side tokens appear only in this response.
pub async fn create_match(
    Extension(matches): Extension<MatchController>,
    credential: Credential,
    Json(body): Json<CreateMatchBody>,
) -> Result<impl IntoResponse, AppError> {
    body.validate()?;
    let created = matches.create_match(body.into(), &credential).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/matches
pub async fn list_matches(
    Extension(matches): Extension<MatchController>,
) -> Result<Json<Vec<MatchSummary>>, AppError> {
    Ok(Json(matches.list_ongoing().await?))
}

/// GET /api/matches/{id}
pub async fn get_match(
    Extension(matches): Extension<MatchController>,
    Path(id): Path<i64>,
    credential: Credential,
) -> Result<Json<MatchView>, AppError> {
    Ok(Json(matches.get_match(id, &credential).await?))
}

/// POST /api/matches/{id}/move
/// An illegal move is 422 with the unchanged match; a move on an expired
/// clock ends the match on time and answers 409.
pub async fn make_move(
    Extension(matches): Extension<MatchController>,
    Path(id): Path<i64>,
    credential: Credential,
    Json(body): Json<MoveBody>,
) -> Result<Response, AppError> {
    body.validate()?;
    let result = matches
        .apply_move(id, &credential, &body.from, &body.to, body.promotion.as_deref())
        .await?;

    Ok(match result {
        MoveResult::Applied { played, view } => {
            Json(json!({ "ok": true, "move": played, "match": view })).into_response()
        }
        MoveResult::Illegal { attempted, view } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "ok": false,
                "detail": "Illegal move",
                "attempted": attempted,
                "match": view,
            })),
        )
            .into_response(),
        MoveResult::Flagged { view } => (
            StatusCode::CONFLICT,
            Json(json!({ "ok": false, "detail": "Clock expired", "match": view })),
        )
            .into_response(),
    })
}

/// POST /api/matches/{id}/resign
pub async fn resign(
    Extension(matches): Extension<MatchController>,
    Path(id): Path<i64>,
    credential: Credential,
) -> Result<Json<JsonValue>, AppError> {
    Ok(with_match(matches.resign(id, &credential).await?))
}

/// POST /api/matches/{id}/draw/offer
pub async fn offer_draw(
    Extension(matches): Extension<MatchController>,
    Path(id): Path<i64>,
    credential: Credential,
) -> Result<Json<JsonValue>, AppError> {
    let (outcome, view) = matches.offer_draw(id, &credential).await?;
    Ok(Json(json!({ "ok": true, "outcome": outcome, "match": view })))
}

/// POST /api/matches/{id}/draw/decline
pub async fn decline_draw(
    Extension(matches): Extension<MatchController>,
    Path(id): Path<i64>,
    credential: Credential,
) -> Result<Json<JsonValue>, AppError> {
    Ok(with_match(matches.decline_draw(id, &credential).await?))
}

/// POST /api/matches/{id}/bot-move
/// An unavailable engine is not an error; the client may retry.
pub async fn bot_move(
    Extension(matches): Extension<MatchController>,
    Path(id): Path<i64>,
    credential: Credential,
) -> Result<Json<JsonValue>, AppError> {
    Ok(match matches.play_bot_turn(id, &credential).await? {
        BotTurn::Played { played, view } => {
            Json(json!({ "ok": true, "move": played, "match": view }))
        }
        BotTurn::NoMoveAvailable { reason, view } => {
            Json(json!({ "ok": false, "detail": reason, "match": view }))
        }
        BotTurn::Flagged { view } => {
            Json(json!({ "ok": false, "detail": "Clock expired", "match": view }))
        }
    })
}

/// POST /api/matches/{id}/claim-timeout
pub async fn claim_timeout(
    Extension(matches): Extension<MatchController>,
    Path(id): Path<i64>,
    credential: Credential,
) -> Result<Json<JsonValue>, AppError> {
    Ok(with_match(matches.claim_timeout(id, &credential).await?))
}

/// GET /api/matches/{id}/legal-targets?square=e2
pub async fn legal_targets(
    Extension(matches): Extension<MatchController>,
    Path(id): Path<i64>,
    Query(q): Query<TargetsQuery>,
) -> Result<Json<JsonValue>, AppError> {
    let targets = matches.legal_targets(id, &q.square).await?;
    Ok(Json(json!({ "square": q.square, "targets": targets })))
}

/// POST /api/admin/matches/{id}/close
pub async fn force_close(
    Extension(matches): Extension<MatchController>,
    Path(id): Path<i64>,
    credential: Credential,
    Json(body): Json<CloseBody>,
) -> Result<Json<JsonValue>, AppError> {
    let view = matches
        .force_close(id, &credential, body.reason, body.loser)
        .await?;
    Ok(with_match(view))
}
