use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chess_rules::RulesError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Not authenticated")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Draw already offered")]
    AlreadyOffered,

    #[error("No draw offer to decline")]
    NoOfferToDecline,

    #[error("Attempt does not belong to this user and puzzle")]
    InvalidAttempt,

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl AppError {
    pub fn not_your_turn() -> Self {
        AppError::Forbidden("Not your turn".into())
    }

    pub fn match_not_found(id: i64) -> Self {
        AppError::NotFound(format!("Match {id} not found"))
    }

    pub fn not_ongoing() -> Self {
        AppError::InvalidState("Match is not ongoing".into())
    }

    /// Stable machine-readable kind.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "validation_error",
            AppError::Unauthorized => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidState(_) => "invalid_state",
            AppError::Conflict(_) => "conflict",
            AppError::AlreadyOffered => "already_offered",
            AppError::NoOfferToDecline => "no_offer_to_decline",
            AppError::InvalidAttempt => "invalid_attempt",
            AppError::Internal(_) | AppError::Sqlx(_) => "internal",
        }
    }
}

impl From<RulesError> for AppError {
    fn from(e: RulesError) -> Self {
        if e.is_input_error() {
            AppError::BadRequest(e.to_string())
        } else {
            AppError::Internal(e.to_string())
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Not authenticated".to_string()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::InvalidState(msg) | AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, msg.clone())
            }
            AppError::AlreadyOffered | AppError::NoOfferToDecline => {
                (StatusCode::CONFLICT, self.to_string())
            }
            AppError::InvalidAttempt => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::Sqlx(e) => {
                tracing::error!("Database error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
        };

        (status, Json(json!({ "detail": message, "code": self.code() }))).into_response()
    }
}
