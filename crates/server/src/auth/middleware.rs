use axum::{extract::FromRequestParts, http::request::Parts};

use crate::auth::jwt;
use crate::config::Config;
use crate::error::AppError;

pub const MATCH_TOKEN_HEADER: &str = "x-match-token";

/// Registered user taken from a verified bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub is_admin: bool,
}

/// Whatever the caller presented. Both parts are optional; an empty
/// credential resolves to a spectator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credential {
    pub user: Option<AuthUser>,
    pub match_token: Option<String>,
}

impl Credential {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(id: i64) -> Self {
        Self {
            user: Some(AuthUser { id, is_admin: false }),
            match_token: None,
        }
    }

    pub fn admin(id: i64) -> Self {
        Self {
            user: Some(AuthUser { id, is_admin: true }),
            match_token: None,
        }
    }

    pub fn token(token: impl Into<String>) -> Self {
        Self {
            user: None,
            match_token: Some(token.into()),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_some_and(|u| u.is_admin)
    }
}

impl<S> FromRequestParts<S> for Credential
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let config = parts
            .extensions
            .get::<Config>()
            .ok_or(AppError::Internal("Missing config".into()))?
            .clone();

        // A bearer token that is present but invalid is rejected outright.
        let user = match parts.headers.get("authorization") {
            Some(value) => {
                let header = value.to_str().map_err(|_| AppError::Unauthorized)?;
                let token = header
                    .strip_prefix("Bearer ")
                    .or_else(|| header.strip_prefix("bearer "))
                    .ok_or(AppError::Unauthorized)?;
                let claims =
                    jwt::verify_token(token, &config.jwt_secret).ok_or(AppError::Unauthorized)?;
                Some(AuthUser {
                    id: claims.user_id,
                    is_admin: claims.is_admin,
                })
            }
            None => None,
        };

        let match_token = parts
            .headers
            .get(MATCH_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Ok(Credential { user, match_token })
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Credential::from_request_parts(parts, state)
            .await?
            .user
            .ok_or(AppError::Unauthorized)
    }
}
