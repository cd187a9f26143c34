//! Authorization gate: maps a presented credential to a role in one match.
//!
//! Resolution is recomputed on every request from the stored identities.

use chess_rules::Side;
use serde::Serialize;

use crate::auth::middleware::Credential;
use crate::error::AppError;
use crate::matches::model::{Match, SideIdentity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    White,
    Black,
    Spectator,
    Admin,
}

impl Role {
    pub fn side(self) -> Option<Side> {
        match self {
            Role::White => Some(Side::White),
            Role::Black => Some(Side::Black),
            _ => None,
        }
    }
}

impl From<Side> for Role {
    fn from(side: Side) -> Self {
        match side {
            Side::White => Role::White,
            Side::Black => Role::Black,
        }
    }
}

/// Whether `credential` proves control of a side held by `identity`.
/// Bot identities never accept a human credential.
fn accepts(identity: &SideIdentity, credential: &Credential) -> bool {
    match identity {
        SideIdentity::User { user_id } => credential.user.is_some_and(|u| u.id == *user_id),
        SideIdentity::Guest { token } => credential
            .match_token
            .as_deref()
            .is_some_and(|presented| !token.is_empty() && presented == token),
        SideIdentity::Bot { .. } => false,
    }
}

pub fn resolve_role(m: &Match, credential: &Credential) -> Role {
    let white = accepts(&m.white, credential);
    let black = accepts(&m.black, credential);
    match (white, black) {
        // Same account on both sides plays whichever side is to move.
        (true, true) => m.side_to_move.into(),
        (true, false) => Role::White,
        (false, true) => Role::Black,
        (false, false) if credential.is_admin() => Role::Admin,
        (false, false) => Role::Spectator,
    }
}

/// Require a playing side; anything else is `Unauthorized`.
pub fn require_side(role: Role) -> Result<Side, AppError> {
    role.side().ok_or(AppError::Unauthorized)
}

/// Require the admin override.
pub fn require_admin(credential: &Credential) -> Result<(), AppError> {
    match credential.user {
        Some(user) if user.is_admin => Ok(()),
        Some(_) => Err(AppError::Forbidden("Admin only".into())),
        None => Err(AppError::Unauthorized),
    }
}
