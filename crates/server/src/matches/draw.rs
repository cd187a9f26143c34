//! Draw offers. At most one offer is pending; an offer from the opponent of
//! the pending offeror is an acceptance.

use chess_rules::Side;
use serde::Serialize;

use crate::auth::gate::{require_side, resolve_role};
use crate::auth::middleware::Credential;
use crate::error::AppError;
use crate::matches::lifecycle::MatchController;
use crate::matches::model::{Match, MatchStatus, MatchView, DRAW_RESULT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawOutcome {
    Offered,
    Accepted,
}

pub fn offer(m: &mut Match, side: Side) -> Result<DrawOutcome, AppError> {
    match m.draw_offer {
        None => {
            m.draw_offer = Some(side);
            Ok(DrawOutcome::Offered)
        }
        Some(offeror) if offeror == side => Err(AppError::AlreadyOffered),
        Some(_) => {
            m.finish(MatchStatus::Draw, DRAW_RESULT);
            Ok(DrawOutcome::Accepted)
        }
    }
}

/// Only the recipient can decline; the offeror withdraws by moving.
pub fn decline(m: &mut Match, side: Side) -> Result<(), AppError> {
    match m.draw_offer {
        Some(offeror) if offeror == side.opponent() => {
            m.draw_offer = None;
            Ok(())
        }
        _ => Err(AppError::NoOfferToDecline),
    }
}

impl MatchController {
    pub async fn offer_draw(
        &self,
        id: i64,
        credential: &Credential,
    ) -> Result<(DrawOutcome, MatchView), AppError> {
        let mut m = self.load_ongoing(id).await?;
        let role = resolve_role(&m, credential);
        let side = require_side(role)?;

        let expected = m.version;
        let outcome = offer(&mut m, side)?;
        let m = self.commit(m, expected).await?;
        tracing::info!(match_id = id, side = side.as_str(), outcome = ?outcome, "Draw offer");
        Ok((outcome, MatchView::new(&m, role)))
    }

    pub async fn decline_draw(
        &self,
        id: i64,
        credential: &Credential,
    ) -> Result<MatchView, AppError> {
        let mut m = self.load_ongoing(id).await?;
        let role = resolve_role(&m, credential);
        let side = require_side(role)?;

        let expected = m.version;
        decline(&mut m, side)?;
        let m = self.commit(m, expected).await?;
        Ok(MatchView::new(&m, role))
    }
}
