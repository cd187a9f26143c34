//! Post-transition events and the cleanup worker that consumes them.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::db::MatchStore;
use crate::matches::model::{Match, MatchStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchEvent {
    Finished {
        match_id: i64,
        status: MatchStatus,
        result: Option<String>,
        /// Anonymous live match whose record is not kept after the game.
        ephemeral: bool,
    },
}

impl MatchEvent {
    pub fn finished(m: &Match) -> Self {
        MatchEvent::Finished {
            match_id: m.id,
            status: m.status,
            result: m.result.clone(),
            ephemeral: m.is_ephemeral(),
        }
    }
}

/// Non-blocking sender side of the event channel.
#[derive(Clone)]
pub struct EventSender {
    tx: UnboundedSender<MatchEvent>,
}

impl EventSender {
    pub fn emit(&self, event: MatchEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::warn!("Match event dropped, no listener: {:?}", e.0);
        }
    }
}

pub fn channel() -> (EventSender, UnboundedReceiver<MatchEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, rx)
}

/// Handle one event. Failures are logged, never propagated.
pub async fn handle_event(store: &dyn MatchStore, event: MatchEvent) {
    match event {
        MatchEvent::Finished {
            match_id,
            ephemeral: true,
            ..
        } => match store.delete_match(match_id).await {
            Ok(true) => tracing::info!(match_id, "Removed finished anonymous match"),
            Ok(false) => tracing::debug!(match_id, "Finished match already gone"),
            Err(e) => tracing::warn!(match_id, "Failed to remove finished match: {e}"),
        },
        MatchEvent::Finished { .. } => {}
    }
}

pub fn spawn_cleanup_worker(
    store: Arc<dyn MatchStore>,
    mut rx: UnboundedReceiver<MatchEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            handle_event(store.as_ref(), event).await;
        }
        tracing::debug!("Match event channel closed, cleanup worker exiting");
    })
}
