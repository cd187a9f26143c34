//! AI move resolver backed by an HTTP move-suggestion service.
//!
//! One request per call, bounded by a timeout, never retried. Every failure
//! comes back as [`Suggestion::NoMoveAvailable`] instead of an error.

use std::time::Duration;

use async_trait::async_trait;
use chess_rules::MoveInput;
use reqwest::Client;
use serde_json::Value;

/// Search depth is capped by the service.
const MAX_ENGINE_DEPTH: u8 = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suggestion {
    /// Move in UCI notation, e.g. `e7e5`.
    Move(String),
    NoMoveAvailable(String),
}

#[async_trait]
pub trait MoveSuggester: Send + Sync {
    async fn suggest(&self, fen: &str, level: u8) -> Suggestion;
}

pub fn depth_for_level(level: u8) -> u8 {
    level.saturating_mul(2).clamp(1, MAX_ENGINE_DEPTH)
}

/// Pull a UCI move out of a service payload.
///
/// Accepts `{"success": true, "bestmove": "bestmove e2e4 ponder e7e5"}` and
/// the plain `{"bestmove": "e2e4"}` / `{"move": "e2e4"}` shapes.
pub fn parse_suggestion(body: &Value) -> Option<String> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        return None;
    }
    let raw = body
        .get("bestmove")
        .or_else(|| body.get("move"))
        .and_then(Value::as_str)?;

    let mut tokens = raw.split_whitespace();
    let first = tokens.next()?;
    let candidate = if first == "bestmove" { tokens.next()? } else { first };

    MoveInput::from_uci(candidate).ok()?;
    Some(candidate.to_string())
}

pub struct EngineClient {
    client: Client,
    url: String,
    timeout: Duration,
}

impl EngineClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent("ChessSessionEngine/1.0")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            timeout,
        })
    }

    async fn request(&self, fen: &str, depth: u8) -> Result<Value, String> {
        let resp = self
            .client
            .get(&self.url)
            .query(&[("fen", fen.to_string()), ("depth", depth.to_string())])
            .send()
            .await
            .map_err(|e| format!("Request error: {e}"))?;

        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| format!("Body parse error: {e}"))
    }
}

#[async_trait]
impl MoveSuggester for EngineClient {
    async fn suggest(&self, fen: &str, level: u8) -> Suggestion {
        let depth = depth_for_level(level);
        tracing::debug!(level, depth, fen = %fen, "requesting engine move");

        // Dropping the request future on timeout cancels it.
        let body = match tokio::time::timeout(self.timeout, self.request(fen, depth)).await {
            Ok(Ok(body)) => body,
            Ok(Err(reason)) => return Suggestion::NoMoveAvailable(reason),
            Err(_) => {
                return Suggestion::NoMoveAvailable(format!(
                    "Engine timed out after {} ms",
                    self.timeout.as_millis()
                ))
            }
        };

        match parse_suggestion(&body) {
            Some(uci) => {
                tracing::debug!(level, uci = %uci, "engine answered");
                Suggestion::Move(uci)
            }
            None => Suggestion::NoMoveAvailable("Unparsable engine response".into()),
        }
    }
}
