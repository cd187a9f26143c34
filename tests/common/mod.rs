#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{extract::Query, routing::get, Extension, Json, Router};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use session_server::auth::jwt;
use session_server::clients::engine::EngineClient;
use session_server::config::Config;
use session_server::db::memory::MemoryStore;
use session_server::matches::{events, MatchController};
use session_server::puzzles::model::Puzzle;
use session_server::puzzles::PuzzleController;

pub const JWT_SECRET: &str = "integration-test-secret";

/// A running server plus the handles tests need to drive it.
pub struct TestApp {
    pub base_url: String,
    pub client: Client,
    pub store: Arc<MemoryStore>,
    /// Moves the stub engine will answer with, in order.
    pub engine_script: Arc<Mutex<Vec<String>>>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn bearer(&self, user_id: i64, is_admin: bool) -> String {
        jwt::create_token(user_id, is_admin, JWT_SECRET, 1).expect("Failed to sign test token")
    }

    pub fn script_engine(&self, moves: &[&str]) {
        let mut script = self.engine_script.lock().unwrap();
        script.clear();
        script.extend(moves.iter().rev().map(|m| m.to_string()));
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> reqwest::Response {
        let mut req = self.client.post(self.url(path)).json(&body);
        if let Some(token) = token {
            req = req.header("X-Match-Token", token);
        }
        req.send().await.expect("Failed to send request")
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.header("X-Match-Token", token);
        }
        req.send().await.expect("Failed to send request")
    }
}

#[derive(Deserialize)]
struct EngineQuery {
    fen: String,
    depth: u8,
}

/// Stand-in for the move-suggestion service. An empty script answers with a
/// failure payload.
async fn stub_engine(
    Extension(script): Extension<Arc<Mutex<Vec<String>>>>,
    Query(q): Query<EngineQuery>,
) -> Json<Value> {
    assert!(!q.fen.is_empty() && q.depth > 0);
    match script.lock().unwrap().pop() {
        Some(mv) => Json(json!({
            "success": true,
            "bestmove": format!("bestmove {mv} ponder (none)"),
        })),
        None => Json(json!({ "success": false, "data": "no move" })),
    }
}

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Serve the full router in-process on an ephemeral port, backed by the
/// in-memory store and a stub engine.
pub async fn spawn_app(puzzles: Vec<Puzzle>) -> TestApp {
    let engine_script = Arc::new(Mutex::new(Vec::new()));
    let engine_url = serve(
        Router::new()
            .route("/engine", get(stub_engine))
            .layer(Extension(engine_script.clone())),
    )
    .await;

    let config = Config {
        database_url: None,
        jwt_secret: JWT_SECRET.to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        engine_url: format!("{engine_url}/engine"),
        engine_timeout_ms: 2000,
    };

    let store = Arc::new(MemoryStore::with_puzzles(puzzles));
    let engine = EngineClient::new(&config.engine_url, config.engine_timeout()).unwrap();
    let (event_tx, event_rx) = events::channel();
    events::spawn_cleanup_worker(store.clone(), event_rx);

    let matches = MatchController::new(store.clone(), Arc::new(engine), event_tx);
    let puzzles = PuzzleController::new(store.clone());
    let base_url = serve(session_server::app(matches, puzzles, config)).await;

    TestApp {
        base_url,
        client: Client::new(),
        store,
        engine_script,
    }
}

/// Poll until `check` holds; the cleanup worker runs asynchronously.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..50 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
