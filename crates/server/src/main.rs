use std::sync::Arc;

use session_server::clients::engine::EngineClient;
use session_server::config::Config;
use session_server::db::{self, MatchStore, PuzzleStore};
use session_server::matches::{events, MatchController};
use session_server::puzzles::PuzzleController;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();

    let (match_store, puzzle_store): (Arc<dyn MatchStore>, Arc<dyn PuzzleStore>) =
        match &config.database_url {
            Some(url) => {
                tracing::info!("Connecting to database...");
                let pool = db::pool::create_pool(url)
                    .await
                    .expect("Failed to connect to database");

                tracing::info!("Running migrations...");
                db::pool::run_migrations(&pool)
                    .await
                    .expect("Failed to run migrations");

                let match_store: Arc<dyn MatchStore> =
                    Arc::new(db::matches::PgMatchStore::new(pool.clone()));
                let puzzle_store: Arc<dyn PuzzleStore> =
                    Arc::new(db::puzzles::PgPuzzleStore::new(pool));
                (match_store, puzzle_store)
            }
            None => {
                tracing::warn!("DATABASE_URL not set - matches and attempts are kept in memory");
                let store = Arc::new(db::memory::MemoryStore::new());
                let match_store: Arc<dyn MatchStore> = store.clone();
                let puzzle_store: Arc<dyn PuzzleStore> = store;
                (match_store, puzzle_store)
            }
        };

    let engine = EngineClient::new(&config.engine_url, config.engine_timeout())
        .expect("Failed to build engine client");
    tracing::info!(url = %config.engine_url, timeout_ms = config.engine_timeout_ms, "Engine client configured");

    // Cleanup of finished anonymous matches runs off the request path
    let (event_tx, event_rx) = events::channel();
    events::spawn_cleanup_worker(match_store.clone(), event_rx);

    let matches = MatchController::new(match_store, Arc::new(engine), event_tx);
    let puzzles = PuzzleController::new(puzzle_store);
    let app = session_server::app(matches, puzzles, config.clone());

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    axum::serve(listener, app).await.expect("Server error");
}
