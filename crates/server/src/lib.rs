pub mod auth;
pub mod clients;
pub mod config;
pub mod db;
pub mod error;
pub mod matches;
pub mod puzzles;
pub mod routes;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::matches::MatchController;
use crate::puzzles::PuzzleController;

/// Build the HTTP router over the given controllers.
pub fn app(matches: MatchController, puzzles: PuzzleController, config: Config) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(routes::health::health_check))
        // Matches
        .route(
            "/api/matches",
            get(routes::matches::list_matches).post(routes::matches::create_match),
        )
        .route("/api/matches/{id}", get(routes::matches::get_match))
        .route("/api/matches/{id}/move", post(routes::matches::make_move))
        .route("/api/matches/{id}/resign", post(routes::matches::resign))
        .route("/api/matches/{id}/draw/offer", post(routes::matches::offer_draw))
        .route("/api/matches/{id}/draw/decline", post(routes::matches::decline_draw))
        .route("/api/matches/{id}/bot-move", post(routes::matches::bot_move))
        .route("/api/matches/{id}/claim-timeout", post(routes::matches::claim_timeout))
        .route("/api/matches/{id}/legal-targets", get(routes::matches::legal_targets))
        // Admin
        .route("/api/admin/matches/{id}/close", post(routes::matches::force_close))
        // Puzzles
        .route(
            "/api/puzzles/attempts/{attempt_id}/move",
            post(routes::puzzles::submit_move),
        )
        .route(
            "/api/puzzles/{puzzle_id}/attempts",
            post(routes::puzzles::start_attempt),
        )
        // Shared state
        .layer(Extension(matches))
        .layer(Extension(puzzles))
        .layer(Extension(config))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
