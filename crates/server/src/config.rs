use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    /// Postgres URL. Without it the server keeps matches in memory.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    /// Move-suggestion service queried for bot-controlled sides.
    pub engine_url: String,
    pub engine_timeout_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            jwt_secret: env::var("JWT_SECRET_KEY")
                .unwrap_or_else(|_| "dev-secret-key-change-in-production".to_string()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            engine_url: env::var("ENGINE_URL")
                .unwrap_or_else(|_| "https://stockfish.online/api/s/v2.php".to_string()),
            engine_timeout_ms: env::var("ENGINE_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
        }
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_millis(self.engine_timeout_ms)
    }
}
