use sqlx::postgres::{PgPool, PgPoolOptions};

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Run the session schema inline.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Live matches (tournament games, quick play, games against the engine)
CREATE TABLE IF NOT EXISTS matches (
    id                 BIGSERIAL PRIMARY KEY,
    title              TEXT,
    position           TEXT NOT NULL,
    move_log           TEXT NOT NULL DEFAULT '',
    status             TEXT NOT NULL DEFAULT 'ongoing',
    result             TEXT,
    side_to_move       TEXT NOT NULL DEFAULT 'white',
    draw_offer         TEXT,
    white              JSONB NOT NULL,
    black              JSONB NOT NULL,
    base_seconds       INTEGER NOT NULL DEFAULT 0,
    increment_seconds  INTEGER NOT NULL DEFAULT 0,
    white_remaining_ms BIGINT NOT NULL DEFAULT 0,
    black_remaining_ms BIGINT NOT NULL DEFAULT 0,
    version            BIGINT NOT NULL DEFAULT 0,
    created_at         TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    last_move_at       TIMESTAMPTZ,
    CHECK (draw_offer IS NULL OR status = 'ongoing')
);

CREATE INDEX IF NOT EXISTS idx_matches_status ON matches (status);

-- Puzzle catalogue (owned by the content side; created here for local setups)
CREATE TABLE IF NOT EXISTS puzzles (
    id         BIGSERIAL PRIMARY KEY,
    title      TEXT,
    fen        TEXT NOT NULL,
    solution   JSONB NOT NULL DEFAULT '[]'::jsonb,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- One attempt per (user, puzzle)
CREATE TABLE IF NOT EXISTS puzzle_attempts (
    id         BIGSERIAL PRIMARY KEY,
    user_id    BIGINT NOT NULL,
    puzzle_id  BIGINT NOT NULL REFERENCES puzzles(id) ON DELETE CASCADE,
    progress   INTEGER NOT NULL DEFAULT 0,
    status     TEXT NOT NULL DEFAULT 'attempting',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    solved_at  TIMESTAMPTZ,
    UNIQUE (user_id, puzzle_id)
);

CREATE INDEX IF NOT EXISTS idx_puzzle_attempts_user_id ON puzzle_attempts (user_id);
"#;
