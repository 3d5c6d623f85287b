//! Database schema definitions

/// SQL to create all tables
/// NOTE: dates/timestamps stored as TEXT (ISO 8601) to keep rows portable
pub const CREATE_TABLES: &str = r#"
-- Cached chess game history, one row per played game.
-- (player_name, game_url) is the natural key: re-ingestion upserts, never duplicates.
CREATE TABLE IF NOT EXISTS player_game_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    player_name TEXT NOT NULL,
    game_url TEXT NOT NULL,
    game_date TEXT,
    game_time_control TEXT,
    game_time_class TEXT,
    game_variant TEXT,
    white_rating INTEGER,
    black_rating INTEGER,
    last_updated TEXT NOT NULL,
    UNIQUE(player_name, game_url),
    CHECK(player_name <> '' AND game_url <> '')
);

-- ========== INDEXES ==========

CREATE INDEX IF NOT EXISTS idx_player_game_player ON player_game_data(player_name);
CREATE INDEX IF NOT EXISTS idx_player_game_date ON player_game_data(player_name, game_date)
"#;

/// ALTER TABLE migrations (tolerate "duplicate column name" on re-run).
/// Result/username/accuracy/opening columns postdate the original ingest schema.
pub const MIGRATIONS: &[&str] = &[
    "ALTER TABLE player_game_data ADD COLUMN opening TEXT",
    "ALTER TABLE player_game_data ADD COLUMN white_result TEXT",
    "ALTER TABLE player_game_data ADD COLUMN white_username TEXT",
    "ALTER TABLE player_game_data ADD COLUMN white_accuracy REAL NOT NULL DEFAULT 0",
    "ALTER TABLE player_game_data ADD COLUMN black_result TEXT",
    "ALTER TABLE player_game_data ADD COLUMN black_username TEXT",
    "ALTER TABLE player_game_data ADD COLUMN black_accuracy REAL NOT NULL DEFAULT 0",
];
