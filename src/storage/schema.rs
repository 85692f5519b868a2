//! Database schema definitions
//!
//! This module contains the SQL schema for the sitemap cache database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- The cached payload; at most one row
CREATE TABLE IF NOT EXISTS sitemap_cache (
    slot INTEGER PRIMARY KEY CHECK (slot = 1),
    payload TEXT NOT NULL,
    fingerprint TEXT NOT NULL,
    stored_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

-- Small key/value facts kept alongside the cache
CREATE TABLE IF NOT EXISTS relay_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Meta key holding the last accepted manual update time
pub const LAST_MANUAL_UPDATE_KEY: &str = "last_manual_update";

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
