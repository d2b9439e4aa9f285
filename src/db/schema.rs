//! SQL DDL for the session store.

/// SQLite schema with:
/// - a single row pinned to `id = 1` (one signed-in session per process)
/// - `payload` holding the session as JSON text
/// - `updated_at` RFC3339
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS auth_session (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    payload TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;
