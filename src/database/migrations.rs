//! Schema migrations for the gateway SQLite database.
//!
//! Uses a `schema_version` table to track which migrations have been applied.
//! Each migration runs exactly once and is recorded with a timestamp.

use rusqlite::Connection;

/// Current schema version. Bump this when adding a new migration.
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Returns the current schema version from the database (0 if none applied).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .unwrap_or(0)
}

/// Runs all pending schema migrations against the provided connection.
///
/// # Errors
/// Returns `rusqlite::Error` if any SQL statement fails.
pub fn run_all(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         CREATE TABLE IF NOT EXISTS schema_version (
             version INTEGER PRIMARY KEY,
             applied_at INTEGER NOT NULL,
             description TEXT NOT NULL
         );",
    )?;

    let current = get_schema_version(conn);

    if current < 1 {
        migration_v1(conn)?;
        record_version(conn, 1, "AI configurations")?;
    }

    if current < 2 {
        migration_v2(conn)?;
        record_version(conn, 2, "User secret profiles")?;
    }

    Ok(())
}

fn record_version(conn: &Connection, version: i32, description: &str) -> Result<(), rusqlite::Error> {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
        rusqlite::params![version, now, description],
    )?;
    Ok(())
}

/// V1: per-user AI configurations.
fn migration_v1(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS ai_configurations (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            endpoint_url TEXT NOT NULL,
            secret TEXT NOT NULL DEFAULT '',
            secret_placement TEXT NOT NULL DEFAULT 'header',
            custom_header_name TEXT,
            secret_body_path TEXT,
            model_name TEXT NOT NULL,
            request_template TEXT NOT NULL,
            response_template_example TEXT,
            message_list_path TEXT,
            role_field_path TEXT NOT NULL,
            text_field_path TEXT NOT NULL,
            response_text_path TEXT NOT NULL,
            response_thinking_path TEXT,
            user_role_value TEXT NOT NULL,
            assistant_role_value TEXT NOT NULL,
            system_role_value TEXT NOT NULL,
            extra_headers TEXT NOT NULL DEFAULT '{}',
            is_available INTEGER NOT NULL DEFAULT 0,
            is_system_default INTEGER NOT NULL DEFAULT 0,
            last_used_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_ai_configurations_owner
            ON ai_configurations(owner_id, is_available, last_used_at);
        ",
    )
}

/// V2: per-user credential preferences.
fn migration_v2(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS user_secret_profiles (
            owner_id TEXT PRIMARY KEY,
            use_custom_secret INTEGER NOT NULL DEFAULT 0,
            custom_secret TEXT,
            updated_at INTEGER NOT NULL
        );
        ",
    )
}
