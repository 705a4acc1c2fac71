//! SQLite connection management for the gateway.
//!
//! Provides the [`Database`] struct that wraps a `rusqlite::Connection`
//! behind a mutex and runs schema migrations on open.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;

use super::migrations;

/// Shared database handle.
///
/// Every statement runs under the connection lock, so single-statement
/// updates (such as the availability bookkeeping) are atomic with respect
/// to each other. Never hold the guard across an `.await`.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens (or creates) a SQLite database at the given file path and runs migrations.
    ///
    /// # Errors
    /// Returns `rusqlite::Error` if the connection cannot be established or migrations fail.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, rusqlite::Error> {
        if let Some(parent) = path.as_ref().parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        migrations::run_all(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Opens an in-memory SQLite database and runs migrations.
    ///
    /// # Errors
    /// Returns `rusqlite::Error` if migrations fail.
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        migrations::run_all(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Locks and returns the underlying connection.
    ///
    /// A poisoned lock is recovered: SQLite keeps its own consistency.
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
