//! Gateway database layer.
//!
//! Provides SQLite connection management and schema migrations.
//!
//! # Usage
//!
//! ```no_run
//! use vocab_gateway::database::Database;
//!
//! let db = Database::open("vocab-gateway.db").expect("failed to open database");
//! let db = Database::open_in_memory().expect("failed to open in-memory database");
//! let conn = db.connection();
//! ```

pub mod connection;
pub mod migrations;

pub use connection::Database;
