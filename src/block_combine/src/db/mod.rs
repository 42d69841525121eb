//! Database utilities for connections and schema migrations.
//!
//! This module provides:
//! - SQLite connection helpers: [`connection::connect_sqlite`] applies WAL, foreign_keys=ON, and a 5000ms busy_timeout.
//! - Embedded Diesel migrations: [`migrate::run_sqlite`] and [`migrate::run_all`], which accept
//!   bare file paths as well as `sqlite://` URLs.
//! - [`now_rfc3339`], the timestamp format written to `stocks.updated_at` and `engine_kv`.
//!
//! Example:
//! ```no_run
//! use block_combine::db::{connection, migrate};
//!
//! let db_path = std::env::temp_dir().join("block_combine_example.db");
//! migrate::run_all(db_path.to_str().unwrap()).expect("migrations");
//! let _conn = connection::connect_sqlite(db_path.to_str().unwrap()).expect("connect");
//! ```

pub mod connection;
pub mod migrate;

use chrono::{SecondsFormat, Utc};

/// Current UTC time as RFC3339 with millisecond precision (e.g. `2025-06-01T08:30:00.123Z`).
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Strip an optional `sqlite://` / `sqlite:` scheme so Diesel receives a plain path.
pub(crate) fn sqlite_path(database_url: &str) -> &str {
    database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url)
}
