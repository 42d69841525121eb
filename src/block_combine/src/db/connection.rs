//! SQLite connection helpers.
//!
//! Provides [`connect_sqlite`] that opens a connection and applies the PRAGMAs
//! every store operation relies on: WAL journaling (readers see a stable
//! snapshot while a reload commits), foreign_keys=ON (associations can never
//! dangle), and a 5000ms busy_timeout after which a competing writer surfaces
//! as [`Error::Busy`](crate::Error::Busy) instead of blocking forever.
//!
//! Example:
//! ```no_run
//! use block_combine::db::connection::connect_sqlite;
//!
//! let path = std::env::temp_dir().join("block_combine_example.db");
//! let _conn = connect_sqlite(path.to_str().unwrap()).expect("open sqlite");
//! ```

use diesel::connection::SimpleConnection;
use diesel::{Connection, SqliteConnection};

use crate::error::Result;

/// Busy timeout applied to every connection, in milliseconds.
pub const BUSY_TIMEOUT_MS: u32 = 5000;

/// Open a SQLite connection and apply connection-wide PRAGMAs.
pub fn connect_sqlite(database_url: &str) -> Result<SqliteConnection> {
    let mut conn = SqliteConnection::establish(super::sqlite_path(database_url))?;

    conn.batch_execute(&format!(
        "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout={BUSY_TIMEOUT_MS};"
    ))?;
    Ok(conn)
}
