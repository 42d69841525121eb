//! Working Set Manager: the user-curated block codes a computation runs over.
//!
//! Two mutation semantics are exposed on purpose and must not be merged:
//! - [`WorkingSetRepo::import`] replaces the whole set (delete-all, then insert).
//! - [`WorkingSetRepo::insert_item`] upserts one entry and leaves the rest alone.
//!
//! Entries reference blocks by code only and carry a `count` snapshot of the
//! block's members at write time. The snapshot is not refreshed by catalog
//! reloads.

mod parse;
mod repo;

pub use parse::{is_block_code, parse_codes, read_codes_file};
pub use repo::SqliteWorkingSetRepo;

use serde::Serialize;

use crate::error::Result;
use crate::models::WorkingSetEntry;

/// Outcome of a bulk import. Unmatched codes are reported, not fatal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Codes that resolved to catalog blocks, in input order.
    pub found_codes: Vec<String>,
    /// Codes with no matching block, in input order.
    pub not_found_codes: Vec<String>,
}

/// Portable surface, SQLite implementation lives in `repo.rs`.
pub trait WorkingSetRepo {
    /// Replace the entire working set with the catalog blocks matching `codes`.
    ///
    /// Tokens that are not all digits after trimming are ignored.
    fn import(
        &self,
        conn: &mut diesel::SqliteConnection,
        codes: &[String],
    ) -> Result<ImportReport>;

    /// Upsert one entry keyed by code, refreshing its name and count snapshot.
    fn insert_item(
        &self,
        conn: &mut diesel::SqliteConnection,
        code: &str,
    ) -> Result<WorkingSetEntry>;

    /// Remove one entry. Returns whether a row was deleted.
    fn remove_item(&self, conn: &mut diesel::SqliteConnection, code: &str) -> Result<bool>;

    /// Remove every entry. Returns the number of rows deleted.
    fn clear(&self, conn: &mut diesel::SqliteConnection) -> Result<usize>;

    /// Number of entries.
    fn count(&self, conn: &mut diesel::SqliteConnection) -> Result<i64>;

    /// All entries in insertion order.
    fn list(&self, conn: &mut diesel::SqliteConnection) -> Result<Vec<WorkingSetEntry>>;
}
