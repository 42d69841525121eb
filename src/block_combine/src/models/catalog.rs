//! Catalog models: blocks, stocks, and the membership relation between them.
//!
//! These types mirror the catalog tables defined in the embedded migrations:
//! - [`crate::schema::blocks`]: thematic groupings keyed by a vendor code
//! - [`crate::schema::stocks`]: tradable securities keyed by code, with a region marker
//! - [`crate::schema::stock_block_association`]: composite `(stock_id, block_id)` relation
//!
//! Notes
//! - There are no back-references between [`Block`] and [`Stock`]. Membership is
//!   only ever expressed as [`Association`] rows; lookups such as
//!   `block_id -> stock ids` are derived on demand (see [`crate::catalog::index`]).
//! - Association rows are written only after both ids have been resolved, and
//!   `foreign_keys=ON` rejects anything that would dangle.

use diesel::prelude::*;

use crate::schema::{blocks, stock_block_association, stocks};

// ----------------------- blocks -------------------------

/// A block row in [`crate::schema::blocks`].
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Identifiable, Selectable)]
#[diesel(table_name = blocks, check_for_backend(diesel::sqlite::Sqlite))]
pub struct Block {
    /// Database primary key.
    pub id: i32,
    /// Vendor-assigned block code (unique), e.g. "880761".
    pub code: String,
    /// Display name.
    pub name: String,
}

/// Insertable/changeset form of [`Block`].
#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = blocks)]
pub struct NewBlock<'a> {
    /// Block code.
    pub code: &'a str,
    /// Display name.
    pub name: &'a str,
}

// ----------------------- stocks -------------------------

/// A stock row in [`crate::schema::stocks`].
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Identifiable, Selectable)]
#[diesel(table_name = stocks, check_for_backend(diesel::sqlite::Sqlite))]
pub struct Stock {
    /// Database primary key.
    pub id: i32,
    /// Security code (unique), e.g. "600519".
    pub code: String,
    /// Exchange/market marker prepended to the code in exported artifacts.
    pub region: i32,
    /// Optional display name.
    pub name: Option<String>,
    /// RFC3339 UTC timestamp, refreshed on every insert/update.
    pub updated_at: String,
}

impl Stock {
    /// External code: region marker followed by the stock code (e.g. "1600519").
    pub fn external_code(&self) -> String {
        external_code(self.region, &self.code)
    }
}

/// Format the region-prefixed external code used in results and artifacts.
pub fn external_code(region: i32, code: &str) -> String {
    format!("{region}{code}")
}

/// Insertable/changeset form of [`Stock`].
#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = stocks)]
pub struct NewStock<'a> {
    /// Security code.
    pub code: &'a str,
    /// Region marker.
    pub region: i32,
    /// Optional display name.
    pub name: Option<&'a str>,
    /// RFC3339 UTC timestamp.
    pub updated_at: &'a str,
}

// --------------- stock_block_association ----------------
// Composite PK => must declare both columns.

/// Membership of one stock in one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Queryable, Identifiable, Selectable, Insertable)]
#[diesel(table_name = stock_block_association, check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(primary_key(stock_id, block_id))]
pub struct Association {
    /// Foreign key to [`Stock::id`].
    pub stock_id: i32,
    /// Foreign key to [`Block::id`].
    pub block_id: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_code_prefixes_region() {
        let s = Stock {
            id: 1,
            code: "600519".into(),
            region: 1,
            name: None,
            updated_at: "2025-01-01T00:00:00.000Z".into(),
        };
        assert_eq!(s.external_code(), "1600519");
        assert_eq!(external_code(0, "000001"), "0000001");
    }
}
