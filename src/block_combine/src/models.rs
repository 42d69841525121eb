//! Diesel models mapping to the database schema.
//!
//! Catalog entities live in [`catalog`]. This module holds the rows owned by
//! the working-set and result stores:
//! - [`crate::schema::working_set`]: the user-curated block codes, each with a stock-count snapshot
//! - [`crate::schema::calc_result`]: ranked results of the latest computation
//! - [`crate::schema::engine_kv`]: small key/value bookkeeping (last computation)
//!
//! Working-set and result rows carry block codes as plain strings, never foreign
//! keys, so a catalog reload cannot cascade into them.

pub mod catalog;

use diesel::prelude::*;
use serde::Serialize;

use crate::schema::*;

/// A row in [`crate::schema::working_set`].
///
/// `count` is a snapshot taken when the entry was written; reloading the
/// catalog without refreshing the working set leaves it stale.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Identifiable, Selectable, Serialize)]
#[diesel(table_name = working_set, check_for_backend(diesel::sqlite::Sqlite))]
pub struct WorkingSetEntry {
    /// Database primary key; also the insertion order used for enumeration.
    pub id: i32,
    /// Block code.
    pub code: String,
    /// Block name at snapshot time.
    pub name: String,
    /// Number of stocks linked to the block at snapshot time.
    #[diesel(column_name = stock_count)]
    pub count: i32,
}

/// Insertable/changeset form of [`WorkingSetEntry`].
#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = working_set)]
pub struct NewWorkingSetEntry<'a> {
    /// Block code.
    pub code: &'a str,
    /// Block name.
    pub name: &'a str,
    /// Stock-count snapshot.
    #[diesel(column_name = stock_count)]
    pub count: i32,
}

/// A row in [`crate::schema::calc_result`]; `blocks`/`stocks` hold JSON arrays.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = calc_result, check_for_backend(diesel::sqlite::Sqlite))]
pub struct CalcResultRow {
    /// Database primary key.
    pub id: i32,
    /// 1-based rank.
    pub rank: i32,
    /// JSON array of exactly three block codes.
    pub blocks: String,
    /// JSON array of sorted external stock codes.
    pub stocks: String,
    /// Size of the common-stock intersection.
    #[diesel(column_name = stock_count)]
    pub count: i32,
}

/// Insertable form of [`CalcResultRow`].
#[derive(Debug, Insertable)]
#[diesel(table_name = calc_result)]
pub struct NewCalcResult {
    /// 1-based rank.
    pub rank: i32,
    /// JSON array of block codes.
    pub blocks: String,
    /// JSON array of external stock codes.
    pub stocks: String,
    /// Intersection size.
    #[diesel(column_name = stock_count)]
    pub count: i32,
}

/// A row in [`crate::schema::engine_kv`].
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = engine_kv, check_for_backend(diesel::sqlite::Sqlite))]
pub struct EngineKv {
    /// Key.
    pub k: String,
    /// Value.
    pub v: String,
}
