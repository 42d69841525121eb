//! Catalog upsert and lookup statements.
//!
//! All functions take the caller's connection and run inside whatever
//! transaction the caller opened; none of them commit on their own.

use std::collections::HashMap;

use diesel::prelude::*;
use diesel::{ExpressionMethods, RunQueryDsl, SqliteConnection, insert_into};

use crate::models::catalog::{Association, NewBlock, NewStock};
use crate::schema::{blocks, stock_block_association as sba, stocks, working_set};

/// Upsert a block by code, updating its name.
pub fn upsert_block(
    conn: &mut SqliteConnection,
    code_: &str,
    name_: &str,
) -> QueryResult<usize> {
    let row = NewBlock {
        code: code_,
        name: name_,
    };
    insert_into(blocks::table)
        .values(&row)
        .on_conflict(blocks::code)
        .do_update()
        .set(blocks::name.eq(name_))
        .execute(conn)
}

/// Upsert a stock by code, refreshing region, name and `updated_at`.
pub fn upsert_stock(
    conn: &mut SqliteConnection,
    code_: &str,
    region_: i32,
    name_: Option<&str>,
    now: &str,
) -> QueryResult<usize> {
    let row = NewStock {
        code: code_,
        region: region_,
        name: name_,
        updated_at: now,
    };
    insert_into(stocks::table)
        .values(&row)
        .on_conflict(stocks::code)
        .do_update()
        .set((
            stocks::region.eq(region_),
            stocks::name.eq(name_),
            stocks::updated_at.eq(now),
        ))
        .execute(conn)
}

/// Insert a stock unless its code already exists. Returns 1 if a row was created.
pub fn insert_stock_if_absent(
    conn: &mut SqliteConnection,
    code_: &str,
    region_: i32,
    now: &str,
) -> QueryResult<usize> {
    let row = NewStock {
        code: code_,
        region: region_,
        name: None,
        updated_at: now,
    };
    insert_into(stocks::table)
        .values(&row)
        .on_conflict(stocks::code)
        .do_nothing()
        .execute(conn)
}

/// Link a stock to a block. Existing links are left alone; returns 1 if a row was created.
pub fn link(conn: &mut SqliteConnection, stock_id: i32, block_id: i32) -> QueryResult<usize> {
    insert_into(sba::table)
        .values(&Association { stock_id, block_id })
        .on_conflict((sba::stock_id, sba::block_id))
        .do_nothing()
        .execute(conn)
}

/// `code -> id` for every block.
pub fn block_ids(conn: &mut SqliteConnection) -> QueryResult<HashMap<String, i32>> {
    Ok(blocks::table
        .select((blocks::code, blocks::id))
        .load::<(String, i32)>(conn)?
        .into_iter()
        .collect())
}

/// `code -> id` for every stock.
pub fn stock_ids(conn: &mut SqliteConnection) -> QueryResult<HashMap<String, i32>> {
    Ok(stocks::table
        .select((stocks::code, stocks::id))
        .load::<(String, i32)>(conn)?
        .into_iter()
        .collect())
}

/// Look up one block by code: `(id, name)`.
pub fn find_block(
    conn: &mut SqliteConnection,
    code_: &str,
) -> QueryResult<Option<(i32, String)>> {
    blocks::table
        .filter(blocks::code.eq(code_))
        .select((blocks::id, blocks::name))
        .first(conn)
        .optional()
}

/// Number of stocks currently linked to a block.
pub fn block_stock_count(conn: &mut SqliteConnection, block_id: i32) -> QueryResult<i64> {
    sba::table
        .filter(sba::block_id.eq(block_id))
        .count()
        .get_result(conn)
}

/// Delete every association, stock, block and working-set row.
///
/// Delete order honors FKs: associations -> stocks -> blocks. The working set
/// has no FK to the catalog; it is cleared because its snapshots would be stale.
pub fn clear_catalog(conn: &mut SqliteConnection) -> QueryResult<()> {
    diesel::delete(sba::table).execute(conn)?;
    diesel::delete(stocks::table).execute(conn)?;
    diesel::delete(blocks::table).execute(conn)?;
    diesel::delete(working_set::table).execute(conn)?;
    Ok(())
}
