//! Read-only catalog queries: block listing, counts, membership dump.

use std::collections::{BTreeSet, HashMap};

use diesel::dsl::{count_distinct, count_star, max};
use diesel::prelude::*;
use serde::Serialize;

use crate::error::Result;
use crate::schema::{blocks, stock_block_association as sba, stocks};

/// A block with its current member count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockSummary {
    /// Block code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Stocks currently linked to the block.
    pub stock_count: i64,
}

/// All blocks ordered by code, with member counts.
pub fn list_blocks(conn: &mut SqliteConnection) -> Result<Vec<BlockSummary>> {
    let per_block: HashMap<i32, i64> = sba::table
        .group_by(sba::block_id)
        .select((sba::block_id, count_star()))
        .load::<(i32, i64)>(conn)?
        .into_iter()
        .collect();

    let rows: Vec<(i32, String, String)> = blocks::table
        .select((blocks::id, blocks::code, blocks::name))
        .order_by(blocks::code.asc())
        .load(conn)?;
    Ok(rows
        .into_iter()
        .map(|(id, code, name)| BlockSummary {
            code,
            name,
            stock_count: per_block.get(&id).copied().unwrap_or(0),
        })
        .collect())
}

/// Row counts describing the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogCounts {
    /// Block rows.
    pub blocks: i64,
    /// Stock rows.
    pub stocks: i64,
    /// Blocks with at least one member.
    pub blocks_with_members: i64,
    /// Association rows.
    pub associations: i64,
    /// Most recent `stocks.updated_at`.
    pub last_updated_at: Option<String>,
}

/// Count catalog rows.
pub fn counts(conn: &mut SqliteConnection) -> Result<CatalogCounts> {
    Ok(CatalogCounts {
        blocks: blocks::table.select(count_star()).get_result(conn)?,
        stocks: stocks::table.select(count_star()).get_result(conn)?,
        blocks_with_members: sba::table
            .select(count_distinct(sba::block_id))
            .get_result(conn)?,
        associations: sba::table.select(count_star()).get_result(conn)?,
        last_updated_at: stocks::table
            .select(max(stocks::updated_at))
            .get_result(conn)?,
    })
}

/// Every membership as `(block code, stock code)`, sorted.
pub fn memberships(conn: &mut SqliteConnection) -> Result<BTreeSet<(String, String)>> {
    let rows: Vec<(String, String)> = sba::table
        .inner_join(blocks::table)
        .inner_join(stocks::table)
        .select((blocks::code, stocks::code))
        .load(conn)?;
    Ok(rows.into_iter().collect())
}
