//! Atomic catalog reload.
//!
//! ## What this does
//! - Normalizes a [`CatalogInput`] (trim, dedupe, merge; see [`crate::catalog::input`]).
//! - Optionally clears associations, stocks, blocks and the working set.
//! - UPSERTs blocks, then stocks, then resolves each stock's declared block codes
//!   to ids and writes the association rows.
//! - Merges the `extra` supplementary blocks: missing stocks are created,
//!   memberships are added to the existing block, never replaced.
//!
//! ## Transactions & consistency
//! Everything runs inside a single **`BEGIN IMMEDIATE`** transaction via
//! `SqliteConnection::immediate_transaction`. Any failure rolls the catalog back
//! to its prior state; readers on other connections keep seeing the old
//! snapshot until commit (WAL).
//!
//! ## Integrity
//! Associations are only written after both ids are resolved. Block codes that
//! do not resolve are skipped and reported as [`IntegrityWarning`]s.

use std::collections::HashMap;

use diesel::SqliteConnection;
use diesel::prelude::*;
use serde::Serialize;

use crate::catalog::input::{CatalogInput, ExtraBlock, ExtraStock, normalize_input};
use crate::catalog::repo::{
    block_ids, clear_catalog, find_block, insert_stock_if_absent, link, stock_ids, upsert_block,
    upsert_stock,
};
use crate::db::now_rfc3339;
use crate::error::{Error, IntegrityWarning, IntegrityWarningKind, Result};
use crate::schema::stocks;

/// Options for a catalog reload.
#[derive(Debug, Clone, Copy)]
pub struct ReloadOptions {
    /// If true, delete all catalog and working-set rows before inserting.
    pub clear: bool,
}

impl Default for ReloadOptions {
    fn default() -> Self {
        Self { clear: true }
    }
}

/// What a reload wrote.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadReport {
    /// Whether the catalog was cleared first.
    pub cleared: bool,
    /// Block rows inserted or updated.
    pub blocks_written: usize,
    /// Stock rows inserted or updated from the main stock list.
    pub stocks_written: usize,
    /// Association rows created from declared memberships.
    pub associations_created: usize,
    /// Stocks created while merging `extra`.
    pub extra_stocks_created: usize,
    /// Association rows created while merging `extra`.
    pub extra_associations_created: usize,
    /// Non-fatal reference mismatches.
    pub warnings: Vec<IntegrityWarning>,
}

/// Outcome of merging supplementary memberships into existing blocks.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Stocks that did not exist and were created.
    pub stocks_created: usize,
    /// Membership rows that did not exist and were created.
    pub associations_created: usize,
    /// Entries skipped because their block code is unknown.
    pub warnings: Vec<IntegrityWarning>,
}

/// Replace (or merge into) the catalog in one immediate transaction.
pub fn reload_catalog(
    conn: &mut SqliteConnection,
    mut input: CatalogInput,
    opt: ReloadOptions,
) -> Result<ReloadReport> {
    let normalization = normalize_input(&mut input)?;
    tracing::debug!(?normalization, "catalog input normalized");

    let report = conn.immediate_transaction::<_, Error, _>(|conn| {
        let mut report = ReloadReport {
            cleared: opt.clear,
            ..Default::default()
        };

        if opt.clear {
            clear_catalog(conn)?;
        }

        for b in &input.blocks {
            report.blocks_written += upsert_block(conn, &b.code, &b.name)?;
        }

        let now = now_rfc3339();
        for s in &input.stocks {
            report.stocks_written += upsert_stock(conn, &s.code, s.region, s.name.as_deref(), &now)?;
        }

        // Resolve ids once, then write memberships.
        let block_id_of = block_ids(conn)?;
        let stock_id_of = stock_ids(conn)?;
        for s in &input.stocks {
            let stock_id = *stock_id_of
                .get(&s.code)
                .ok_or(Error::Storage(diesel::result::Error::NotFound))?;
            for b in &s.blocks {
                match block_id_of.get(b) {
                    Some(&block_id) => report.associations_created += link(conn, stock_id, block_id)?,
                    None => report.warnings.push(IntegrityWarning::new(
                        IntegrityWarningKind::UnknownStockBlock,
                        &s.code,
                        b,
                    )),
                }
            }
        }

        let merged = merge_extra(conn, &input.extra, &block_id_of, &now)?;
        report.extra_stocks_created = merged.stocks_created;
        report.extra_associations_created = merged.associations_created;
        report.warnings.extend(merged.warnings);

        Ok(report)
    })?;

    tracing::info!(
        cleared = report.cleared,
        blocks = report.blocks_written,
        stocks = report.stocks_written,
        associations = report.associations_created + report.extra_associations_created,
        warnings = report.warnings.len(),
        "catalog reloaded"
    );
    Ok(report)
}

/// Extend memberships of existing blocks. Runs inside the caller's transaction.
///
/// Stocks not yet in the catalog are created (existing ones are left untouched);
/// membership rows are added, never removed.
pub(crate) fn merge_extra(
    conn: &mut SqliteConnection,
    extra: &[ExtraBlock],
    block_id_of: &HashMap<String, i32>,
    now: &str,
) -> Result<MergeReport> {
    let mut report = MergeReport::default();

    for entry in extra {
        let Some(&block_id) = block_id_of.get(&entry.code) else {
            report.warnings.push(IntegrityWarning::new(
                IntegrityWarningKind::UnknownExtraBlock,
                &entry.code,
                format!("{} ({} stocks skipped)", entry.name, entry.stocks.len()),
            ));
            continue;
        };
        merge_members(conn, block_id, &entry.stocks, now, &mut report)?;
    }

    Ok(report)
}

fn merge_members(
    conn: &mut SqliteConnection,
    block_id: i32,
    members: &[ExtraStock],
    now: &str,
    report: &mut MergeReport,
) -> Result<()> {
    for s in members {
        report.stocks_created += insert_stock_if_absent(conn, &s.code, s.region, now)?;
        let stock_id: i32 = stocks::table
            .filter(stocks::code.eq(&s.code))
            .select(stocks::id)
            .first(conn)?;
        report.associations_created += link(conn, stock_id, block_id)?;
    }
    Ok(())
}

/// Add stocks to one existing block's membership in one immediate transaction.
///
/// Errors with [`Error::Validation`] if the block code is unknown or a stock
/// code is empty.
pub fn extend_block(
    conn: &mut SqliteConnection,
    block_code: &str,
    members: &[ExtraStock],
) -> Result<MergeReport> {
    let block_code = block_code.trim();
    if members.iter().any(|s| s.code.trim().is_empty()) {
        return Err(Error::Validation("stock code cannot be empty".into()));
    }

    let report = conn.immediate_transaction::<_, Error, _>(|conn| {
        let (block_id, _name) = find_block(conn, block_code)?
            .ok_or_else(|| Error::Validation(format!("block {block_code} does not exist")))?;
        let mut report = MergeReport::default();
        merge_members(conn, block_id, members, &now_rfc3339(), &mut report)?;
        Ok(report)
    })?;

    tracing::info!(
        block = block_code,
        stocks_created = report.stocks_created,
        associations_created = report.associations_created,
        "block membership extended"
    );
    Ok(report)
}
