use std::collections::HashMap;

use diesel::prelude::*;
use indexmap::IndexSet;

use crate::catalog::repo::{block_stock_count, find_block};
use crate::error::{Error, Result};
use crate::models::{NewWorkingSetEntry, WorkingSetEntry};
use crate::schema::{blocks, working_set};
use crate::working_set::{ImportReport, WorkingSetRepo, is_block_code};

// Keeps IN (...) lists under SQLite's bound-parameter limit.
const LOOKUP_CHUNK: usize = 500;

/// Repository for the working set in a SQLite database.
#[derive(Debug, Clone, Copy)]
pub struct SqliteWorkingSetRepo {
    max_entries: usize,
}

impl SqliteWorkingSetRepo {
    /// Create a repository that refuses to hold more than `max_entries` codes.
    pub fn new(max_entries: usize) -> Self {
        Self { max_entries }
    }
}

fn snapshot_count(conn: &mut SqliteConnection, block_id: i32) -> Result<i32> {
    let n = block_stock_count(conn, block_id)?;
    i32::try_from(n).map_err(|_| Error::Validation(format!("block {block_id} has {n} members")))
}

impl WorkingSetRepo for SqliteWorkingSetRepo {
    fn import(&self, conn: &mut SqliteConnection, codes: &[String]) -> Result<ImportReport> {
        let wanted: IndexSet<&str> = codes
            .iter()
            .map(|c| c.trim())
            .filter(|c| is_block_code(c))
            .collect();
        if wanted.is_empty() {
            return Err(Error::Validation("no block codes to import".into()));
        }

        let report = conn.immediate_transaction::<_, Error, _>(|conn| {
            let wanted_list: Vec<&str> = wanted.iter().copied().collect();
            let mut known: HashMap<String, (i32, String)> = HashMap::new();
            for chunk in wanted_list.chunks(LOOKUP_CHUNK) {
                let rows: Vec<(i32, String, String)> = blocks::table
                    .filter(blocks::code.eq_any(chunk))
                    .select((blocks::id, blocks::code, blocks::name))
                    .load(conn)?;
                known.extend(rows.into_iter().map(|(id, code, name)| (code, (id, name))));
            }

            let mut report = ImportReport::default();
            for code in &wanted {
                if known.contains_key(*code) {
                    report.found_codes.push(code.to_string());
                } else {
                    report.not_found_codes.push(code.to_string());
                }
            }

            if report.found_codes.is_empty() {
                return Err(Error::Validation(format!(
                    "none of the {} code(s) match a catalog block",
                    wanted.len()
                )));
            }
            if report.found_codes.len() > self.max_entries {
                return Err(Error::Validation(format!(
                    "{} matching codes exceed the working-set ceiling of {}",
                    report.found_codes.len(),
                    self.max_entries
                )));
            }

            diesel::delete(working_set::table).execute(conn)?;
            for code in &report.found_codes {
                let (block_id, name) = &known[code];
                let count = snapshot_count(conn, *block_id)?;
                diesel::insert_into(working_set::table)
                    .values(&NewWorkingSetEntry { code, name, count })
                    .execute(conn)?;
            }
            Ok(report)
        })?;

        tracing::info!(
            found = report.found_codes.len(),
            not_found = report.not_found_codes.len(),
            "working set imported"
        );
        if !report.not_found_codes.is_empty() {
            tracing::warn!(codes = ?report.not_found_codes, "working-set codes not in catalog");
        }
        Ok(report)
    }

    fn insert_item(&self, conn: &mut SqliteConnection, code: &str) -> Result<WorkingSetEntry> {
        let code = code.trim();
        if code.is_empty() {
            return Err(Error::Validation("block code cannot be empty".into()));
        }

        let entry = conn.immediate_transaction::<_, Error, _>(|conn| {
            let (block_id, name) = find_block(conn, code)?
                .ok_or_else(|| Error::Validation(format!("block {code} does not exist")))?;

            let present: i64 = working_set::table
                .filter(working_set::code.eq(code))
                .count()
                .get_result(conn)?;
            let total: i64 = working_set::table.count().get_result(conn)?;
            if present == 0 && total as usize >= self.max_entries {
                return Err(Error::Validation(format!(
                    "working set already holds the maximum of {} codes",
                    self.max_entries
                )));
            }

            let count = snapshot_count(conn, block_id)?;
            let row = NewWorkingSetEntry {
                code,
                name: &name,
                count,
            };
            diesel::insert_into(working_set::table)
                .values(&row)
                .on_conflict(working_set::code)
                .do_update()
                .set((
                    working_set::name.eq(&name),
                    working_set::stock_count.eq(count),
                ))
                .execute(conn)?;

            Ok(working_set::table
                .filter(working_set::code.eq(code))
                .select(WorkingSetEntry::as_select())
                .first(conn)?)
        })?;

        tracing::info!(code = %entry.code, count = entry.count, "working-set item upserted");
        Ok(entry)
    }

    fn remove_item(&self, conn: &mut SqliteConnection, code: &str) -> Result<bool> {
        let n = conn.immediate_transaction::<_, Error, _>(|conn| {
            Ok(diesel::delete(working_set::table.filter(working_set::code.eq(code.trim())))
                .execute(conn)?)
        })?;
        tracing::info!(code, removed = n > 0, "working-set item removed");
        Ok(n > 0)
    }

    fn clear(&self, conn: &mut SqliteConnection) -> Result<usize> {
        let n = conn.immediate_transaction::<_, Error, _>(|conn| {
            Ok(diesel::delete(working_set::table).execute(conn)?)
        })?;
        tracing::info!(removed = n, "working set cleared");
        Ok(n)
    }

    fn count(&self, conn: &mut SqliteConnection) -> Result<i64> {
        Ok(working_set::table.count().get_result(conn)?)
    }

    fn list(&self, conn: &mut SqliteConnection) -> Result<Vec<WorkingSetEntry>> {
        Ok(working_set::table
            .order_by(working_set::id.asc())
            .select(WorkingSetEntry::as_select())
            .load(conn)?)
    }
}
