//! Result Store: the ranked output of the latest successful computation.
//!
//! [`store_results`] replaces every row in one `BEGIN IMMEDIATE` transaction
//! and records when it happened in `engine_kv`. Readers see either the old set
//! or the new one, never a mix.

use diesel::prelude::*;
use serde::Serialize;

use crate::combine::Combination;
use crate::db::now_rfc3339;
use crate::error::{Error, Result};
use crate::models::{CalcResultRow, EngineKv, NewCalcResult};
use crate::schema::{calc_result, engine_kv};

const KEY_LAST_AT: &str = "last_computation.at";
const KEY_LAST_COUNT: &str = "last_computation.results";

/// Bookkeeping for the last successful computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastComputation {
    /// RFC 3339 timestamp of the result write.
    pub at: String,
    /// Number of results written.
    pub results: usize,
}

fn to_i32(n: impl TryInto<i32>, what: &str) -> Result<i32> {
    n.try_into()
        .map_err(|_| Error::Validation(format!("{what} does not fit the result table")))
}

fn put_kv(conn: &mut SqliteConnection, key: &str, value: &str) -> QueryResult<usize> {
    diesel::insert_into(engine_kv::table)
        .values(&EngineKv {
            k: key.to_string(),
            v: value.to_string(),
        })
        .on_conflict(engine_kv::k)
        .do_update()
        .set(engine_kv::v.eq(value))
        .execute(conn)
}

fn get_kv(conn: &mut SqliteConnection, key: &str) -> QueryResult<Option<String>> {
    engine_kv::table
        .filter(engine_kv::k.eq(key))
        .select(engine_kv::v)
        .first(conn)
        .optional()
}

/// Atomically replace all stored results. Afterwards the store holds exactly
/// `results.len()` rows, ranked from 1 in slice order.
pub fn store_results(conn: &mut SqliteConnection, results: &[Combination]) -> Result<LastComputation> {
    let rows = results
        .iter()
        .enumerate()
        .map(|(i, r)| -> Result<NewCalcResult> {
            Ok(NewCalcResult {
                rank: to_i32(i + 1, "rank")?,
                blocks: serde_json::to_string(&r.blocks)?,
                stocks: serde_json::to_string(&r.stocks)?,
                count: to_i32(r.count, "overlap count")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let last = LastComputation {
        at: now_rfc3339(),
        results: rows.len(),
    };

    conn.immediate_transaction::<_, Error, _>(|conn| {
        diesel::delete(calc_result::table).execute(conn)?;
        for row in &rows {
            diesel::insert_into(calc_result::table)
                .values(row)
                .execute(conn)?;
        }
        put_kv(conn, KEY_LAST_AT, &last.at)?;
        put_kv(conn, KEY_LAST_COUNT, &last.results.to_string())?;
        Ok(())
    })?;

    tracing::info!(results = last.results, at = %last.at, "results stored");
    Ok(last)
}

/// Stored results in rank order.
pub fn load_results(conn: &mut SqliteConnection) -> Result<Vec<Combination>> {
    let rows: Vec<CalcResultRow> = calc_result::table
        .order_by(calc_result::rank.asc())
        .select(CalcResultRow::as_select())
        .load(conn)?;

    rows.into_iter()
        .map(|row| -> Result<Combination> {
            Ok(Combination {
                blocks: serde_json::from_str(&row.blocks)?,
                stocks: serde_json::from_str(&row.stocks)?,
                count: u64::try_from(row.count).map_err(|_| {
                    Error::Validation(format!("rank {} has a negative count", row.rank))
                })?,
            })
        })
        .collect()
}

/// Number of stored result rows.
pub fn result_count(conn: &mut SqliteConnection) -> Result<i64> {
    Ok(calc_result::table.count().get_result(conn)?)
}

/// Last successful computation, if one was ever recorded.
pub fn last_computation(conn: &mut SqliteConnection) -> Result<Option<LastComputation>> {
    let Some(at) = get_kv(conn, KEY_LAST_AT)? else {
        return Ok(None);
    };
    let results = get_kv(conn, KEY_LAST_COUNT)?
        .and_then(|v| v.parse().ok())
        .unwrap_or_default();
    Ok(Some(LastComputation { at, results }))
}
