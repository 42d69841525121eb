//! Engine orchestration: snapshot read, ranking, code resolution, persistence.

use std::collections::HashMap;

use diesel::prelude::*;
use serde::Serialize;

use crate::catalog::MembershipIndex;
use crate::combine::rank::rank_triplets;
use crate::combine::{CancelToken, Combination, ensure_viable};
use crate::error::{Error, IntegrityWarning, IntegrityWarningKind, Result};
use crate::models::catalog::external_code;
use crate::results::{LastComputation, store_results};
use crate::schema::{blocks, stocks, working_set};

const LOOKUP_CHUNK: usize = 500;

/// What a successful computation produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComputeReport {
    /// Ranked results, best first. Also what the result store now holds.
    pub results: Vec<Combination>,
    /// Working-set codes that resolved to catalog blocks.
    pub usable_blocks: usize,
    /// `C(usable_blocks, 3)`.
    pub total_combinations: u64,
    /// Stale working-set codes that were skipped.
    pub warnings: Vec<IntegrityWarning>,
    /// When the results were written.
    pub computed_at: String,
}

struct Ranked {
    results: Vec<Combination>,
    usable_blocks: usize,
    total_combinations: u64,
    warnings: Vec<IntegrityWarning>,
}

/// Compute the best `top_n` triplets over the current working set and replace
/// the result store with them.
///
/// The catalog and working set are read inside one deferred transaction so
/// the ranking sees a single snapshot. `cancel` is honored until the result
/// write begins; the write itself is all-or-nothing.
pub fn compute_top_combinations(
    conn: &mut SqliteConnection,
    top_n: usize,
    max_working_set: usize,
    cancel: &CancelToken,
) -> Result<ComputeReport> {
    if top_n == 0 {
        return Err(Error::Validation("top_n must be at least 1".into()));
    }

    let ranked = conn.transaction::<_, Error, _>(|conn| {
        rank_snapshot(conn, top_n, max_working_set, cancel)
    })?;

    cancel.check()?;
    let LastComputation { at, .. } = store_results(conn, &ranked.results)?;

    tracing::info!(
        usable = ranked.usable_blocks,
        combinations = ranked.total_combinations,
        results = ranked.results.len(),
        best = ranked.results.first().map(|r| r.count),
        "combinations computed"
    );

    Ok(ComputeReport {
        results: ranked.results,
        usable_blocks: ranked.usable_blocks,
        total_combinations: ranked.total_combinations,
        warnings: ranked.warnings,
        computed_at: at,
    })
}

fn rank_snapshot(
    conn: &mut SqliteConnection,
    top_n: usize,
    max_working_set: usize,
    cancel: &CancelToken,
) -> Result<Ranked> {
    let codes: Vec<String> = working_set::table
        .order_by(working_set::id.asc())
        .select(working_set::code)
        .load(conn)?;
    if codes.len() > max_working_set {
        return Err(Error::Validation(format!(
            "working set holds {} codes, the ceiling is {max_working_set}",
            codes.len()
        )));
    }

    let mut id_of: HashMap<String, i32> = HashMap::with_capacity(codes.len());
    for chunk in codes.chunks(LOOKUP_CHUNK) {
        let rows: Vec<(String, i32)> = blocks::table
            .filter(blocks::code.eq_any(chunk))
            .select((blocks::code, blocks::id))
            .load(conn)?;
        id_of.extend(rows);
    }

    let mut usable: Vec<(String, i32)> = Vec::with_capacity(codes.len());
    let mut warnings = Vec::new();
    for code in codes {
        match id_of.get(&code) {
            Some(&id) => usable.push((code, id)),
            None => warnings.push(IntegrityWarning::new(
                IntegrityWarningKind::StaleWorkingSetCode,
                code,
                "not in catalog, skipped",
            )),
        }
    }

    let total_combinations = ensure_viable(usable.len())?;

    let block_ids: Vec<i32> = usable.iter().map(|(_, id)| *id).collect();
    let index = MembershipIndex::load(conn, &block_ids)?;
    let sets = block_ids
        .iter()
        .map(|id| index.members(*id).cloned().unwrap_or_default())
        .collect::<Vec<_>>();
    tracing::debug!(blocks = sets.len(), total_combinations, "member sets materialized");

    let top = rank_triplets(&sets, top_n, cancel)?;

    let mut results = Vec::with_capacity(top.len());
    for t in top {
        let [i, j, k] = t.members;
        let common = &(&sets[i] & &sets[j]) & &sets[k];
        let ids = common
            .iter()
            .map(|id| i32::try_from(id).map_err(|_| Error::Validation(format!("stock id {id} out of range"))))
            .collect::<Result<Vec<i32>>>()?;
        results.push(Combination {
            blocks: [i, j, k].map(|p| usable[p].0.clone()),
            count: t.count,
            stocks: resolve_stock_codes(conn, &ids)?,
        });
    }

    Ok(Ranked {
        results,
        usable_blocks: usable.len(),
        total_combinations,
        warnings,
    })
}

/// External codes (`region + code`) for the given stock ids, sorted ascending.
fn resolve_stock_codes(conn: &mut SqliteConnection, ids: &[i32]) -> Result<Vec<String>> {
    let mut out = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(LOOKUP_CHUNK) {
        let rows: Vec<(i32, String)> = stocks::table
            .filter(stocks::id.eq_any(chunk))
            .select((stocks::region, stocks::code))
            .load(conn)?;
        out.extend(rows.iter().map(|(region, code)| external_code(*region, code)));
    }
    out.sort_unstable();
    Ok(out)
}
