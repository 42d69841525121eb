//! Catalog reload input: parsing and normalization.
//!
//! The vendor-file parser lives outside this crate. It hands over normalized
//! records in the shape defined here:
//! - `blocks`: `[{code, name}]`
//! - `stocks`: `[{code, region, name?, blocks: [block-code, ...]}]`
//! - `extra`: supplementary concept-style blocks `[{code, name, stocks: [{code, region}]}]`
//!
//! Key behaviors:
//! - All codes are trimmed; an empty code after trimming is a validation error.
//! - Duplicate block codes collapse into one record (first position, last name).
//! - Duplicate stock codes merge: last region/name wins, block lists are unioned.
//! - Block lists and extra stock lists are de-duplicated preserving first occurrence.
//!
//! Entrypoints:
//! - Normalize in place: [`normalize_input`]
//! - Parse + normalize from a TOML string: [`load_input_str`]
//! - Parse + normalize from a file (`.json` or TOML): [`load_input_path`]
//! - Parse a block member list (`<region><code>` per line): [`parse_member_lines`]

use std::{collections::HashSet, mem, path::Path};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Everything a catalog reload consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogInput {
    /// Block definitions.
    #[serde(default)]
    pub blocks: Vec<BlockRecord>,
    /// Stocks with their declared block memberships.
    #[serde(default)]
    pub stocks: Vec<StockRecord>,
    /// Supplementary block definitions merged after the main lists.
    #[serde(default)]
    pub extra: Vec<ExtraBlock>,
}

/// One block definition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BlockRecord {
    /// Block code.
    pub code: String,
    /// Display name.
    pub name: String,
}

/// One stock and the block codes it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StockRecord {
    /// Stock code.
    pub code: String,
    /// Region/exchange marker.
    pub region: i32,
    /// Optional display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Declared block memberships (block codes).
    #[serde(default)]
    pub blocks: Vec<String>,
}

/// A supplementary (concept-style) block and its member stocks.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ExtraBlock {
    /// Code of an existing block whose membership is extended.
    pub code: String,
    /// Name as given by the vendor file; informational only.
    pub name: String,
    /// Member stocks, created if missing.
    pub stocks: Vec<ExtraStock>,
}

/// A stock reference inside an [`ExtraBlock`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ExtraStock {
    /// Stock code.
    pub code: String,
    /// Region/exchange marker.
    pub region: i32,
}

/// Summary of changes performed during normalization.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizationReport {
    /// Duplicate block records collapsed.
    pub blocks_deduped: usize,
    /// Duplicate stock records merged.
    pub stocks_merged: usize,
    /// Repeated block codes removed from stock membership lists.
    pub memberships_deduped: usize,
    /// Duplicate extra entries merged plus repeated stocks removed inside them.
    pub extra_deduped: usize,
}

fn clean_code(raw: &str, what: &str) -> Result<String> {
    let code = raw.trim();
    if code.is_empty() {
        return Err(Error::Validation(format!(
            "{what} code cannot be empty after trimming"
        )));
    }
    Ok(code.to_string())
}

/// Normalize reload input in place.
///
/// Errors:
/// - Empty block, stock, extra or extra-stock codes after trimming
pub fn normalize_input(input: &mut CatalogInput) -> Result<NormalizationReport> {
    let mut report = NormalizationReport::default();

    // --- blocks: collapse by code, keep first position, last name wins
    let mut blocks: IndexMap<String, String> = IndexMap::new();
    for b in mem::take(&mut input.blocks) {
        let code = clean_code(&b.code, "block")?;
        if blocks.insert(code, b.name.trim().to_string()).is_some() {
            report.blocks_deduped += 1;
        }
    }
    input.blocks = blocks
        .into_iter()
        .map(|(code, name)| BlockRecord { code, name })
        .collect();

    // --- stocks: merge by code, union memberships preserving order
    let mut stocks: IndexMap<String, StockRecord> = IndexMap::new();
    for s in mem::take(&mut input.stocks) {
        let code = clean_code(&s.code, "stock")?;
        let name = s
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let declared: Vec<String> = s
            .blocks
            .iter()
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .collect();

        if stocks.contains_key(&code) {
            report.stocks_merged += 1;
        }
        let entry = stocks.entry(code.clone()).or_insert_with(|| StockRecord {
            code,
            region: s.region,
            name: None,
            blocks: Vec::new(),
        });
        entry.region = s.region;
        if name.is_some() {
            entry.name = name;
        }

        let mut seen: HashSet<String> = entry.blocks.iter().cloned().collect();
        for b in declared {
            if seen.insert(b.clone()) {
                entry.blocks.push(b);
            } else {
                report.memberships_deduped += 1;
            }
        }
    }
    input.stocks = stocks.into_values().collect();

    // --- extra: merge entries by code, dedupe member stocks by code
    let mut extra: IndexMap<String, ExtraBlock> = IndexMap::new();
    for e in mem::take(&mut input.extra) {
        let code = clean_code(&e.code, "extra block")?;
        if extra.contains_key(&code) {
            report.extra_deduped += 1;
        }
        let entry = extra.entry(code.clone()).or_insert_with(|| ExtraBlock {
            code,
            name: e.name.trim().to_string(),
            stocks: Vec::new(),
        });

        let mut seen: HashSet<String> = entry.stocks.iter().map(|s| s.code.clone()).collect();
        for s in e.stocks {
            let code = clean_code(&s.code, "extra stock")?;
            if seen.insert(code.clone()) {
                entry.stocks.push(ExtraStock {
                    code,
                    region: s.region,
                });
            } else {
                report.extra_deduped += 1;
            }
        }
    }
    input.extra = extra.into_values().collect();

    Ok(report)
}

/// Parse and normalize reload input from a TOML string.
pub fn load_input_str(toml_str: &str) -> Result<CatalogInput> {
    let mut input: CatalogInput = toml::from_str(toml_str)
        .map_err(|e| Error::Validation(format!("failed to parse catalog TOML: {e}")))?;
    let report = normalize_input(&mut input)?;
    tracing::debug!(?report, "normalized catalog input");
    Ok(input)
}

/// Read reload input from disk, parse, and normalize it.
///
/// Files ending in `.json` are parsed as JSON, everything else as TOML.
pub fn load_input_path(path: impl AsRef<Path>) -> Result<CatalogInput> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) {
        let mut input: CatalogInput = serde_json::from_str(&text).map_err(|e| {
            Error::Validation(format!("failed to parse {}: {e}", path.display()))
        })?;
        normalize_input(&mut input)?;
        Ok(input)
    } else {
        load_input_str(&text)
    }
}

/// Parse a block member list: one stock per line, the first character is the
/// region marker and the rest is the stock code (`1600519` is region 1, code
/// `600519`). Blank lines are skipped; repeated codes keep the first entry.
pub fn parse_member_lines(text: &str) -> Result<Vec<ExtraStock>> {
    let mut members: IndexMap<String, i32> = IndexMap::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut chars = line.chars();
        let region = chars
            .next()
            .and_then(|c| c.to_digit(10))
            .ok_or_else(|| {
                Error::Validation(format!(
                    "line {}: missing region marker in {line:?}",
                    lineno + 1
                ))
            })?;
        let code = chars.as_str().trim();
        if code.is_empty() {
            return Err(Error::Validation(format!(
                "line {}: stock code cannot be empty",
                lineno + 1
            )));
        }
        members.entry(code.to_string()).or_insert(region as i32);
    }
    Ok(members
        .into_iter()
        .map(|(code, region)| ExtraStock { code, region })
        .collect())
}
