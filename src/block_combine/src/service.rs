//! The programmatic surface: one [`BlockCombine`] per database.
//!
//! Each operation opens its own tuned connection and runs its own scoped
//! transaction(s). Two in-process gates serialize conflicting work and turn
//! overlap into [`Error::Busy`] instead of waiting:
//! - catalog gate: [`BlockCombine::reload_catalog`], [`BlockCombine::extend_block`],
//!   [`BlockCombine::compute_top_combinations`]
//! - working-set gate: import, insert, remove, clear
//!
//! Reads (`list_*`, [`BlockCombine::load_results`], [`BlockCombine::get_status`])
//! take no gate. Across processes SQLite's single writer applies; a writer
//! that outlives the busy timeout also surfaces as `Busy`.
//!
//! The last computation's state is kept in an [`ArcSwap`] so status readers
//! never wait on a running computation.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use arc_swap::ArcSwap;
use diesel::{Connection, SqliteConnection};

use crate::catalog::input::{CatalogInput, ExtraStock, load_input_path, parse_member_lines};
use crate::catalog::query::{self, BlockSummary};
use crate::catalog::reload::{self, MergeReport, ReloadOptions, ReloadReport};
use crate::combine::{self, CancelToken, Combination, ComputeReport};
use crate::config::Settings;
use crate::db::{connection::connect_sqlite, migrate, now_rfc3339};
use crate::error::{Error, Result};
use crate::export::{BlkExporter, Exporter};
use crate::models::WorkingSetEntry;
use crate::results;
use crate::status::{ComputationState, Status};
use crate::text::{decode, resolve_encoding};
use crate::working_set::{ImportReport, SqliteWorkingSetRepo, WorkingSetRepo, read_codes_file};

const CATALOG_GATE: &str = "a catalog operation";
const WORKING_SET_GATE: &str = "a working-set mutation";

fn acquire<'a>(gate: &'a Mutex<()>, what: &'static str) -> Result<MutexGuard<'a, ()>> {
    match gate.try_lock() {
        Ok(guard) => Ok(guard),
        Err(TryLockError::WouldBlock) => {
            tracing::warn!(gate = what, "rejected overlapping operation");
            Err(Error::Busy(what))
        }
        // Gates guard no data.
        Err(TryLockError::Poisoned(p)) => Ok(p.into_inner()),
    }
}

/// Block catalog, working set, combination engine and result store over one database.
pub struct BlockCombine {
    settings: Settings,
    working_set: SqliteWorkingSetRepo,
    catalog_gate: Mutex<()>,
    working_set_gate: Mutex<()>,
    computation: ArcSwap<ComputationState>,
}

impl std::fmt::Debug for BlockCombine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockCombine")
            .field("database_url", &self.settings.database_url)
            .field("computation", &self.computation.load())
            .finish_non_exhaustive()
    }
}

impl BlockCombine {
    /// Validate settings, apply pending migrations, and restore the last
    /// successful computation from the database.
    pub fn open(settings: Settings) -> Result<Self> {
        settings.validate()?;
        migrate::run_all(&settings.database_url)
            .map_err(|e| Error::Config(format!("migrations failed: {e:#}")))?;

        let mut conn = connect_sqlite(&settings.database_url)?;
        let computation = match results::last_computation(&mut conn)? {
            Some(last) => ComputationState::Succeeded {
                at: last.at,
                results: last.results,
            },
            None => ComputationState::Never,
        };
        tracing::info!(database = %settings.database_url, ?computation, "service opened");

        Ok(Self {
            working_set: SqliteWorkingSetRepo::new(settings.engine.max_working_set),
            settings,
            catalog_gate: Mutex::new(()),
            working_set_gate: Mutex::new(()),
            computation: ArcSwap::from_pointee(computation),
        })
    }

    /// Settings this service was opened with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// A fresh connection with the standard PRAGMAs.
    pub fn connect(&self) -> Result<SqliteConnection> {
        connect_sqlite(&self.settings.database_url)
    }

    /// Replace (or, with `clear = false`, merge into) the catalog atomically.
    #[tracing::instrument(skip(self, input), fields(blocks = input.blocks.len(), stocks = input.stocks.len()))]
    pub fn reload_catalog(&self, input: CatalogInput, opt: ReloadOptions) -> Result<ReloadReport> {
        let _gate = acquire(&self.catalog_gate, CATALOG_GATE)?;
        let mut conn = self.connect()?;
        reload::reload_catalog(&mut conn, input, opt)
    }

    /// [`Self::reload_catalog`] from a TOML or JSON file.
    pub fn reload_catalog_file(&self, path: &Path, opt: ReloadOptions) -> Result<ReloadReport> {
        let input = load_input_path(path)?;
        self.reload_catalog(input, opt)
    }

    /// Add stocks to one existing block without touching its other members.
    #[tracing::instrument(skip(self, members), fields(members = members.len()))]
    pub fn extend_block(&self, block_code: &str, members: &[ExtraStock]) -> Result<MergeReport> {
        let _gate = acquire(&self.catalog_gate, CATALOG_GATE)?;
        let mut conn = self.connect()?;
        reload::extend_block(&mut conn, block_code, members)
    }

    /// [`Self::extend_block`] from a member file (`<region><code>` per line),
    /// decoded with the import encoding.
    pub fn extend_block_file(&self, block_code: &str, path: &Path) -> Result<MergeReport> {
        let encoding = resolve_encoding(&self.settings.import.encoding)?;
        let text = decode(&std::fs::read(path)?, encoding)?;
        let members = parse_member_lines(&text)?;
        self.extend_block(block_code, &members)
    }

    /// All blocks ordered by code, with member counts.
    pub fn list_blocks(&self) -> Result<Vec<BlockSummary>> {
        query::list_blocks(&mut self.connect()?)
    }

    /// Replace the working set with the catalog blocks matching `codes`.
    /// Unmatched codes are reported, not fatal.
    #[tracing::instrument(skip(self, codes), fields(codes = codes.len()))]
    pub fn import_working_set(&self, codes: &[String]) -> Result<ImportReport> {
        let _gate = acquire(&self.working_set_gate, WORKING_SET_GATE)?;
        let mut conn = self.connect()?;
        let report = self.working_set.import(&mut conn, codes)?;
        if report.found_codes.len() <= combine::GROUP_SIZE {
            tracing::warn!(
                found = report.found_codes.len(),
                "working set too small to compute combinations"
            );
        }
        Ok(report)
    }

    /// [`Self::import_working_set`] from a text file in the import encoding.
    pub fn import_working_set_file(&self, path: &Path) -> Result<ImportReport> {
        let encoding = resolve_encoding(&self.settings.import.encoding)?;
        let codes = read_codes_file(path, encoding)?;
        self.import_working_set(&codes)
    }

    /// Upsert one working-set entry keyed by code; other entries are kept.
    #[tracing::instrument(skip(self))]
    pub fn insert_working_set_item(&self, code: &str) -> Result<WorkingSetEntry> {
        let _gate = acquire(&self.working_set_gate, WORKING_SET_GATE)?;
        self.working_set.insert_item(&mut self.connect()?, code)
    }

    /// Remove one working-set entry. Returns whether it existed.
    #[tracing::instrument(skip(self))]
    pub fn remove_working_set_item(&self, code: &str) -> Result<bool> {
        let _gate = acquire(&self.working_set_gate, WORKING_SET_GATE)?;
        self.working_set.remove_item(&mut self.connect()?, code)
    }

    /// Empty the working set. Returns the number of removed entries.
    #[tracing::instrument(skip(self))]
    pub fn clear_working_set(&self) -> Result<usize> {
        let _gate = acquire(&self.working_set_gate, WORKING_SET_GATE)?;
        self.working_set.clear(&mut self.connect()?)
    }

    /// Working-set entries in insertion order.
    pub fn list_working_set(&self) -> Result<Vec<WorkingSetEntry>> {
        self.working_set.list(&mut self.connect()?)
    }

    /// Compute the best `top_n` triplets (default from settings) and replace
    /// the stored results.
    ///
    /// Holds the catalog gate for the whole run, so a reload can never
    /// interleave. On any error the stored results are left as they were.
    #[tracing::instrument(skip(self, cancel))]
    pub fn compute_top_combinations(
        &self,
        top_n: Option<usize>,
        cancel: &CancelToken,
    ) -> Result<ComputeReport> {
        let top_n = top_n.unwrap_or(self.settings.engine.default_top_n);
        let _gate = acquire(&self.catalog_gate, CATALOG_GATE)?;

        self.computation.store(Arc::new(ComputationState::Running {
            started_at: now_rfc3339(),
            top_n,
        }));

        let outcome = self.connect().and_then(|mut conn| {
            combine::compute_top_combinations(
                &mut conn,
                top_n,
                self.settings.engine.max_working_set,
                cancel,
            )
        });

        let state = match &outcome {
            Ok(report) => ComputationState::Succeeded {
                at: report.computed_at.clone(),
                results: report.results.len(),
            },
            Err(Error::Cancelled) => {
                tracing::info!("computation cancelled before results were written");
                ComputationState::Cancelled { at: now_rfc3339() }
            }
            Err(e) => {
                tracing::warn!(error = %e, "computation failed");
                ComputationState::Failed {
                    at: now_rfc3339(),
                    status: e.status(),
                    message: e.to_string(),
                }
            }
        };
        self.computation.store(Arc::new(state));
        outcome
    }

    /// Stored results in rank order.
    pub fn load_results(&self) -> Result<Vec<Combination>> {
        results::load_results(&mut self.connect()?)
    }

    /// Export stored results with the configured `.blk` exporter into
    /// `destination` (default: `export.dir`).
    pub fn export_results(&self, destination: Option<&Path>) -> Result<Vec<PathBuf>> {
        let exporter = BlkExporter::new(&self.settings.export)?;
        self.export_results_with(&exporter, destination.unwrap_or(&self.settings.export.dir))
    }

    /// Export stored results with any [`Exporter`].
    #[tracing::instrument(skip(self, exporter))]
    pub fn export_results_with(
        &self,
        exporter: &dyn Exporter,
        destination: &Path,
    ) -> Result<Vec<PathBuf>> {
        let stored = self.load_results()?;
        exporter.export(&stored, destination)
    }

    /// Row counts, last catalog update, and last computation state.
    pub fn get_status(&self) -> Result<Status> {
        let mut conn = self.connect()?;
        let (catalog, working_set, stored) = conn.transaction::<_, Error, _>(|conn| {
            let catalog = query::counts(conn)?;
            let working_set = self.working_set.count(conn)?;
            let stored = results::result_count(conn)?;
            Ok((catalog, working_set, stored))
        })?;

        Ok(Status {
            catalog,
            working_set,
            results: stored,
            computation: self.computation_state().as_ref().clone(),
        })
    }

    /// Current computation state without touching the database.
    pub fn computation_state(&self) -> Arc<ComputationState> {
        self.computation.load_full()
    }
}
