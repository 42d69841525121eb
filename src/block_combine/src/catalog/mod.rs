//! Catalog subsystem.
//!
//! The catalog holds blocks, stocks and their membership relation. It is only
//! ever replaced wholesale (or merged into) by [`reload::reload_catalog`], one
//! immediate transaction per reload. See [`input`] for the record shapes the
//! external parser hands over, [`index`] for the derived per-block member sets
//! and [`query`] for read-only listings.

pub mod index;
pub mod input;
pub mod query;
pub mod reload;
pub mod repo;

pub use index::MembershipIndex;
pub use input::{
    BlockRecord, CatalogInput, ExtraBlock, ExtraStock, StockRecord, load_input_path,
    parse_member_lines,
};
pub use reload::{MergeReport, ReloadOptions, ReloadReport, extend_block, reload_catalog};
