//! Block/stock catalog and block-triplet overlap engine.
//!
//! A catalog of blocks (thematic stock groupings) and stocks lives in SQLite.
//! Users pick a working set of block codes; the engine finds the triplets of
//! blocks whose member stocks overlap the most, stores the ranked result, and
//! exports it as vendor custom-block files.
//!
//! Start with [`BlockCombine`]; the modules below are usable on their own with
//! a connection from [`db::connection::connect_sqlite`].

#![deny(missing_docs)]

pub mod catalog;
pub mod combine;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod results;
/// Diesel table definitions.
#[allow(missing_docs)]
pub mod schema;
pub mod service;
pub mod status;
pub mod text;
pub mod working_set;

pub use error::{Error, IntegrityWarning, Outcome, Result, StatusCode};
pub use service::BlockCombine;
