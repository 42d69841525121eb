//! Derived `block_id -> stock ids` lookup built from association rows.
//!
//! The catalog keeps membership only as `(stock_id, block_id)` rows. Anything
//! that needs per-block member sets materializes them here, once, as roaring
//! bitmaps, and then intersects in memory.

use std::collections::HashMap;

use diesel::prelude::*;
use roaring::RoaringBitmap;

use crate::error::{Error, Result};
use crate::schema::stock_block_association as sba;

/// Member sets keyed by block id.
#[derive(Debug, Default, Clone)]
pub struct MembershipIndex {
    members: HashMap<i32, RoaringBitmap>,
}

pub(crate) fn stock_key(stock_id: i32) -> Result<u32> {
    u32::try_from(stock_id).map_err(|_| Error::Validation(format!("stock id {stock_id} out of range")))
}

impl MembershipIndex {
    /// Build from `(block_id, stock_id)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (i32, i32)>) -> Result<Self> {
        let mut members: HashMap<i32, RoaringBitmap> = HashMap::new();
        for (block_id, stock_id) in pairs {
            members.entry(block_id).or_default().insert(stock_key(stock_id)?);
        }
        Ok(Self { members })
    }

    /// Load member sets for the given blocks in one query.
    ///
    /// Blocks with no members get an empty set so callers can tell "known but
    /// empty" from "not requested".
    pub fn load(conn: &mut SqliteConnection, block_ids: &[i32]) -> Result<Self> {
        let rows: Vec<(i32, i32)> = sba::table
            .filter(sba::block_id.eq_any(block_ids))
            .select((sba::block_id, sba::stock_id))
            .load(conn)?;
        let mut index = Self::from_pairs(rows)?;
        for id in block_ids {
            index.members.entry(*id).or_default();
        }
        Ok(index)
    }

    /// Stock ids linked to `block_id`.
    pub fn members(&self, block_id: i32) -> Option<&RoaringBitmap> {
        self.members.get(&block_id)
    }

    /// Number of indexed blocks.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True if no block is indexed.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
