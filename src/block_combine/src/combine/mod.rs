//! Combination Engine: top-N block triplets by common-stock overlap.
//!
//! The work is split in two:
//! - [`rank`] is pure. It takes per-block member sets in working-set order and
//!   returns the best triplets by intersection size, ties broken by
//!   enumeration order `(i, j, k)` with `i < j < k`.
//! - [`engine`] reads a catalog snapshot, materializes member sets once,
//!   resolves the winners to external stock codes, and hands them to the
//!   result store.

mod engine;
pub mod rank;

pub use engine::{ComputeReport, compute_top_combinations};
pub use rank::{RankedTriplet, rank_triplets};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Group size. Fixed.
pub const GROUP_SIZE: usize = 3;

/// A computation needs strictly more than this many triplets to run.
pub const MIN_COMBINATIONS: u64 = 3;

/// One ranked result: three block codes, their common stocks, and the overlap size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combination {
    /// Block codes in working-set order.
    pub blocks: [String; GROUP_SIZE],
    /// Size of the three-way intersection.
    pub count: u64,
    /// Common stocks as `region + code`, sorted ascending.
    pub stocks: Vec<String>,
}

/// `C(n, 3)`.
pub fn combinations(n: usize) -> u64 {
    let n = n as u64;
    if n < 3 {
        return 0;
    }
    n * (n - 1) * (n - 2) / 6
}

/// Fail with [`Error::InsufficientBlocks`] unless `usable` blocks give more
/// than [`MIN_COMBINATIONS`] triplets. Returns the triplet count.
pub fn ensure_viable(usable: usize) -> Result<u64> {
    let total = combinations(usable);
    if total <= MIN_COMBINATIONS {
        return Err(Error::InsufficientBlocks {
            usable,
            combinations: total,
        });
    }
    Ok(total)
}

/// Cooperative cancellation flag shared between a caller and a running computation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Has no effect once results are being written.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// `Err(Error::Cancelled)` if cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combination_counts() {
        assert_eq!(combinations(0), 0);
        assert_eq!(combinations(2), 0);
        assert_eq!(combinations(3), 1);
        assert_eq!(combinations(4), 4);
        assert_eq!(combinations(5), 10);
        assert_eq!(combinations(300), 4_455_100);
    }

    #[test]
    fn threshold_is_strictly_greater_than_three() {
        assert!(matches!(
            ensure_viable(3),
            Err(Error::InsufficientBlocks {
                usable: 3,
                combinations: 1
            })
        ));
        assert!(ensure_viable(0).is_err());
        assert_eq!(ensure_viable(4).unwrap(), 4);
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let seen_by_worker = token.clone();
        assert!(seen_by_worker.check().is_ok());
        token.cancel();
        assert!(matches!(seen_by_worker.check(), Err(Error::Cancelled)));
    }
}
