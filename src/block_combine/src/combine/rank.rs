//! Pure ranking of block triplets by intersection size.
//!
//! Triplets are enumerated as `(i, j, k)` with `i < j < k` over the input
//! slice, in lexicographic order. The array `[i, j, k]` is therefore also the
//! enumeration ordinal, which is what ties are broken on.
//!
//! A bounded max-heap keeps the `top_n` best candidates seen so far, with the
//! worst of them on top. Each pair intersection `a ∩ b` is computed once and
//! reused for every `c`. Since a later triplet can only displace the worst kept
//! one by a strictly larger count, and `|a ∩ b ∩ c| <= |a ∩ b|`, a pair whose
//! intersection is not larger than the current worst is skipped entirely.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use roaring::RoaringBitmap;

use crate::combine::{CancelToken, GROUP_SIZE, combinations};
use crate::error::Result;

/// A triplet of positions into the ranked input and its intersection size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankedTriplet {
    /// Positions `i < j < k` into the input slice.
    pub members: [usize; GROUP_SIZE],
    /// `|s[i] ∩ s[j] ∩ s[k]|`.
    pub count: u64,
}

// Ordered so that the *worse* candidate is greater: lower count first, then
// later enumeration position.
impl Ord for RankedTriplet {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .count
            .cmp(&self.count)
            .then_with(|| self.members.cmp(&other.members))
    }
}

impl PartialOrd for RankedTriplet {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Best `top_n` triplets over `sets`, best first.
///
/// Returns fewer than `top_n` entries only when fewer triplets exist.
/// `cancel` is polled once per pair.
pub fn rank_triplets(
    sets: &[RoaringBitmap],
    top_n: usize,
    cancel: &CancelToken,
) -> Result<Vec<RankedTriplet>> {
    let n = sets.len();
    if top_n == 0 {
        return Ok(Vec::new());
    }
    // the heap never holds more than every triplet there is
    let bound = usize::try_from(combinations(n)).map_or(top_n, |total| total.min(top_n));
    let mut heap: BinaryHeap<RankedTriplet> = BinaryHeap::with_capacity(bound);

    for i in 0..n {
        for j in (i + 1)..n {
            cancel.check()?;

            let floor = if heap.len() == top_n {
                heap.peek().map(|worst| worst.count)
            } else {
                None
            };
            let pair = &sets[i] & &sets[j];
            if floor.is_some_and(|f| pair.len() <= f) {
                continue;
            }

            for k in (j + 1)..n {
                let candidate = RankedTriplet {
                    members: [i, j, k],
                    count: pair.intersection_len(&sets[k]),
                };
                if heap.len() < top_n {
                    heap.push(candidate);
                } else if heap.peek().is_some_and(|worst| candidate < *worst) {
                    heap.pop();
                    heap.push(candidate);
                }
            }
        }
    }

    Ok(heap.into_sorted_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn set(ids: &[u32]) -> RoaringBitmap {
        ids.iter().copied().collect()
    }

    /// Every triplet, counted directly, stably sorted by count.
    fn brute_force(sets: &[RoaringBitmap], top_n: usize) -> Vec<RankedTriplet> {
        let mut all = Vec::new();
        for i in 0..sets.len() {
            for j in (i + 1)..sets.len() {
                for k in (j + 1)..sets.len() {
                    let common = sets[i]
                        .iter()
                        .filter(|s| sets[j].contains(*s) && sets[k].contains(*s))
                        .count() as u64;
                    all.push(RankedTriplet {
                        members: [i, j, k],
                        count: common,
                    });
                }
            }
        }
        all.sort_by(|a, b| b.count.cmp(&a.count));
        all.truncate(top_n);
        all
    }

    #[test]
    fn picks_largest_overlap_first() {
        // A, B, C, D
        let sets = vec![
            set(&[1, 2, 4]),
            set(&[1, 2, 3]),
            set(&[1, 2, 3]),
            set(&[3, 4]),
        ];
        let top = rank_triplets(&sets, 2, &CancelToken::new()).unwrap();
        assert_eq!(
            top,
            vec![
                RankedTriplet {
                    members: [0, 1, 2],
                    count: 2
                },
                RankedTriplet {
                    members: [1, 2, 3],
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn ties_keep_enumeration_order() {
        let sets = vec![set(&[7]); 5];
        let top = rank_triplets(&sets, 3, &CancelToken::new()).unwrap();
        let members: Vec<_> = top.iter().map(|t| t.members).collect();
        assert_eq!(members, vec![[0, 1, 2], [0, 1, 3], [0, 1, 4]]);
        assert!(top.iter().all(|t| t.count == 1));
    }

    #[test]
    fn returns_every_triplet_when_top_n_is_large() {
        let sets = vec![set(&[1]), set(&[1]), set(&[]), set(&[1])];
        let top = rank_triplets(&sets, 10, &CancelToken::new()).unwrap();
        assert_eq!(top.len(), 4);
        assert_eq!(top[0].members, [0, 1, 3]);
        assert_eq!(top[0].count, 1);
    }

    #[test]
    fn unbounded_top_n_does_not_preallocate() {
        let sets = vec![set(&[1, 2]), set(&[1]), set(&[2]), set(&[1, 2])];
        let top = rank_triplets(&sets, usize::MAX, &CancelToken::new()).unwrap();
        assert_eq!(top.len(), 4);
        assert_eq!(top[0].members, [0, 1, 3]);
    }

    #[test]
    fn zero_top_n_yields_nothing() {
        let sets = vec![set(&[1]); 4];
        assert!(rank_triplets(&sets, 0, &CancelToken::new()).unwrap().is_empty());
    }

    #[test]
    fn cancelled_token_stops_enumeration() {
        let token = CancelToken::new();
        token.cancel();
        let sets = vec![set(&[1]); 4];
        assert!(matches!(
            rank_triplets(&sets, 3, &token),
            Err(crate::Error::Cancelled)
        ));
    }

    fn arb_sets() -> impl Strategy<Value = Vec<RoaringBitmap>> {
        proptest::collection::vec(
            proptest::collection::btree_set(0u32..24, 0..12)
                .prop_map(|s| s.into_iter().collect::<RoaringBitmap>()),
            3..10,
        )
    }

    proptest! {
        #[test]
        fn matches_brute_force_oracle(sets in arb_sets(), top_n in 1usize..8) {
            let fast = rank_triplets(&sets, top_n, &CancelToken::new()).unwrap();
            prop_assert_eq!(fast, brute_force(&sets, top_n));
        }

        #[test]
        fn counts_are_non_increasing(sets in arb_sets(), top_n in 1usize..12) {
            let top = rank_triplets(&sets, top_n, &CancelToken::new()).unwrap();
            for w in top.windows(2) {
                prop_assert!(w[0].count >= w[1].count);
                if w[0].count == w[1].count {
                    prop_assert!(w[0].members < w[1].members);
                }
            }
        }
    }
}
