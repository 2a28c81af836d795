//! Result deduplication by slice id

use crate::index::{PointId, ScoredSlice};
use ahash::{HashSet, HashSetExt};

/// Drop repeated slices, keeping the first occurrence of each id
///
/// Used when result sets of several queries are merged.
pub fn deduplicate_slices(slices: Vec<ScoredSlice>) -> Vec<ScoredSlice> {
    let mut seen: HashSet<PointId> = HashSet::new();

    slices
        .into_iter()
        .filter(|slice| seen.insert(slice.id.clone()))
        .collect()
}
