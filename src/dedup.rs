//! Deduplicator: discards carved snapshot sets that are already
//! present in the live catalog. A pure filter over in-memory lists.

use crate::catalog_reader::LiveCatalog;
use crate::grouper::SnapshotSet;

/// Keeps only the carved sets whose header chunk's `current_block_offset`
/// does not match any live catalog type-3 entry's `store_header_offset`.
pub fn deduplicate(carved: Vec<SnapshotSet>, live: &LiveCatalog) -> Vec<SnapshotSet> {
    let live_header_offsets: std::collections::HashSet<u64> = live
        .values()
        .filter_map(|pair| pair.type3.as_ref())
        .map(|entry| entry.store_header_offset)
        .collect();

    let before = carved.len();
    let kept: Vec<SnapshotSet> = carved
        .into_iter()
        .filter(|set| !live_header_offsets.contains(&set.header.head.current_block_offset))
        .collect();

    tracing::debug!(
        discarded = before - kept.len(),
        kept = kept.len(),
        "deduplicated carved snapshot sets against the live catalog"
    );
    kept
}
