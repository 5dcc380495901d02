//! Chain Repairer: materialises each chunk's complete successor list by
//! chasing `next_block_offset` through the block index, fabricating
//! dummy blocks to bridge gaps left by a broken chain.

use itertools::Itertools;
use vss_types::{StoreBlockHeader, BLOCK_SIZE};

use crate::carver::{BlockIndex, IndexedBlock, StoreBlockChunk};
use crate::grouper::SnapshotSet;

/// Maximum forward search distance (in 16 KiB strides) when looking for
/// a chain's resumption point after an unindexed gap.
const MAX_SEARCH_STRIDES: u64 = 16;

/// Walks and repairs every chunk's successor chain across every
/// snapshot set, mutating the shared block index with any fabricated
/// dummy blocks along the way.
pub fn repair(sets: &mut [SnapshotSet], block_index: &mut BlockIndex) {
    for set in sets.iter_mut() {
        repair_chunk(&mut set.header, block_index);
        repair_chunk(&mut set.block_list, block_index);
        repair_chunk(&mut set.range, block_index);
        repair_chunk(&mut set.current_bitmap, block_index);
        if let Some(prev) = set.previous_bitmap.as_mut() {
            repair_chunk(prev, block_index);
        }
    }
}

fn repair_chunk(chunk: &mut StoreBlockChunk, block_index: &mut BlockIndex) {
    let mut successors = Vec::new();
    let mut cursor = chunk.head.next_block_offset;

    loop {
        if cursor == 0 {
            successors.push(0);
            break;
        }

        if let Some(indexed) = block_index.get(&cursor) {
            let next = indexed.header.next_block_offset;
            successors.push(cursor);
            if next == 0 || block_index.contains_key(&next) {
                cursor = next;
                continue;
            } else {
                tracing::debug!(offset = cursor, "chain broken mid-chain, terminating");
                successors.push(0);
                break;
            }
        }

        match bridge_gap(cursor, block_index) {
            Some((dummy_offsets, resume_at)) => {
                successors.extend(dummy_offsets.iter().copied());
                tracing::debug!(
                    start = cursor,
                    strides = dummy_offsets.len(),
                    resume_at,
                    "bridged chain gap with fabricated dummy blocks"
                );
                cursor = resume_at;
            }
            None => {
                tracing::debug!(start = cursor, "gap exceeds search window, terminating chain");
                successors.push(0);
                break;
            }
        }
    }

    clip_stale_tail(&mut successors, block_index);
    chunk.list_next_block_offset = successors;
}

/// Searches forward from `start` in 16 KiB strides for an indexed
/// type-3 block. On success, fabricates dummy type-3 entries spanning
/// the gap, inserts them into `block_index`, and returns their offsets
/// plus the offset at which the real chain resumes.
fn bridge_gap(start: u64, block_index: &mut BlockIndex) -> Option<(Vec<u64>, u64)> {
    for k in 1..=MAX_SEARCH_STRIDES {
        let candidate = start + k * BLOCK_SIZE;
        if let Some(indexed) = block_index.get(&candidate) {
            if indexed.header.record_type == 3 {
                // Link each fabricated slot tip-to-tail with the one after
                // it, the last one pointing at the real chain's resumption.
                let dummy_offsets: Vec<u64> = (0..k).map(|i| start + i * BLOCK_SIZE).collect();
                for (offset, next) in dummy_offsets.iter().copied().chain([candidate]).tuple_windows() {
                    let header = StoreBlockHeader::dummy(offset, next);
                    block_index.insert(offset, IndexedBlock { header, dummy: true });
                }
                return Some((dummy_offsets, candidate));
            }
        }
    }
    None
}

/// Clips a stale chain tail: when the successor list has at least two
/// entries, the indexed second-to-last block's `next_block_offset` is
/// forced to zero.
fn clip_stale_tail(successors: &mut [u64], block_index: &mut BlockIndex) {
    if successors.len() < 2 {
        return;
    }
    let second_to_last = successors[successors.len() - 2];
    if second_to_last == 0 {
        return;
    }
    if let Some(indexed) = block_index.get_mut(&second_to_last) {
        indexed.header.next_block_offset = 0;
    }
}
