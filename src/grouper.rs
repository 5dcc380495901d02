//! Snapshot Grouper: folds the chronological chunk list into snapshot
//! sets using the canonical five-role sequence `(4, 3, 5, 6, 6)`.

use crate::carver::StoreBlockChunk;

/// Canonical record-type sequence: header, block-list, range,
/// current-bitmap, previous-bitmap.
const ROLE_SEQUENCE: [u32; 5] = [4, 3, 5, 6, 6];

/// Five role-keyed chunks making up one reconstructed snapshot.
/// `previous_bitmap` is `None` when the snapshot set never produced a
/// second type-6 chunk before the set was committed.
#[derive(Debug)]
pub struct SnapshotSet {
    pub header: StoreBlockChunk,
    pub block_list: StoreBlockChunk,
    pub range: StoreBlockChunk,
    pub current_bitmap: StoreBlockChunk,
    pub previous_bitmap: Option<StoreBlockChunk>,
}

struct PendingSet {
    idx: usize,
    header: Option<StoreBlockChunk>,
    block_list: Option<StoreBlockChunk>,
    range: Option<StoreBlockChunk>,
    current_bitmap: Option<StoreBlockChunk>,
    previous_bitmap: Option<StoreBlockChunk>,
    pending_commit: bool,
}

impl PendingSet {
    fn new() -> Self {
        Self {
            idx: 0,
            header: None,
            block_list: None,
            range: None,
            current_bitmap: None,
            previous_bitmap: None,
            pending_commit: false,
        }
    }

    fn assign(&mut self, idx: usize, chunk: StoreBlockChunk) {
        match idx {
            0 => self.header = Some(chunk),
            1 => self.block_list = Some(chunk),
            2 => self.range = Some(chunk),
            3 => self.current_bitmap = Some(chunk),
            4 => self.previous_bitmap = Some(chunk),
            _ => unreachable!("role sequence has exactly five slots"),
        }
    }

    fn try_commit(self) -> Option<SnapshotSet> {
        Some(SnapshotSet {
            header: self.header?,
            block_list: self.block_list?,
            range: self.range?,
            current_bitmap: self.current_bitmap?,
            previous_bitmap: self.previous_bitmap,
        })
    }
}

/// Folds `chunks` into a list of complete snapshot sets, discarding any
/// chunk runs that never complete a header/block-list/range/bitmap
/// quintet.
pub fn group(chunks: Vec<StoreBlockChunk>) -> Vec<SnapshotSet> {
    let mut sets = Vec::new();
    let mut pending = PendingSet::new();

    for chunk in chunks {
        let record_type = chunk.record_type;

        if record_type == ROLE_SEQUENCE[pending.idx] {
            let idx = pending.idx;
            pending.assign(idx, chunk);
            pending.idx += 1;

            if pending.idx == 4 {
                pending.pending_commit = true;
            } else if pending.idx == 5 {
                commit(&mut pending, &mut sets);
            }
            continue;
        }

        if pending.idx == 4 && record_type == ROLE_SEQUENCE[0] {
            commit(&mut pending, &mut sets);
            pending.assign(0, chunk);
            pending.idx = 1;
            continue;
        }

        if pending.pending_commit {
            commit(&mut pending, &mut sets);
        } else {
            pending = PendingSet::new();
        }
    }

    if pending.pending_commit {
        commit(&mut pending, &mut sets);
    }

    tracing::debug!(sets = sets.len(), "finished snapshot grouping");
    sets
}

fn commit(pending: &mut PendingSet, sets: &mut Vec<SnapshotSet>) {
    let finished = std::mem::replace(pending, PendingSet::new());
    if let Some(set) = finished.try_commit() {
        sets.push(set);
    }
}
