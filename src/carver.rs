//! Block Carver: a linear 16 KiB-aligned sweep of the image that builds
//! a block index and a chronological chunk list.

use std::collections::HashMap;
use std::io::{Read, Seek};

use deku::prelude::*;
use vss_types::{StoreBlockHeader, StoreRecordType, BLOCK_SIZE, RECORD_SIZE};

use crate::error::Result;
use crate::image::read_at;

/// Maps an on-disk block offset (relative to the volume start) to the
/// header found there. Carved in order by [`carve`]; may later gain
/// fabricated entries flagged `dummy = true` from the Chain Repairer.
pub type BlockIndex = HashMap<u64, IndexedBlock>;

#[derive(Debug, Clone)]
pub struct IndexedBlock {
    pub header: StoreBlockHeader,
    pub dummy: bool,
}

/// A contiguous run of same-record-type blocks discovered during the
/// sweep. `list_next_block_offset` starts out seeded with just the
/// head's own `next_block_offset`; the Chain Repairer fills in the rest.
#[derive(Debug, Clone)]
pub struct StoreBlockChunk {
    pub head_offset: u64,
    pub record_type: u32,
    pub head: StoreBlockHeader,
    pub list_next_block_offset: Vec<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    GapOrDiscontinuity,
    CleanTerminator,
    ForeignRecordType,
}

struct ChunkState {
    open: bool,
    head_offset: u64,
    record_type: u32,
    head: Option<StoreBlockHeader>,
    next_seed: u64,
    chunk_continue: bool,
}

impl ChunkState {
    fn idle() -> Self {
        Self {
            open: false,
            head_offset: 0,
            record_type: 0,
            head: None,
            next_seed: 0,
            chunk_continue: false,
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// Sweeps `image` from `volume_offset` to end-of-file in 16 KiB strides,
/// producing the block index and chronological chunk list.
pub fn carve(
    image: &mut (impl Read + Seek),
    volume_offset: u64,
    volume_size: u64,
) -> Result<(BlockIndex, Vec<StoreBlockChunk>)> {
    let mut block_index = BlockIndex::new();
    let mut chunks = Vec::new();
    let mut state = ChunkState::idle();

    let mut offset = 0u64;
    while offset + RECORD_SIZE <= volume_size {
        let raw = match read_at(image, volume_offset + offset, RECORD_SIZE as usize) {
            Ok(raw) => raw,
            Err(_) => break,
        };
        let header = match StoreBlockHeader::from_bytes((&raw, 0)) {
            Ok((_rest, header)) => header,
            Err(_) => {
                close_if_idle(&mut state);
                offset += BLOCK_SIZE;
                continue;
            }
        };

        if !header.qualifies() {
            close_if_idle(&mut state);
            offset += BLOCK_SIZE;
            continue;
        }

        block_index.insert(
            offset,
            IndexedBlock {
                header: header.clone(),
                dummy: false,
            },
        );

        if !state.is_open() {
            open_chunk(&mut state, offset, &header);
        } else if header.record_type == state.record_type {
            extend_chunk(&mut state, &header, &mut chunks, offset);
        } else {
            close_chunk(&mut state, &mut chunks, CloseReason::ForeignRecordType, offset);
            open_chunk(&mut state, offset, &header);
        }

        offset += BLOCK_SIZE;
    }

    if state.is_open() {
        close_chunk(&mut state, &mut chunks, CloseReason::CleanTerminator, offset);
    }

    tracing::debug!(
        blocks = block_index.len(),
        chunks = chunks.len(),
        "finished carve sweep"
    );
    Ok((block_index, chunks))
}

fn close_if_idle(state: &mut ChunkState) {
    if state.is_open() && !state.chunk_continue {
        *state = ChunkState::idle();
    }
}

fn open_chunk(state: &mut ChunkState, offset: u64, header: &StoreBlockHeader) {
    state.open = true;
    state.head_offset = offset;
    state.record_type = header.record_type;
    state.next_seed = header.next_block_offset;
    state.head = Some(header.clone());
    state.chunk_continue = true;
}

/// A same-record-type block turns up at `offset`, the position the
/// sweep expects it at regardless of the chunk's own length so far.
/// The only question is whether it is the continuation this chunk's
/// last-seen block actually claimed (`state.next_seed == offset`): if
/// not, whatever claimed a different continuation was wrong about this
/// block, so the open chunk closes as a discontinuity and `offset`
/// starts a fresh one of its own.
fn extend_chunk(
    state: &mut ChunkState,
    header: &StoreBlockHeader,
    chunks: &mut Vec<StoreBlockChunk>,
    offset: u64,
) {
    if state.next_seed != offset {
        close_chunk(state, chunks, CloseReason::GapOrDiscontinuity, offset);
        open_chunk(state, offset, header);
        return;
    }

    state.next_seed = header.next_block_offset;
    if header.next_block_offset == 0 {
        close_chunk(state, chunks, CloseReason::CleanTerminator, offset);
    } else {
        state.chunk_continue = true;
    }
}

fn close_chunk(state: &mut ChunkState, chunks: &mut Vec<StoreBlockChunk>, reason: CloseReason, at_offset: u64) {
    if let Some(head) = state.head.take() {
        let record_type_name = StoreRecordType::from_u32(state.record_type)
            .map(|t| format!("{t:?}"))
            .unwrap_or_else(|| "unknown".to_string());
        tracing::debug!(
            head_offset = state.head_offset,
            closed_at = at_offset,
            record_type = %record_type_name,
            reason = ?reason,
            "closed chunk"
        );
        chunks.push(StoreBlockChunk {
            head_offset: state.head_offset,
            record_type: state.record_type,
            list_next_block_offset: vec![state.next_seed],
            head,
        });
    }
    let continue_open = matches!(reason, CloseReason::GapOrDiscontinuity);
    *state = ChunkState::idle();
    state.chunk_continue = continue_open;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn block(record_type: u32, current: u64, next: u64) -> StoreBlockHeader {
        StoreBlockHeader {
            vssid: vss_types::VSS_SIGNATURE,
            version: 1,
            record_type,
            relative_block_offset: current,
            current_block_offset: current,
            next_block_offset: next,
            size_info: 0,
            reserved: vec![0u8; 72],
        }
    }

    fn write_header(buf: &mut [u8], offset: usize, header: &StoreBlockHeader) {
        let bytes = header.to_bytes().unwrap();
        buf[offset..offset + bytes.len()].copy_from_slice(&bytes);
    }

    #[test]
    fn carves_a_single_clean_chunk() {
        let mut buf = vec![0u8; BLOCK_SIZE as usize];
        write_header(&mut buf, 0, &block(4, 0, 0));
        let mut image = Cursor::new(buf);
        let (index, chunks) = carve(&mut image, 0, BLOCK_SIZE).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].record_type, 4);
    }

    #[test]
    fn a_record_type_change_closes_the_prior_chunk() {
        let mut buf = vec![0u8; (BLOCK_SIZE * 2) as usize];
        write_header(&mut buf, 0, &block(4, 0, 0));
        write_header(&mut buf, BLOCK_SIZE as usize, &block(3, BLOCK_SIZE, 0));
        let mut image = Cursor::new(buf);
        let (_index, chunks) = carve(&mut image, 0, BLOCK_SIZE * 2).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].record_type, 4);
        assert_eq!(chunks[1].record_type, 3);
    }

    #[test]
    fn a_gap_in_next_block_offset_closes_the_chunk() {
        let mut buf = vec![0u8; (BLOCK_SIZE * 2) as usize];
        write_header(&mut buf, 0, &block(3, 0, 0x10000));
        write_header(&mut buf, BLOCK_SIZE as usize, &block(3, BLOCK_SIZE, 0));
        let mut image = Cursor::new(buf);
        let (_index, chunks) = carve(&mut image, 0, BLOCK_SIZE * 2).unwrap();
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn non_qualifying_blocks_do_not_appear_in_the_index() {
        let buf = vec![0u8; BLOCK_SIZE as usize];
        let mut image = Cursor::new(buf);
        let (index, chunks) = carve(&mut image, 0, BLOCK_SIZE).unwrap();
        assert!(index.is_empty());
        assert!(chunks.is_empty());
    }

    #[test]
    fn a_three_block_chain_of_the_same_role_stays_one_chunk() {
        let mut buf = vec![0u8; (BLOCK_SIZE * 3) as usize];
        write_header(&mut buf, 0, &block(3, 0, BLOCK_SIZE));
        write_header(&mut buf, BLOCK_SIZE as usize, &block(3, BLOCK_SIZE, BLOCK_SIZE * 2));
        write_header(&mut buf, (BLOCK_SIZE * 2) as usize, &block(3, BLOCK_SIZE * 2, 0));
        let mut image = Cursor::new(buf);
        let (_index, chunks) = carve(&mut image, 0, BLOCK_SIZE * 3).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].head_offset, 0);
    }

    #[test]
    fn a_chunk_whose_head_sits_at_offset_zero_is_still_closed_and_counted() {
        let mut buf = vec![0u8; BLOCK_SIZE as usize];
        write_header(&mut buf, 0, &block(5, 0, 0));
        let mut image = Cursor::new(buf);
        let (_index, chunks) = carve(&mut image, 0, BLOCK_SIZE).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].head_offset, 0);
    }
}
