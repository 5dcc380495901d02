//! Emitter, store-file phase: writes a single monotonically growing
//! store file in a live pass followed by a carved pass, rewriting every
//! block's offsets relative to the output file as it goes.

use std::io::{Read, Seek, Write};

use deku::prelude::*;
use vss_types::{CatalogEntryType2, CatalogEntryType3, StoreBlockHeader, BLOCK_SIZE, RECORD_SIZE, STORE_PAYLOAD_SIZE};

use crate::carver::{BlockIndex, StoreBlockChunk};
use crate::catalog_reader::LiveCatalog;
use crate::error::Result;
use crate::grouper::SnapshotSet;
use crate::image::read_at;

/// One live entry carried through to the catalog phase: its original
/// `store_guid`, its (possibly absent) type-2 descriptor, and its
/// type-3 descriptor with offsets rewritten to the output store file.
pub struct LiveOutputEntry {
    pub store_guid: [u8; 16],
    pub type2: Option<CatalogEntryType2>,
    pub type3: CatalogEntryType3,
}

/// One freshly carved entry: only a type-3 descriptor exists until the
/// catalog phase mints a paired type-2.
pub struct CarvedOutputEntry {
    pub type3: CatalogEntryType3,
}

pub struct StoreOutcome {
    pub live: Vec<LiveOutputEntry>,
    pub carved: Vec<CarvedOutputEntry>,
}

/// The repeating 32-byte unallocated sentinel record used to fill a
/// fabricated dummy block-list block's payload.
const UNALLOCATED_SENTINEL: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

pub fn write_store(
    image: &mut (impl Read + Seek),
    volume_offset: u64,
    block_index: &BlockIndex,
    live: LiveCatalog,
    carved: Vec<SnapshotSet>,
    out: &mut impl Write,
) -> Result<StoreOutcome> {
    let mut output_offset = 0u64;
    let mut live_out = Vec::new();

    for (store_guid, pair) in live {
        let Some(mut type3) = pair.type3 else { continue };
        let original = type3.clone();

        type3.store_header_offset = emit_chain(
            image,
            volume_offset,
            block_index,
            original.store_header_offset,
            out,
            &mut output_offset,
        )?;
        type3.store_block_list_offset = emit_chain(
            image,
            volume_offset,
            block_index,
            original.store_block_list_offset,
            out,
            &mut output_offset,
        )?;
        type3.store_block_range_offset = emit_chain(
            image,
            volume_offset,
            block_index,
            original.store_block_range_offset,
            out,
            &mut output_offset,
        )?;
        type3.store_current_bitmap_offset = emit_chain(
            image,
            volume_offset,
            block_index,
            original.store_current_bitmap_offset,
            out,
            &mut output_offset,
        )?;
        type3.store_previous_bitmap_offset = if original.store_previous_bitmap_offset != 0 {
            emit_chain(
                image,
                volume_offset,
                block_index,
                original.store_previous_bitmap_offset,
                out,
                &mut output_offset,
            )?
        } else {
            0
        };

        tracing::debug!(?store_guid, "re-emitted live store entry");
        live_out.push(LiveOutputEntry {
            store_guid,
            type2: pair.type2,
            type3,
        });
    }

    let mut carved_out = Vec::new();
    for set in carved {
        let mut type3 = CatalogEntryType3::default();

        type3.store_header_offset =
            emit_carved_chunk(image, volume_offset, block_index, &set.header, out, &mut output_offset)?;
        type3.store_block_list_offset =
            emit_carved_chunk(image, volume_offset, block_index, &set.block_list, out, &mut output_offset)?;
        type3.store_block_range_offset =
            emit_carved_chunk(image, volume_offset, block_index, &set.range, out, &mut output_offset)?;
        type3.store_current_bitmap_offset = emit_carved_chunk(
            image,
            volume_offset,
            block_index,
            &set.current_bitmap,
            out,
            &mut output_offset,
        )?;
        type3.store_previous_bitmap_offset = match &set.previous_bitmap {
            Some(chunk) if chunk.head.current_block_offset != 0 => {
                emit_carved_chunk(image, volume_offset, block_index, chunk, out, &mut output_offset)?
            }
            _ => 0,
        };

        tracing::debug!(head = set.header.head_offset, "re-emitted carved snapshot set");
        carved_out.push(CarvedOutputEntry { type3 });
    }

    Ok(StoreOutcome {
        live: live_out,
        carved: carved_out,
    })
}

/// Emits a sub-chain starting at a live entry's recorded offset, by
/// walking `next_block_offset` pointers directly out of the block
/// index (live chains are never repaired; they are assumed intact).
fn emit_chain(
    image: &mut (impl Read + Seek),
    volume_offset: u64,
    block_index: &BlockIndex,
    head_offset: u64,
    out: &mut impl Write,
    output_offset: &mut u64,
) -> Result<u64> {
    let mut offsets = vec![head_offset];
    let mut cursor = head_offset;
    while let Some(indexed) = block_index.get(&cursor) {
        let next = indexed.header.next_block_offset;
        if next == 0 || !block_index.contains_key(&next) {
            break;
        }
        offsets.push(next);
        cursor = next;
    }

    let head_output_offset = *output_offset;
    let count = offsets.len();
    for (i, src_offset) in offsets.into_iter().enumerate() {
        let raw = read_at(image, volume_offset + src_offset, BLOCK_SIZE as usize)?;
        write_rewritten_block(raw, i + 1 == count, out, output_offset)?;
    }

    tracing::debug!(
        source_head = head_offset,
        output_head = head_output_offset,
        count,
        "emitted live sub-chain"
    );
    Ok(head_output_offset)
}

/// Emits a carved chunk's full (already chain-repaired) successor list,
/// fabricating sentinel payloads in place of dummy blocks.
fn emit_carved_chunk(
    image: &mut (impl Read + Seek),
    volume_offset: u64,
    block_index: &BlockIndex,
    chunk: &StoreBlockChunk,
    out: &mut impl Write,
    output_offset: &mut u64,
) -> Result<u64> {
    let mut offsets = vec![chunk.head_offset];
    offsets.extend(chunk.list_next_block_offset.iter().copied());
    if offsets.last() == Some(&0) {
        offsets.pop();
    }

    let head_output_offset = *output_offset;
    let count = offsets.len();
    for (i, src_offset) in offsets.into_iter().enumerate() {
        let is_dummy = block_index.get(&src_offset).map(|b| b.dummy).unwrap_or(false);
        let raw = if is_dummy {
            fabricate_dummy_block(src_offset)
        } else {
            read_at(image, volume_offset + src_offset, BLOCK_SIZE as usize)?
        };
        write_rewritten_block(raw, i + 1 == count, out, output_offset)?;
    }

    tracing::debug!(
        source_head = chunk.head_offset,
        output_head = head_output_offset,
        count,
        "emitted carved sub-chain"
    );
    Ok(head_output_offset)
}

fn fabricate_dummy_block(offset: u64) -> Vec<u8> {
    let header = StoreBlockHeader::dummy(offset, 0);
    let mut buf = header.to_bytes().expect("fixed-layout header always encodes");
    buf.resize(BLOCK_SIZE as usize, 0);
    let payload = &mut buf[RECORD_SIZE as usize..];
    for sentinel in payload.chunks_exact_mut(32) {
        sentinel.copy_from_slice(&UNALLOCATED_SENTINEL);
    }
    buf
}

fn write_rewritten_block(
    mut raw: Vec<u8>,
    is_last: bool,
    out: &mut impl Write,
    output_offset: &mut u64,
) -> Result<()> {
    debug_assert_eq!(raw.len(), BLOCK_SIZE as usize);
    debug_assert_eq!(STORE_PAYLOAD_SIZE, BLOCK_SIZE as usize - RECORD_SIZE as usize);

    let (_rest, mut header) = StoreBlockHeader::from_bytes((&raw, 0)).expect("block was carved as qualifying");
    header.relative_block_offset = *output_offset;
    header.current_block_offset = *output_offset;
    header.next_block_offset = if is_last { 0 } else { *output_offset + BLOCK_SIZE };

    let new_header = header.to_bytes().expect("fixed-layout header always encodes");
    raw[..new_header.len()].copy_from_slice(&new_header);

    out.write_all(&raw)?;
    *output_offset += BLOCK_SIZE;
    Ok(())
}
