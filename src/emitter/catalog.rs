//! Emitter, catalog-file phase: emits exactly four 16 KiB blocks
//! holding the merged live + carved catalog.

use std::io::Write;

use deku::prelude::*;
use uuid::Uuid;
use vss_types::{CatalogBlockHeader, CatalogEntryEmpty, CatalogEntryType2, CatalogEntryType3, BLOCK_SIZE, RECORD_SIZE};

use crate::emitter::store::{CarvedOutputEntry, LiveOutputEntry};
use crate::error::Result;
use crate::filetime;

const CATALOG_BLOCKS: u64 = 4;
const ENTRIES_PER_BLOCK: usize = ((BLOCK_SIZE - RECORD_SIZE) / RECORD_SIZE) as usize;

pub fn write_catalog(
    live: Vec<LiveOutputEntry>,
    carved: Vec<CarvedOutputEntry>,
    volume_size: u64,
    out: &mut impl Write,
) -> Result<()> {
    let (base_sequence, base_creation_time) = derive_carved_baseline(&live, carved.len() as u64);
    let minted = mint_carved_type2s(&carved, base_sequence, base_creation_time, volume_size);

    let mut entries: Vec<(CatalogEntryType2, CatalogEntryType3)> = Vec::new();
    for entry in live {
        if let Some(type2) = entry.type2 {
            entries.push((type2, entry.type3));
        }
    }
    for (type2, carved_entry) in minted.into_iter().zip(carved.into_iter()) {
        let mut type3 = carved_entry.type3;
        type3.store_guid = type2.store_guid;
        entries.push((type2, type3));
    }

    let mut entries = entries.into_iter();
    for block_idx in 0..CATALOG_BLOCKS {
        let block_offset = block_idx * BLOCK_SIZE;
        let next = if block_idx + 1 == CATALOG_BLOCKS { 0 } else { block_offset + BLOCK_SIZE };
        let header = CatalogBlockHeader::new(block_offset, block_offset, next);
        out.write_all(&header.to_bytes()?)?;

        let mut slots_written = 0usize;
        while slots_written + 2 <= ENTRIES_PER_BLOCK {
            let Some((type2, type3)) = entries.next() else { break };
            out.write_all(&type2.to_bytes()?)?;
            out.write_all(&type3.to_bytes()?)?;
            slots_written += 2;
        }

        let empty = CatalogEntryEmpty::default().to_bytes()?;
        for _ in slots_written..ENTRIES_PER_BLOCK {
            out.write_all(&empty)?;
        }
    }

    tracing::debug!("wrote four-block catalog file");
    Ok(())
}

fn derive_carved_baseline(live: &[LiveOutputEntry], carved_count: u64) -> (u64, u64) {
    if let Some(last) = live.iter().rev().find_map(|e| e.type2.as_ref()) {
        (last.sequence_number, last.shadow_copy_creation_time)
    } else {
        (carved_count, filetime::now())
    }
}

fn mint_carved_type2s(
    carved: &[CarvedOutputEntry],
    base_sequence: u64,
    base_creation_time: u64,
    volume_size: u64,
) -> Vec<CatalogEntryType2> {
    (0..carved.len() as u64)
        .map(|k| {
            let sequence_number = base_sequence.saturating_sub(k);
            let creation_time = filetime::minus_hours(base_creation_time, k);
            let mut type2 = CatalogEntryType2::default();
            type2.store_guid = *Uuid::new_v1(uuid::Timestamp::now(uuid_context()), &node_id()).as_bytes();
            type2.sequence_number = sequence_number;
            type2.shadow_copy_creation_time = creation_time;
            type2.volume_size = volume_size;
            type2
        })
        .collect()
}

fn uuid_context() -> uuid::Context {
    uuid::Context::new(0)
}

/// A v1 UUID's node identifier would normally come from a stable MAC
/// address; this tool runs against disk images, not live hardware, so
/// it draws six bytes from a freshly generated v4 UUID instead.
fn node_id() -> [u8; 6] {
    let random = Uuid::new_v4();
    let bytes = random.as_bytes();
    [bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5]]
}
