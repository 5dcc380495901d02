//! Shared builders for synthetic VSS-bearing volumes, used by the
//! end-to-end scenario tests and the property tests. No real disk image
//! fixture is needed: every test assembles its volume as an in-memory
//! `Vec<u8>` driven through a `std::io::Cursor`.

use deku::prelude::*;
use vss_types::{
    CatalogBlockHeader, CatalogEntryEmpty, CatalogEntryType2, CatalogEntryType3, StoreBlockHeader,
    VolumeHeader, BLOCK_SIZE, VSS_SIGNATURE,
};

pub const VOLUME_HEADER_OFFSET: u64 = 0x1E00;

/// Grows `buf` as needed and copies `bytes` in at `offset`.
pub fn write_at(buf: &mut Vec<u8>, offset: u64, bytes: &[u8]) {
    let end = offset as usize + bytes.len();
    if buf.len() < end {
        buf.resize(end, 0);
    }
    buf[offset as usize..end].copy_from_slice(bytes);
}

/// Builds a volume buffer of exactly `volume_size` bytes with NTFS boot
/// fields and a VSS volume header in place. `bytes_per_sector` and
/// `total_sectors` are chosen so that `volume_size == bytes_per_sector *
/// total_sectors + 0x200`, matching the Volume Probe's derivation.
pub fn base_volume(volume_size: u64, catalog_offset: u64) -> Vec<u8> {
    let bytes_per_sector: u64 = 512;
    assert!(volume_size >= 0x200 && (volume_size - 0x200) % bytes_per_sector == 0);
    let total_sectors = (volume_size - 0x200) / bytes_per_sector;

    let mut buf = vec![0u8; volume_size as usize];
    buf[0x0B..0x0D].copy_from_slice(&(bytes_per_sector as u16).to_le_bytes());
    buf[0x28..0x30].copy_from_slice(&total_sectors.to_le_bytes());

    let header = VolumeHeader {
        vssid: VSS_SIGNATURE,
        version: 1,
        record_type: 1,
        current_offset: VOLUME_HEADER_OFFSET,
        unknown1: VOLUME_HEADER_OFFSET,
        unknown2: 0,
        catalog_offset,
        maximum_size: 0,
        volume_id: [0u8; 16],
        shadow_storage_id: [0u8; 16],
        unknown3: 0,
        reserved: vec![0u8; 412],
    };
    write_at(&mut buf, VOLUME_HEADER_OFFSET, &header.to_bytes().unwrap());
    buf
}

/// One raw, full-size (`BLOCK_SIZE`) store block with the given record
/// type and `next_block_offset`; `current`/`relative` are both set to
/// `current`, matching a freshly-carved (never-repaired) block.
pub fn store_block_bytes(record_type: u32, current: u64, next: u64) -> Vec<u8> {
    let header = StoreBlockHeader {
        vssid: VSS_SIGNATURE,
        version: 1,
        record_type,
        relative_block_offset: current,
        current_block_offset: current,
        next_block_offset: next,
        size_info: 0,
        reserved: vec![0u8; 72],
    };
    let mut bytes = header.to_bytes().unwrap();
    bytes.resize(BLOCK_SIZE as usize, 0);
    bytes
}

/// Writes a chain of `len` linked store blocks of `record_type` starting
/// at `start`, each `BLOCK_SIZE` apart and terminated with a zero
/// `next_block_offset`. Returns the head offset.
pub fn write_chain(buf: &mut Vec<u8>, start: u64, record_type: u32, len: u64) -> u64 {
    assert!(len >= 1);
    for i in 0..len {
        let current = start + i * BLOCK_SIZE;
        let next = if i + 1 == len { 0 } else { current + BLOCK_SIZE };
        write_at(buf, current, &store_block_bytes(record_type, current, next));
    }
    start
}

/// A 128-byte type-2 catalog entry.
pub fn catalog_entry_type2(guid: [u8; 16], sequence_number: u64, creation_time: u64, volume_size: u64) -> Vec<u8> {
    let mut entry = CatalogEntryType2::default();
    entry.store_guid = guid;
    entry.sequence_number = sequence_number;
    entry.shadow_copy_creation_time = creation_time;
    entry.volume_size = volume_size;
    entry.to_bytes().unwrap()
}

/// A 128-byte type-3 catalog entry locating a store's five sub-chains.
pub fn catalog_entry_type3(
    guid: [u8; 16],
    header_offset: u64,
    block_list_offset: u64,
    range_offset: u64,
    current_bitmap_offset: u64,
    previous_bitmap_offset: u64,
) -> Vec<u8> {
    let mut entry = CatalogEntryType3::default();
    entry.store_guid = guid;
    entry.store_header_offset = header_offset;
    entry.store_block_list_offset = block_list_offset;
    entry.store_block_range_offset = range_offset;
    entry.store_current_bitmap_offset = current_bitmap_offset;
    entry.store_previous_bitmap_offset = previous_bitmap_offset;
    entry.to_bytes().unwrap()
}

/// Writes one 16 KiB live catalog block at `at`, containing `entries`
/// (each already a 128-byte encoded slot) and padded with type-0 empty
/// entries, with the given `next_catalog_offset`.
pub fn write_catalog_block(buf: &mut Vec<u8>, at: u64, next_catalog_offset: u64, entries: &[Vec<u8>]) {
    let header = CatalogBlockHeader::new(at, at, next_catalog_offset);
    let mut block = header.to_bytes().unwrap();
    for entry in entries {
        block.extend_from_slice(entry);
    }
    let empty = CatalogEntryEmpty::default().to_bytes().unwrap();
    while block.len() < BLOCK_SIZE as usize {
        block.extend_from_slice(&empty);
    }
    block.truncate(BLOCK_SIZE as usize);
    write_at(buf, at, &block);
}
