//! On-disk record layouts for the VSS catalog and store.
//!
//! Field names and sizes follow the Volume Shadow Copy Service on-disk
//! format as reverse engineered by the forensics community (e.g.
//! libvshadow). Every record here is little-endian and packed to its
//! documented byte size; trailing "reserved"/"unknown" fields are present
//! only to keep struct sizes exact and are never interpreted.

#![forbid(unsafe_code)]

use deku::prelude::*;

/// Identifies a VSS volume header, catalog block, or store block.
pub const VSS_SIGNATURE: [u8; 16] = [
    0x6B, 0x87, 0x08, 0x38, 0x76, 0xC1, 0x48, 0x4E, 0xB7, 0xAE, 0x04, 0x04, 0x6E, 0x6C, 0xC7, 0x52,
];

/// Size of one store block (header + payload) and one catalog block.
pub const BLOCK_SIZE: u64 = 0x4000;

/// Size of one fixed-layout record (a store block header, a catalog
/// block header, or a catalog entry).
pub const RECORD_SIZE: u64 = 128;

/// Size of a store block's payload, i.e. everything after its header.
pub const STORE_PAYLOAD_SIZE: usize = (BLOCK_SIZE as usize) - (RECORD_SIZE as usize);

/// Byte offset of the VSS volume header from the start of the volume.
pub const VOLUME_HEADER_OFFSET: u64 = 0x1E00;

/// Windows FILETIME value of the Unix epoch (1970-01-01), in 100ns ticks
/// since 1601-01-01.
pub const FILETIME_UNIX_EPOCH: u64 = 116_444_736_000_000_000;

/// Store record types, carried in [`StoreBlockHeader::record_type`].
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreRecordType {
    StoreListRoot = 2,
    BlockList = 3,
    StoreHeader = 4,
    Range = 5,
    Bitmap = 6,
}

impl StoreRecordType {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            2 => Self::StoreListRoot,
            3 => Self::BlockList,
            4 => Self::StoreHeader,
            5 => Self::Range,
            6 => Self::Bitmap,
            _ => return None,
        })
    }
}

/// Catalog entry type tag, carried as the leading `u64` of every 128-byte
/// catalog entry slot.
#[repr(u64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogEntryKind {
    Empty = 0,
    Sentinel = 1,
    SnapshotDescriptor = 2,
    StoreDescriptor = 3,
}

impl CatalogEntryKind {
    pub fn from_u64(value: u64) -> Option<Self> {
        Some(match value {
            0 => Self::Empty,
            1 => Self::Sentinel,
            2 => Self::SnapshotDescriptor,
            3 => Self::StoreDescriptor,
            _ => return None,
        })
    }
}

/// Volume-level VSS header, read at [`VOLUME_HEADER_OFFSET`] from the
/// start of the NTFS volume. 512 bytes.
#[derive(Debug, Clone, DekuRead, DekuWrite)]
#[deku(endian = "little")]
pub struct VolumeHeader {
    pub vssid: [u8; 16],
    pub version: u32,
    pub record_type: u32,
    pub current_offset: u64,
    pub unknown1: u64,
    pub unknown2: u64,
    pub catalog_offset: u64,
    pub maximum_size: u64,
    pub volume_id: [u8; 16],
    pub shadow_storage_id: [u8; 16],
    pub unknown3: u32,
    #[deku(count = "412")]
    pub reserved: Vec<u8>,
}

impl VolumeHeader {
    pub fn has_vss_signature(&self) -> bool {
        self.vssid == VSS_SIGNATURE
    }
}

/// Header of one 16 KiB catalog block. 128 bytes.
#[derive(Debug, Clone, DekuRead, DekuWrite)]
#[deku(endian = "little")]
pub struct CatalogBlockHeader {
    pub vssid: [u8; 16],
    pub version: u32,
    pub record_type: u32,
    pub relative_catalog_offset: u64,
    pub current_catalog_offset: u64,
    pub next_catalog_offset: u64,
    #[deku(count = "80")]
    pub reserved: Vec<u8>,
}

impl CatalogBlockHeader {
    pub fn new(relative: u64, current: u64, next: u64) -> Self {
        Self {
            vssid: VSS_SIGNATURE,
            version: 1,
            record_type: 2,
            relative_catalog_offset: relative,
            current_catalog_offset: current,
            next_catalog_offset: next,
            reserved: vec![0u8; 80],
        }
    }
}

/// An empty (type 0) catalog entry slot. 128 bytes.
#[derive(Debug, Clone, DekuRead, DekuWrite)]
#[deku(endian = "little")]
pub struct CatalogEntryEmpty {
    pub catalog_entry_type: u64,
    #[deku(count = "120")]
    pub reserved: Vec<u8>,
}

impl Default for CatalogEntryEmpty {
    fn default() -> Self {
        Self {
            catalog_entry_type: 0,
            reserved: vec![0u8; 120],
        }
    }
}

/// A type-2 catalog entry: snapshot metadata. 128 bytes.
#[derive(Debug, Clone, DekuRead, DekuWrite)]
#[deku(endian = "little")]
pub struct CatalogEntryType2 {
    pub catalog_entry_type: u64,
    pub volume_size: u64,
    pub store_guid: [u8; 16],
    pub sequence_number: u64,
    pub flags: u64,
    pub shadow_copy_creation_time: u64,
    #[deku(count = "72")]
    pub reserved: Vec<u8>,
}

impl Default for CatalogEntryType2 {
    fn default() -> Self {
        Self {
            catalog_entry_type: 2,
            volume_size: 0,
            store_guid: [0u8; 16],
            sequence_number: 0,
            flags: 0x40,
            shadow_copy_creation_time: 0,
            reserved: vec![0u8; 72],
        }
    }
}

/// A type-3 catalog entry: locates a store's five sub-chains in the
/// store file. 128 bytes.
#[derive(Debug, Clone, DekuRead, DekuWrite)]
#[deku(endian = "little")]
pub struct CatalogEntryType3 {
    pub catalog_entry_type: u64,
    pub store_block_list_offset: u64,
    pub store_guid: [u8; 16],
    pub store_header_offset: u64,
    pub store_block_range_offset: u64,
    pub store_current_bitmap_offset: u64,
    pub ntfs_file_reference: u64,
    pub allocated_size: u64,
    pub store_previous_bitmap_offset: u64,
    pub unknown: u64,
    #[deku(count = "40")]
    pub reserved: Vec<u8>,
}

impl Default for CatalogEntryType3 {
    fn default() -> Self {
        Self {
            catalog_entry_type: 3,
            store_block_list_offset: 0,
            store_guid: [0u8; 16],
            store_header_offset: 0,
            store_block_range_offset: 0,
            store_current_bitmap_offset: 0,
            ntfs_file_reference: 0,
            allocated_size: 0,
            store_previous_bitmap_offset: 0,
            unknown: 0,
            reserved: vec![0u8; 40],
        }
    }
}

/// Header of one 16 KiB store block. 128 bytes; the remaining
/// [`STORE_PAYLOAD_SIZE`] bytes of the block are opaque payload.
#[derive(Debug, Clone, DekuRead, DekuWrite)]
#[deku(endian = "little")]
pub struct StoreBlockHeader {
    pub vssid: [u8; 16],
    pub version: u32,
    pub record_type: u32,
    pub relative_block_offset: u64,
    pub current_block_offset: u64,
    pub next_block_offset: u64,
    pub size_info: u64,
    #[deku(count = "72")]
    pub reserved: Vec<u8>,
}

impl StoreBlockHeader {
    /// True when this header carries the VSS signature, version 1, and a
    /// recognised store record type — i.e. it qualifies for the block
    /// index during a carve sweep.
    pub fn qualifies(&self) -> bool {
        self.vssid == VSS_SIGNATURE
            && self.version == 1
            && StoreRecordType::from_u32(self.record_type).is_some()
    }

    /// Builds a fabricated placeholder header for a dummy block-list
    /// entry used to bridge a broken chain.
    pub fn dummy(current_block_offset: u64, next_block_offset: u64) -> Self {
        Self {
            vssid: VSS_SIGNATURE,
            version: 1,
            record_type: StoreRecordType::BlockList as u32,
            relative_block_offset: current_block_offset,
            current_block_offset,
            next_block_offset,
            size_info: 0,
            reserved: vec![0u8; 72],
        }
    }
}
