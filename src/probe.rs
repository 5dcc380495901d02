//! Volume Probe: locates the live catalog and derives the volume size
//! from the NTFS boot fields, then validates the VSS volume header.

use std::io::{Read, Seek};

use deku::prelude::*;
use vss_types::{VolumeHeader, VOLUME_HEADER_OFFSET};

use crate::error::{Error, Result};
use crate::image::{read_at, read_u16_at, read_u64_at};

/// Result of a successful volume probe.
#[derive(Debug, Clone, Copy)]
pub struct VolumeInfo {
    /// Offset of the live catalog's first block, relative to the start
    /// of the volume. Zero means VSS is enabled but every snapshot has
    /// been deleted.
    pub catalog_offset: u64,
    /// Total volume size in bytes, derived from the NTFS boot sector.
    pub volume_size: u64,
}

/// Reads the NTFS bytes-per-sector and total-sectors fields, then the VSS
/// volume header at [`VOLUME_HEADER_OFFSET`]. `volume_offset` is the byte
/// offset of the start of the NTFS volume within the disk image.
pub fn probe_volume(image: &mut (impl Read + Seek), volume_offset: u64) -> Result<VolumeInfo> {
    let bytes_per_sector = read_u16_at(image, volume_offset + 0x0B)? as u64;
    let total_sectors = read_u64_at(image, volume_offset + 0x28)?;
    let volume_size = bytes_per_sector * total_sectors + 0x200;
    tracing::debug!(volume_size, "derived volume size from NTFS boot fields");

    let raw = read_at(image, volume_offset + VOLUME_HEADER_OFFSET, 512)?;
    let (_rest, header) = VolumeHeader::from_bytes((&raw, 0))
        .map_err(|_| Error::NotVss)?;

    tracing::debug!(vssid = ?header.vssid, "read candidate VSS volume header");
    if !header.has_vss_signature() {
        return Err(Error::NotVss);
    }

    Ok(VolumeInfo {
        catalog_offset: header.catalog_offset,
        volume_size,
    })
}
