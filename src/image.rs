//! Positioned reads over a seekable byte source.
//!
//! Every stage of the pipeline shares one image handle and must seek
//! explicitly before each read (see the concurrency & resource model):
//! there is no assumption that the cursor is left anywhere in particular
//! between calls.

use std::io::{Read, Seek, SeekFrom};

use crate::error::Result;

/// Reads `len` bytes starting at `offset`, leaving the stream positioned
/// just after them.
pub fn read_at(image: &mut (impl Read + Seek), offset: u64, len: usize) -> Result<Vec<u8>> {
    image.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len];
    image.read_exact(&mut buf)?;
    Ok(buf)
}

/// Reads a fixed-size buffer starting at `offset`.
pub fn read_array_at<const N: usize>(
    image: &mut (impl Read + Seek),
    offset: u64,
) -> Result<[u8; N]> {
    image.seek(SeekFrom::Start(offset))?;
    let mut buf = [0u8; N];
    image.read_exact(&mut buf)?;
    Ok(buf)
}

/// Reads a little-endian `u16` at `offset`.
pub fn read_u16_at(image: &mut (impl Read + Seek), offset: u64) -> Result<u16> {
    Ok(u16::from_le_bytes(read_array_at(image, offset)?))
}

/// Reads a little-endian `u64` at `offset`.
pub fn read_u64_at(image: &mut (impl Read + Seek), offset: u64) -> Result<u64> {
    Ok(u64::from_le_bytes(read_array_at(image, offset)?))
}
