//! Top-level orchestration: drives the eight stages in order against a
//! single image handle and two output writers.

use std::io::{Read, Seek, Write};

use crate::carver;
use crate::catalog_reader;
use crate::dedup;
use crate::emitter;
use crate::error::Result;
use crate::grouper;
use crate::probe;
use crate::repairer;

/// Recovers deleted VSS snapshots from `image` and writes the
/// reconstructed catalog and store to `catalog_out`/`store_out`.
/// `volume_offset` is the byte offset of the NTFS volume within the
/// image (0 for a bare volume image).
pub fn recover(
    image: &mut (impl Read + Seek),
    volume_offset: u64,
    catalog_out: &mut impl Write,
    store_out: &mut impl Write,
) -> Result<()> {
    let info = probe::probe_volume(image, volume_offset)?;
    let live = catalog_reader::read_catalog(image, volume_offset, info.catalog_offset)?;

    let (mut block_index, chunks) = carver::carve(image, volume_offset, info.volume_size)?;
    let mut sets = grouper::group(chunks);
    repairer::repair(&mut sets, &mut block_index);
    let carved = dedup::deduplicate(sets, &live);

    tracing::debug!(
        live_entries = live.len(),
        carved_sets = carved.len(),
        "pipeline ready to emit"
    );

    emitter::emit(
        image,
        volume_offset,
        &block_index,
        live,
        carved,
        info.volume_size,
        store_out,
        catalog_out,
    )?;
    Ok(())
}
