//! Emitter: writes the store file and the catalog file with every
//! self-referential offset rewritten relative to the output files.

pub mod catalog;
pub mod store;

use std::io::{Read, Seek, Write};

use crate::carver::BlockIndex;
use crate::catalog_reader::LiveCatalog;
use crate::error::Result;
use crate::grouper::SnapshotSet;

/// Runs both emitter phases: the store file first (producing rewritten
/// live descriptors and freshly-minted carved descriptors), then the
/// catalog file built from those descriptors.
pub fn emit(
    image: &mut (impl Read + Seek),
    volume_offset: u64,
    block_index: &BlockIndex,
    live: LiveCatalog,
    carved: Vec<SnapshotSet>,
    volume_size: u64,
    store_out: &mut impl Write,
    catalog_out: &mut impl Write,
) -> Result<()> {
    let outcome = store::write_store(image, volume_offset, block_index, live, carved, store_out)?;
    catalog::write_catalog(outcome.live, outcome.carved, volume_size, catalog_out)?;
    Ok(())
}
