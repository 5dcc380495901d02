//! Catalog Reader: walks the on-disk live catalog linked list and pairs
//! up type-2/type-3 entries by `store_guid`.

use std::io::{Read, Seek};

use deku::prelude::*;
use indexmap::IndexMap;
use vss_types::{CatalogBlockHeader, CatalogEntryKind, CatalogEntryType2, CatalogEntryType3, BLOCK_SIZE, RECORD_SIZE};

use crate::error::{Error, Result};
use crate::image::{read_at, read_u64_at};

/// One (type-2, type-3) pairing, keyed by `store_guid` during the walk.
/// Either half may be absent momentarily while the walk is still
/// assembling a half-seen pair.
#[derive(Debug, Clone, Default)]
pub struct CatalogPair {
    pub type2: Option<CatalogEntryType2>,
    pub type3: Option<CatalogEntryType3>,
}

/// The live catalog, in first-seen order and keyed by `store_guid` for
/// the Deduplicator.
pub type LiveCatalog = IndexMap<[u8; 16], CatalogPair>;

/// Walks the catalog linked list starting at `catalog_offset` (relative
/// to `volume_offset`). `catalog_offset == 0` means VSS is enabled but
/// every snapshot has been deleted — returns an empty catalog.
pub fn read_catalog(
    image: &mut (impl Read + Seek),
    volume_offset: u64,
    catalog_offset: u64,
) -> Result<LiveCatalog> {
    let mut catalog = LiveCatalog::new();
    if catalog_offset == 0 {
        tracing::debug!("VSS enabled but catalog offset is zero; no live snapshots");
        return Ok(catalog);
    }

    let mut visited = std::collections::HashSet::new();
    let mut block_offset = catalog_offset;

    loop {
        if !visited.insert(block_offset) {
            return Err(Error::MalformedCatalog("catalog walk revisited a block offset"));
        }

        let raw_header = read_at(image, volume_offset + block_offset, RECORD_SIZE as usize)?;
        let (_rest, block_header) = CatalogBlockHeader::from_bytes((&raw_header, 0))
            .map_err(|_| Error::MalformedCatalog("unreadable catalog block header"))?;

        let mut slot_offset = volume_offset + block_offset + RECORD_SIZE;
        let slots = (BLOCK_SIZE - RECORD_SIZE) / RECORD_SIZE;
        for _ in 0..slots {
            let entry_type = read_u64_at(image, slot_offset)?;
            match CatalogEntryKind::from_u64(entry_type) {
                Some(CatalogEntryKind::SnapshotDescriptor) => {
                    let raw = read_at(image, slot_offset, RECORD_SIZE as usize)?;
                    let (_rest, entry) = CatalogEntryType2::from_bytes((&raw, 0))
                        .map_err(|_| Error::MalformedCatalog("unreadable type-2 catalog entry"))?;
                    let guid = entry.store_guid;
                    catalog.entry(guid).or_default().type2 = Some(entry);
                }
                Some(CatalogEntryKind::StoreDescriptor) => {
                    let raw = read_at(image, slot_offset, RECORD_SIZE as usize)?;
                    let (_rest, entry) = CatalogEntryType3::from_bytes((&raw, 0))
                        .map_err(|_| Error::MalformedCatalog("unreadable type-3 catalog entry"))?;
                    let guid = entry.store_guid;
                    catalog.entry(guid).or_default().type3 = Some(entry);
                }
                _ => {}
            }
            slot_offset += RECORD_SIZE;
        }

        if block_header.next_catalog_offset == 0 {
            break;
        }
        block_offset = block_header.next_catalog_offset;
    }

    tracing::debug!(pairs = catalog.len(), "finished live catalog walk");
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn write_block(buf: &mut Vec<u8>, offset: usize, bytes: &[u8]) {
        buf[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    #[test]
    fn empty_catalog_offset_yields_no_entries() {
        let mut image = Cursor::new(Vec::<u8>::new());
        let catalog = read_catalog(&mut image, 0, 0).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn reads_a_single_pair_from_one_block() {
        let mut buf = vec![0u8; BLOCK_SIZE as usize];
        let header = CatalogBlockHeader::new(0, 0, 0);
        write_block(&mut buf, 0, &header.to_bytes().unwrap());

        let guid = [7u8; 16];
        let mut entry2 = CatalogEntryType2::default();
        entry2.store_guid = guid;
        entry2.sequence_number = 42;
        write_block(&mut buf, 128, &entry2.to_bytes().unwrap());

        let mut entry3 = CatalogEntryType3::default();
        entry3.store_guid = guid;
        entry3.store_header_offset = 0x500000;
        write_block(&mut buf, 256, &entry3.to_bytes().unwrap());

        let mut image = Cursor::new(buf);
        let catalog = read_catalog(&mut image, 0, 0).unwrap();
        assert_eq!(catalog.len(), 1);
        let pair = catalog.get(&guid).unwrap();
        assert_eq!(pair.type2.as_ref().unwrap().sequence_number, 42);
        assert_eq!(pair.type3.as_ref().unwrap().store_header_offset, 0x500000);
    }

    #[test]
    fn a_lone_type3_is_recorded_without_fabricating_a_type2() {
        let mut buf = vec![0u8; BLOCK_SIZE as usize];
        let header = CatalogBlockHeader::new(0, 0, 0);
        write_block(&mut buf, 0, &header.to_bytes().unwrap());

        let guid = [9u8; 16];
        let mut entry3 = CatalogEntryType3::default();
        entry3.store_guid = guid;
        write_block(&mut buf, 128, &entry3.to_bytes().unwrap());

        let mut image = Cursor::new(buf);
        let catalog = read_catalog(&mut image, 0, 0).unwrap();
        let pair = catalog.get(&guid).unwrap();
        assert!(pair.type2.is_none());
        assert!(pair.type3.is_some());
    }

    #[test]
    fn walks_a_two_block_chain_to_its_natural_end() {
        let mut buf = vec![0u8; (BLOCK_SIZE * 2) as usize];
        let first = CatalogBlockHeader::new(0, 0, BLOCK_SIZE);
        write_block(&mut buf, 0, &first.to_bytes().unwrap());
        let second = CatalogBlockHeader::new(BLOCK_SIZE, BLOCK_SIZE, 0);
        write_block(&mut buf, BLOCK_SIZE as usize, &second.to_bytes().unwrap());

        let mut image = Cursor::new(buf);
        let catalog = read_catalog(&mut image, 0, 0).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn a_block_that_points_back_at_itself_is_rejected() {
        // Start the walk at a nonzero catalog_offset whose block's
        // next_catalog_offset points right back at it.
        let catalog_offset = BLOCK_SIZE;
        let mut buf = vec![0u8; (BLOCK_SIZE * 2) as usize];
        let looping = CatalogBlockHeader::new(catalog_offset, catalog_offset, catalog_offset);
        write_block(&mut buf, catalog_offset as usize, &looping.to_bytes().unwrap());

        let mut image = Cursor::new(buf);
        let err = read_catalog(&mut image, 0, catalog_offset).unwrap_err();
        assert!(matches!(err, Error::MalformedCatalog(_)));
    }
}
