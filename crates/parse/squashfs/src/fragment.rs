//! Fragment table lookup.
//!
//! The tails of files smaller than a block are packed together into
//! fragment blocks. The fragment table is an array of 16-byte entries in
//! metadata blocks, indexed by a list of `u64` block positions that sits at
//! `fragment_table_start`.

use std::io::{Read, Seek};

use crate::error::FsError;
use crate::metadata::{METADATA_BLOCK_SIZE, MetadataCursor};
use crate::reader::ImageReader;
use crate::superblock::{NO_TABLE, Superblock};

/// Size of one fragment table entry on disk.
pub const FRAGMENT_ENTRY_SIZE: usize = 16;

/// Fragment entries per metadata block.
pub const ENTRIES_PER_BLOCK: u32 = (METADATA_BLOCK_SIZE / FRAGMENT_ENTRY_SIZE) as u32;

/// Location of a fragment block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentEntry {
    /// Image position of the fragment block.
    pub start: u64,
    /// Data block size word (bit 24 set if stored uncompressed).
    pub size: u32,
}

/// Reads entry `index` of the fragment table.
pub(crate) fn lookup<R: Read + Seek>(
    reader: &mut ImageReader<R>,
    sb: &Superblock,
    index: u32,
) -> Result<FragmentEntry, FsError> {
    if sb.fragment_table_start == NO_TABLE || index >= sb.fragment_count {
        return Err(FsError::Corrupt("fragment index out of range"));
    }

    let slot = u64::from(index / ENTRIES_PER_BLOCK);
    let pos = sb
        .fragment_table_start
        .checked_add(slot * 8)
        .ok_or(FsError::Corrupt("fragment table position overflows"))?;
    let block = reader.read_u64_at(pos)?;
    let within = (index % ENTRIES_PER_BLOCK) as usize * FRAGMENT_ENTRY_SIZE;

    let mut c = MetadataCursor::new(reader, block, within)?;
    let start = c.u64()?;
    let size = c.u32()?;
    let _unused = c.u32()?;
    Ok(FragmentEntry { start, size })
}
