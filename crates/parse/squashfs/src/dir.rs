//! Directory listings.
//!
//! A listing is a run of headers, each followed by up to 256 entries that
//! share one inode metadata block and a base inode number.

use std::borrow::Cow;
use std::io::{Read, Seek};

use crate::error::FsError;
use crate::inode::{InodeRef, InodeType};
use crate::metadata::MetadataCursor;

/// Maximum number of entries under one listing header.
pub const MAX_ENTRIES_PER_HEADER: u32 = 256;

/// Size recorded by a directory with no entries.
pub const EMPTY_LISTING_SIZE: u32 = 3;

/// Size of a listing header on disk.
const HEADER_SIZE: u64 = 12;

/// Size of an entry on disk, excluding the name.
const ENTRY_SIZE: u64 = 8;

/// A single directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Raw entry name.
    pub name: Vec<u8>,
    /// Reference to the entry's inode.
    pub inode: InodeRef,
    /// Inode number of the entry.
    pub inode_number: u32,
    /// Type recorded in the listing. Always the basic type number.
    pub entry_type: u16,
}

impl DirEntry {
    /// The entry name, with invalid UTF-8 replaced.
    #[must_use]
    pub fn name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    /// Broad type recorded in the listing, if it is a known type.
    #[must_use]
    pub fn kind(&self) -> Option<InodeType> {
        InodeType::from_raw(self.entry_type)
    }
}

/// Reads a listing whose inode records `size` (listing length plus 3).
pub(crate) fn read_listing<R: Read + Seek>(
    c: &mut MetadataCursor<'_, R>,
    size: u32,
) -> Result<Vec<DirEntry>, FsError> {
    let len = u64::from(
        size.checked_sub(EMPTY_LISTING_SIZE)
            .ok_or(FsError::Corrupt("directory size below minimum"))?,
    );

    let mut entries = Vec::new();
    let mut consumed = 0u64;
    while consumed < len {
        if len - consumed < HEADER_SIZE {
            return Err(FsError::Corrupt("truncated directory header"));
        }
        let count = c.u32()?.saturating_add(1);
        let start = c.u32()?;
        let base = c.u32()?;
        consumed += HEADER_SIZE;
        if count > MAX_ENTRIES_PER_HEADER {
            return Err(FsError::Corrupt("too many entries in directory run"));
        }

        for _ in 0..count {
            if len - consumed < ENTRY_SIZE {
                return Err(FsError::Corrupt("truncated directory entry"));
            }
            let offset = c.u16()?;
            let delta = c.i16()?;
            let entry_type = c.u16()?;
            let name_len = c.u16()?;
            let name_len = u64::from(name_len) + 1;
            consumed += ENTRY_SIZE;
            if len - consumed < name_len {
                return Err(FsError::Corrupt("directory name runs past the listing"));
            }
            let name = c.read_vec(name_len as usize)?;
            consumed += name_len;

            entries.push(DirEntry {
                name,
                inode: InodeRef::new(start, offset),
                inode_number: base.wrapping_add_signed(i32::from(delta)),
                entry_type,
            });
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::compress::Decompressor;
    use crate::reader::{ImageReader, METADATA_UNCOMPRESSED};

    fn entry(buf: &mut Vec<u8>, offset: u16, delta: i16, ty: u16, name: &[u8]) {
        buf.extend_from_slice(&offset.to_le_bytes());
        buf.extend_from_slice(&delta.to_le_bytes());
        buf.extend_from_slice(&ty.to_le_bytes());
        buf.extend_from_slice(&(name.len() as u16 - 1).to_le_bytes());
        buf.extend_from_slice(name);
    }

    fn listing() -> Vec<u8> {
        let mut l = Vec::new();
        // count - 1, start block, base inode number
        l.extend_from_slice(&1u32.to_le_bytes());
        l.extend_from_slice(&0x40u32.to_le_bytes());
        l.extend_from_slice(&10u32.to_le_bytes());
        entry(&mut l, 0x20, 0, 3, b".DirIcon");
        entry(&mut l, 0x60, -2, 2, b"icon.png");
        l
    }

    fn parse(listing: &[u8], size: u32) -> Result<Vec<DirEntry>, FsError> {
        let header = METADATA_UNCOMPRESSED | listing.len() as u16;
        let mut data = header.to_le_bytes().to_vec();
        data.extend_from_slice(listing);
        let len = data.len() as u64;
        let mut r = ImageReader::new(Cursor::new(data), 0, len, Decompressor::Gzip);
        let mut c = MetadataCursor::new(&mut r, 0, 0)?;
        read_listing(&mut c, size)
    }

    #[test]
    fn parse_two_entries() {
        let l = listing();
        let entries = parse(&l, l.len() as u32 + 3).expect("listing");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, b".DirIcon");
        assert_eq!(entries[0].kind(), Some(InodeType::Symlink));
        assert_eq!(entries[0].inode, InodeRef::new(0x40, 0x20));
        assert_eq!(entries[0].inode_number, 10);
        assert_eq!(entries[1].name_lossy(), "icon.png");
        assert_eq!(entries[1].inode_number, 8);
    }

    #[test]
    fn empty_directory() {
        assert!(parse(b"x", 3).expect("listing").is_empty());
    }

    #[test]
    fn size_below_three_is_corrupt() {
        assert!(matches!(parse(b"x", 2), Err(FsError::Corrupt(_))));
    }

    #[test]
    fn truncated_listing_is_corrupt() {
        let l = listing();
        assert!(matches!(
            parse(&l, l.len() as u32 + 3 - 4),
            Err(FsError::Corrupt(_))
        ));
    }

    #[test]
    fn oversized_header_count_is_corrupt() {
        let mut l = listing();
        l[0..4].copy_from_slice(&300u32.to_le_bytes());
        assert!(matches!(
            parse(&l, l.len() as u32 + 3),
            Err(FsError::Corrupt(_))
        ));
    }
}
