//! Inode table entries.
//!
//! Every inode starts with a common 16-byte header followed by a
//! type-specific body. Both the basic and extended forms of directories,
//! regular files and symlinks are decoded; device, FIFO and socket inodes
//! are recognised but carry no body here.

use std::io::{Read, Seek};

use crate::error::FsError;
use crate::metadata::MetadataCursor;

/// Fragment index meaning "this file has no tail fragment".
pub const NO_FRAGMENT: u32 = u32::MAX;

/// Longest symlink target accepted, matching `PATH_MAX`.
pub const MAX_SYMLINK_TARGET: u32 = 4096;

/// On-disk inode type numbers.
pub mod types {
    /// Basic directory.
    pub const DIR: u16 = 1;
    /// Basic regular file.
    pub const FILE: u16 = 2;
    /// Basic symlink.
    pub const SYMLINK: u16 = 3;
    /// Basic block device.
    pub const BLOCK_DEV: u16 = 4;
    /// Basic character device.
    pub const CHAR_DEV: u16 = 5;
    /// Basic FIFO.
    pub const FIFO: u16 = 6;
    /// Basic socket.
    pub const SOCKET: u16 = 7;
    /// Extended directory.
    pub const EXT_DIR: u16 = 8;
    /// Extended regular file.
    pub const EXT_FILE: u16 = 9;
    /// Extended symlink.
    pub const EXT_SYMLINK: u16 = 10;
    /// Extended socket, the highest defined type.
    pub const EXT_SOCKET: u16 = 14;

    /// Offset between a basic type and its extended counterpart.
    pub const EXTENDED_DELTA: u16 = 7;
}

/// Reference to an inode: metadata block position (relative to the inode
/// table) in the upper 48 bits, byte offset within that block in the lower
/// 16.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InodeRef(pub u64);

impl InodeRef {
    /// Builds a reference from its two halves.
    #[must_use]
    pub fn new(block: u32, offset: u16) -> Self {
        Self((u64::from(block) << 16) | u64::from(offset))
    }

    /// Position of the containing metadata block, relative to the inode table.
    #[must_use]
    pub fn block(self) -> u64 {
        self.0 >> 16
    }

    /// Byte offset within the decompressed block.
    #[must_use]
    pub fn offset(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }
}

/// Broad classification of an inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeType {
    /// Directory.
    Directory,
    /// Regular file.
    File,
    /// Symbolic link.
    Symlink,
    /// Device, FIFO or socket.
    Other,
}

impl InodeType {
    /// Classifies an on-disk type number (basic or extended).
    #[must_use]
    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            types::DIR | types::EXT_DIR => Some(Self::Directory),
            types::FILE | types::EXT_FILE => Some(Self::File),
            types::SYMLINK | types::EXT_SYMLINK => Some(Self::Symlink),
            types::BLOCK_DEV..=types::SOCKET | 11..=types::EXT_SOCKET => Some(Self::Other),
            _ => None,
        }
    }
}

/// Location of a directory's listing in the directory table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirInode {
    /// Metadata block position, relative to the directory table.
    pub start_block: u32,
    /// Offset of the listing within that block.
    pub offset: u16,
    /// Listing size plus 3, as stored on disk.
    pub size: u32,
    /// Inode number of the parent directory.
    pub parent: u32,
}

/// Data layout of a regular file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInode {
    /// Image position of the first data block.
    pub blocks_start: u64,
    /// File size in bytes.
    pub size: u64,
    /// Fragment table index, or [`NO_FRAGMENT`].
    pub fragment: u32,
    /// Offset of the tail within the fragment block.
    pub fragment_offset: u32,
    /// Size words of the data blocks. Left empty for files over the
    /// configured size limit.
    pub block_sizes: Vec<u32>,
}

impl FileInode {
    /// Returns `true` if the file's tail is stored in a fragment.
    #[must_use]
    pub fn has_fragment(&self) -> bool {
        self.fragment != NO_FRAGMENT
    }
}

/// Type-specific part of an inode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InodeKind {
    /// Directory.
    Directory(DirInode),
    /// Regular file.
    File(FileInode),
    /// Symlink and its raw target.
    Symlink(Vec<u8>),
    /// Device, FIFO or socket with its on-disk type number.
    Other(u16),
}

/// A decoded inode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    /// Inode number (1-based).
    pub number: u32,
    /// Permission bits.
    pub mode: u16,
    /// Index into the ID table for the owner.
    pub uid_idx: u16,
    /// Index into the ID table for the group.
    pub gid_idx: u16,
    /// Modification time.
    pub mtime: u32,
    /// Type-specific body.
    pub kind: InodeKind,
}

impl Inode {
    /// Broad type of this inode.
    #[must_use]
    pub fn inode_type(&self) -> InodeType {
        match self.kind {
            InodeKind::Directory(_) => InodeType::Directory,
            InodeKind::File(_) => InodeType::File,
            InodeKind::Symlink(_) => InodeType::Symlink,
            InodeKind::Other(_) => InodeType::Other,
        }
    }

    /// Directory body, if this is a directory.
    #[must_use]
    pub fn as_dir(&self) -> Option<&DirInode> {
        match &self.kind {
            InodeKind::Directory(d) => Some(d),
            _ => None,
        }
    }

    /// File body, if this is a regular file.
    #[must_use]
    pub fn as_file(&self) -> Option<&FileInode> {
        match &self.kind {
            InodeKind::File(f) => Some(f),
            _ => None,
        }
    }

    /// Symlink target, if this is a symlink.
    #[must_use]
    pub fn symlink_target(&self) -> Option<&[u8]> {
        match &self.kind {
            InodeKind::Symlink(t) => Some(t),
            _ => None,
        }
    }
}

/// Parameters needed to decode an inode body.
#[derive(Debug, Clone, Copy)]
pub(crate) struct InodeContext {
    pub(crate) block_size: u32,
    /// Upper bound on the number of block size words a file may list,
    /// derived from the size of the inode table.
    pub(crate) max_blocks: u64,
    /// Files larger than this are never read, so their block list is
    /// not loaded.
    pub(crate) max_file_size: u64,
}

impl Inode {
    /// Decodes an inode at the cursor position.
    pub(crate) fn read<R: Read + Seek>(
        c: &mut MetadataCursor<'_, R>,
        ctx: InodeContext,
    ) -> Result<Self, FsError> {
        let raw_type = c.u16()?;
        let mode = c.u16()?;
        let uid_idx = c.u16()?;
        let gid_idx = c.u16()?;
        let mtime = c.u32()?;
        let number = c.u32()?;

        let kind = match raw_type {
            types::DIR => {
                let start_block = c.u32()?;
                let _nlink = c.u32()?;
                let size = u32::from(c.u16()?);
                let offset = c.u16()?;
                let parent = c.u32()?;
                InodeKind::Directory(DirInode {
                    start_block,
                    offset,
                    size,
                    parent,
                })
            }
            types::EXT_DIR => {
                let _nlink = c.u32()?;
                let size = c.u32()?;
                let start_block = c.u32()?;
                let parent = c.u32()?;
                let _index_count = c.u16()?;
                let offset = c.u16()?;
                let _xattr = c.u32()?;
                InodeKind::Directory(DirInode {
                    start_block,
                    offset,
                    size,
                    parent,
                })
            }
            types::FILE => {
                let blocks_start = u64::from(c.u32()?);
                let fragment = c.u32()?;
                let fragment_offset = c.u32()?;
                let size = u64::from(c.u32()?);
                read_file_body(c, ctx, blocks_start, size, fragment, fragment_offset)?
            }
            types::EXT_FILE => {
                let blocks_start = c.u64()?;
                let size = c.u64()?;
                let _sparse = c.u64()?;
                let _nlink = c.u32()?;
                let fragment = c.u32()?;
                let fragment_offset = c.u32()?;
                let _xattr = c.u32()?;
                read_file_body(c, ctx, blocks_start, size, fragment, fragment_offset)?
            }
            types::SYMLINK | types::EXT_SYMLINK => {
                let _nlink = c.u32()?;
                let len = c.u32()?;
                if len > MAX_SYMLINK_TARGET {
                    return Err(FsError::Corrupt("symlink target too long"));
                }
                InodeKind::Symlink(c.read_vec(len as usize)?)
            }
            other if InodeType::from_raw(other) == Some(InodeType::Other) => {
                InodeKind::Other(other)
            }
            _ => return Err(FsError::Corrupt("unknown inode type")),
        };

        Ok(Self {
            number,
            mode,
            uid_idx,
            gid_idx,
            mtime,
            kind,
        })
    }
}

fn read_file_body<R: Read + Seek>(
    c: &mut MetadataCursor<'_, R>,
    ctx: InodeContext,
    blocks_start: u64,
    size: u64,
    fragment: u32,
    fragment_offset: u32,
) -> Result<InodeKind, FsError> {
    let bs = u64::from(ctx.block_size);
    let count = if fragment == NO_FRAGMENT {
        size.div_ceil(bs)
    } else {
        size / bs
    };
    if count > ctx.max_blocks {
        return Err(FsError::Corrupt("block list larger than the inode table"));
    }

    let mut block_sizes = Vec::new();
    if size <= ctx.max_file_size {
        for _ in 0..count {
            block_sizes.push(c.u32()?);
        }
    }
    Ok(InodeKind::File(FileInode {
        blocks_start,
        size,
        fragment,
        fragment_offset,
        block_sizes,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inode_ref_halves() {
        let r = InodeRef::new(0x1234, 0x56);
        assert_eq!(r.0, 0x1234_0056);
        assert_eq!(r.block(), 0x1234);
        assert_eq!(r.offset(), 0x56);
    }

    #[test]
    fn classify_raw_types() {
        assert_eq!(InodeType::from_raw(1), Some(InodeType::Directory));
        assert_eq!(InodeType::from_raw(8), Some(InodeType::Directory));
        assert_eq!(InodeType::from_raw(9), Some(InodeType::File));
        assert_eq!(InodeType::from_raw(10), Some(InodeType::Symlink));
        assert_eq!(InodeType::from_raw(6), Some(InodeType::Other));
        assert_eq!(InodeType::from_raw(14), Some(InodeType::Other));
        assert_eq!(InodeType::from_raw(0), None);
        assert_eq!(InodeType::from_raw(15), None);
        assert_eq!(types::FILE + types::EXTENDED_DELTA, types::EXT_FILE);
    }

    #[test]
    fn accessors_match_kind() {
        let inode = Inode {
            number: 2,
            mode: 0o777,
            uid_idx: 0,
            gid_idx: 0,
            mtime: 0,
            kind: InodeKind::Symlink(b"icon.png".to_vec()),
        };
        assert_eq!(inode.inode_type(), InodeType::Symlink);
        assert_eq!(inode.symlink_target(), Some(&b"icon.png"[..]));
        assert!(inode.as_dir().is_none());
        assert!(inode.as_file().is_none());
    }
}
