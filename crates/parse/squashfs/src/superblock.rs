//! SquashFS superblock parsing.
//!
//! The superblock is the fixed 96-byte header at the start of the image.
//! Every table position it records is relative to the start of the image,
//! not to the start of the file the image is embedded in.

use core::fmt;

use crate::error::FsError;
use crate::inode::InodeRef;

/// SquashFS magic: `hsqs` read as a little-endian `u32`.
pub const SQUASHFS_MAGIC: u32 = 0x7371_7368;

/// Size of the on-disk superblock.
pub const SUPERBLOCK_SIZE: usize = 96;

/// Marker for an absent optional table.
pub const NO_TABLE: u64 = u64::MAX;

/// Smallest block size mksquashfs accepts (4 KiB).
const MIN_BLOCK_SIZE: u32 = 4096;

/// Largest block size mksquashfs accepts (1 MiB).
const MAX_BLOCK_SIZE: u32 = 1 << 20;

/// Superblock flag bits.
pub mod flags {
    /// Inodes are stored uncompressed.
    pub const UNCOMPRESSED_INODES: u16 = 0x0001;
    /// Data blocks are stored uncompressed.
    pub const UNCOMPRESSED_DATA: u16 = 0x0002;
    /// Fragments are stored uncompressed.
    pub const UNCOMPRESSED_FRAGMENTS: u16 = 0x0008;
    /// File tails are never packed into fragments.
    pub const NO_FRAGMENTS: u16 = 0x0010;
    /// Small files are always packed into fragments.
    pub const ALWAYS_FRAGMENTS: u16 = 0x0020;
    /// Duplicate files were detected and stored once.
    pub const DUPLICATES: u16 = 0x0040;
    /// The export (NFS) table is present.
    pub const EXPORTABLE: u16 = 0x0080;
    /// Extended attributes are stored uncompressed.
    pub const UNCOMPRESSED_XATTRS: u16 = 0x0100;
    /// No extended attributes are stored.
    pub const NO_XATTRS: u16 = 0x0200;
    /// A compressor options block follows the superblock.
    pub const COMPRESSOR_OPTIONS: u16 = 0x0400;
    /// The ID table is stored uncompressed.
    pub const UNCOMPRESSED_IDS: u16 = 0x0800;
}

/// Read a little-endian `u16` from `data` at byte offset `off`.
///
/// # Panics
///
/// Panics if `off + 2 > data.len()`. Callers must bounds-check first.
pub(crate) fn le_u16(data: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([data[off], data[off + 1]])
}

/// Read a little-endian `u32` from `data` at byte offset `off`.
pub(crate) fn le_u32(data: &[u8], off: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&data[off..off + 4]);
    u32::from_le_bytes(b)
}

/// Read a little-endian `u64` from `data` at byte offset `off`.
pub(crate) fn le_u64(data: &[u8], off: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&data[off..off + 8]);
    u64::from_le_bytes(b)
}

/// Compression algorithm recorded in the superblock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// zlib-wrapped deflate (id 1).
    Gzip,
    /// Legacy LZMA (id 2).
    Lzma,
    /// LZO (id 3).
    Lzo,
    /// XZ (id 4).
    Xz,
    /// LZ4 block format (id 5).
    Lz4,
    /// Zstandard (id 6).
    Zstd,
    /// Any other id.
    Unknown(u16),
}

impl Compression {
    /// Maps an on-disk compression id.
    #[must_use]
    pub fn from_id(id: u16) -> Self {
        match id {
            1 => Self::Gzip,
            2 => Self::Lzma,
            3 => Self::Lzo,
            4 => Self::Xz,
            5 => Self::Lz4,
            6 => Self::Zstd,
            other => Self::Unknown(other),
        }
    }

    /// The on-disk compression id.
    #[must_use]
    pub fn id(self) -> u16 {
        match self {
            Self::Gzip => 1,
            Self::Lzma => 2,
            Self::Lzo => 3,
            Self::Xz => 4,
            Self::Lz4 => 5,
            Self::Zstd => 6,
            Self::Unknown(id) => id,
        }
    }

    /// Returns `true` if this crate can decompress blocks of this kind.
    #[must_use]
    pub fn is_supported(self) -> bool {
        matches!(
            self,
            Self::Gzip | Self::Lzma | Self::Xz | Self::Lz4 | Self::Zstd
        )
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gzip => write!(f, "gzip"),
            Self::Lzma => write!(f, "lzma"),
            Self::Lzo => write!(f, "lzo"),
            Self::Xz => write!(f, "xz"),
            Self::Lz4 => write!(f, "lz4"),
            Self::Zstd => write!(f, "zstd"),
            Self::Unknown(id) => write!(f, "unknown ({id})"),
        }
    }
}

/// Parsed SquashFS 4.0 superblock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
    /// Number of inodes in the image.
    pub inode_count: u32,
    /// Last modification time (seconds since the epoch).
    pub mod_time: u32,
    /// Size of a data block in bytes.
    pub block_size: u32,
    /// Number of entries in the fragment table.
    pub fragment_count: u32,
    /// Compressor used for data and metadata.
    pub compression: Compression,
    /// `log2(block_size)`.
    pub block_log: u16,
    /// Flag bits, see [`flags`].
    pub flags: u16,
    /// Number of entries in the ID table.
    pub id_count: u16,
    /// Major format version (always 4).
    pub version_major: u16,
    /// Minor format version (always 0).
    pub version_minor: u16,
    /// Reference to the root directory inode.
    pub root_inode: InodeRef,
    /// Bytes used by the image, excluding trailing padding.
    pub bytes_used: u64,
    /// Position of the ID table index.
    pub id_table_start: u64,
    /// Position of the xattr ID table, or [`NO_TABLE`].
    pub xattr_id_table_start: u64,
    /// Position of the first inode metadata block.
    pub inode_table_start: u64,
    /// Position of the first directory metadata block.
    pub directory_table_start: u64,
    /// Position of the fragment table index, or [`NO_TABLE`].
    pub fragment_table_start: u64,
    /// Position of the export table index, or [`NO_TABLE`].
    pub export_table_start: u64,
}

impl Superblock {
    /// Parse and validate a superblock.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::BadMagic`], [`FsError::UnsupportedVersion`],
    /// [`FsError::InvalidBlockSize`] or [`FsError::UnsupportedCompression`]
    /// if the image cannot be read by this crate, [`FsError::Corrupt`] if the
    /// inode or directory table lies outside the image, and
    /// [`FsError::Io`] if `data` is shorter than [`SUPERBLOCK_SIZE`].
    pub fn parse(data: &[u8]) -> Result<Self, FsError> {
        if data.len() < SUPERBLOCK_SIZE {
            return Err(FsError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }

        if le_u32(data, 0) != SQUASHFS_MAGIC {
            return Err(FsError::BadMagic);
        }

        let sb = Self {
            inode_count: le_u32(data, 4),
            mod_time: le_u32(data, 8),
            block_size: le_u32(data, 12),
            fragment_count: le_u32(data, 16),
            compression: Compression::from_id(le_u16(data, 20)),
            block_log: le_u16(data, 22),
            flags: le_u16(data, 24),
            id_count: le_u16(data, 26),
            version_major: le_u16(data, 28),
            version_minor: le_u16(data, 30),
            root_inode: InodeRef(le_u64(data, 32)),
            bytes_used: le_u64(data, 40),
            id_table_start: le_u64(data, 48),
            xattr_id_table_start: le_u64(data, 56),
            inode_table_start: le_u64(data, 64),
            directory_table_start: le_u64(data, 72),
            fragment_table_start: le_u64(data, 80),
            export_table_start: le_u64(data, 88),
        };

        if sb.version_major != 4 || sb.version_minor != 0 {
            return Err(FsError::UnsupportedVersion {
                major: sb.version_major,
                minor: sb.version_minor,
            });
        }

        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&sb.block_size)
            || u32::from(sb.block_log) >= u32::BITS
            || 1u32 << sb.block_log != sb.block_size
        {
            return Err(FsError::InvalidBlockSize(sb.block_size));
        }

        if !sb.compression.is_supported() {
            return Err(FsError::UnsupportedCompression(sb.compression));
        }

        if sb.inode_table_start > sb.bytes_used
            || sb.directory_table_start > sb.bytes_used
            || sb.inode_table_start > sb.directory_table_start
        {
            return Err(FsError::Corrupt("metadata tables lie outside the image"));
        }

        Ok(sb)
    }

    /// Returns `true` if `flag` (one of [`flags`]) is set.
    #[must_use]
    pub fn has_flag(&self, flag: u16) -> bool {
        self.flags & flag != 0
    }

    /// Serialize the superblock into its on-disk form.
    #[cfg(any(test, feature = "builder"))]
    #[must_use]
    pub fn to_bytes(&self) -> [u8; SUPERBLOCK_SIZE] {
        let mut b = [0u8; SUPERBLOCK_SIZE];
        b[0..4].copy_from_slice(&SQUASHFS_MAGIC.to_le_bytes());
        b[4..8].copy_from_slice(&self.inode_count.to_le_bytes());
        b[8..12].copy_from_slice(&self.mod_time.to_le_bytes());
        b[12..16].copy_from_slice(&self.block_size.to_le_bytes());
        b[16..20].copy_from_slice(&self.fragment_count.to_le_bytes());
        b[20..22].copy_from_slice(&self.compression.id().to_le_bytes());
        b[22..24].copy_from_slice(&self.block_log.to_le_bytes());
        b[24..26].copy_from_slice(&self.flags.to_le_bytes());
        b[26..28].copy_from_slice(&self.id_count.to_le_bytes());
        b[28..30].copy_from_slice(&self.version_major.to_le_bytes());
        b[30..32].copy_from_slice(&self.version_minor.to_le_bytes());
        b[32..40].copy_from_slice(&self.root_inode.0.to_le_bytes());
        b[40..48].copy_from_slice(&self.bytes_used.to_le_bytes());
        b[48..56].copy_from_slice(&self.id_table_start.to_le_bytes());
        b[56..64].copy_from_slice(&self.xattr_id_table_start.to_le_bytes());
        b[64..72].copy_from_slice(&self.inode_table_start.to_le_bytes());
        b[72..80].copy_from_slice(&self.directory_table_start.to_le_bytes());
        b[80..88].copy_from_slice(&self.fragment_table_start.to_le_bytes());
        b[88..96].copy_from_slice(&self.export_table_start.to_le_bytes());
        b
    }
}
