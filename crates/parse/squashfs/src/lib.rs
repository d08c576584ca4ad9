//! Read-only SquashFS 4.0 reader.
//!
//! Reads an image that starts at an arbitrary offset inside a larger file,
//! such as the filesystem appended to an AppImage runtime. gzip (zlib),
//! LZMA, XZ, LZ4 and Zstandard images are supported; LZO is not.
//!
//! Everything loads lazily: opening an image reads the superblock and the
//! root inode, and each lookup reads only the metadata blocks it touches.
//! Symlinks are resolved inside the image with a bounded hop count, and
//! file reads are capped by a configurable size limit.
//!
//! With the `builder` feature, [`builder::ImageBuilder`] writes images
//! suitable for test fixtures.

#![forbid(unsafe_code)]

#[cfg(any(test, feature = "builder"))]
pub mod builder;
pub mod compress;
pub mod dir;
pub mod error;
pub mod fragment;
pub mod fs;
pub mod inode;
pub mod path;
pub mod superblock;

mod metadata;
mod reader;

pub use dir::DirEntry;
pub use error::FsError;
pub use fs::{DEFAULT_MAX_FILE_SIZE, Limits, MAX_SYMLINK_HOPS, SquashFs};
pub use inode::{DirInode, FileInode, Inode, InodeKind, InodeRef, InodeType};
pub use metadata::METADATA_BLOCK_SIZE;
pub use superblock::{Compression, SQUASHFS_MAGIC, SUPERBLOCK_SIZE, Superblock};
