//! Error type for SquashFS reading.

use core::fmt;
use std::io;

use crate::superblock::Compression;

/// Errors that can occur while opening or reading a SquashFS image.
#[derive(Debug)]
pub enum FsError {
    /// Reading the underlying file failed, including short reads.
    Io(io::Error),
    /// The superblock does not start with `hsqs`.
    BadMagic,
    /// The image is not SquashFS 4.0.
    UnsupportedVersion {
        /// Declared major version.
        major: u16,
        /// Declared minor version.
        minor: u16,
    },
    /// The image uses a compressor this crate cannot decode.
    UnsupportedCompression(Compression),
    /// `block_size` is out of range or disagrees with `block_log`.
    InvalidBlockSize(u32),
    /// A path component does not exist.
    NotFound,
    /// A directory operation was attempted on a non-directory.
    NotADirectory,
    /// The resolved entry is not a regular file.
    NotAFile,
    /// A symlink operation was attempted on a non-symlink.
    NotASymlink,
    /// Symlink resolution exceeded the hop limit.
    TooManySymlinks,
    /// A file is larger than the configured read limit.
    FileTooLarge {
        /// Size recorded in the inode.
        size: u64,
        /// Configured limit.
        limit: u64,
    },
    /// Decompression failed or a structure is internally inconsistent.
    Corrupt(&'static str),
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::BadMagic => write!(f, "invalid SquashFS magic"),
            Self::UnsupportedVersion { major, minor } => {
                write!(f, "unsupported SquashFS version {major}.{minor}")
            }
            Self::UnsupportedCompression(c) => write!(f, "unsupported compression: {c}"),
            Self::InvalidBlockSize(size) => write!(f, "invalid block size {size}"),
            Self::NotFound => write!(f, "no such file or directory"),
            Self::NotADirectory => write!(f, "not a directory"),
            Self::NotAFile => write!(f, "not a regular file"),
            Self::NotASymlink => write!(f, "not a symlink"),
            Self::TooManySymlinks => write!(f, "too many levels of symbolic links"),
            Self::FileTooLarge { size, limit } => {
                write!(f, "file of {size} bytes exceeds the {limit} byte limit")
            }
            Self::Corrupt(what) => write!(f, "corrupt image: {what}"),
        }
    }
}

impl std::error::Error for FsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for FsError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl FsError {
    /// Returns `true` if the error means the data is not a usable SquashFS
    /// image at all, as opposed to a problem with one path or one file.
    #[must_use]
    pub fn is_unsupported_format(&self) -> bool {
        matches!(
            self,
            Self::BadMagic
                | Self::UnsupportedVersion { .. }
                | Self::UnsupportedCompression(_)
                | Self::InvalidBlockSize(_)
        )
    }
}
