//! Error taxonomy for the extraction pipeline.

use core::fmt;
use std::io;

use diricon_elf::ElfError;
use diricon_squashfs::FsError;

/// Errors returned by the extraction pipeline.
///
/// Parser errors from the ELF and SquashFS layers are folded into these
/// variants so callers can match on the outcome without knowing which
/// layer produced it.
#[derive(Debug)]
pub enum Error {
    /// The file is not an ELF executable, or its header tables are invalid.
    InvalidExecutable(ElfError),
    /// No readable SquashFS image at the computed offset: bad magic, wrong
    /// version, bad block size or an unsupported compressor.
    UnsupportedFilesystemFormat(FsError),
    /// A path component does not exist, or is not a directory.
    NotFound,
    /// The path resolves to something other than a regular file.
    NotAFile,
    /// Symlink resolution exceeded the hop limit.
    TooManySymlinks,
    /// A block failed to decompress or a structure is inconsistent.
    CorruptData(FsError),
    /// Reading the host file failed.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidExecutable(e) => write!(f, "invalid executable: {e}"),
            Self::UnsupportedFilesystemFormat(e) => write!(f, "unsupported filesystem: {e}"),
            Self::NotFound => write!(f, "not found"),
            Self::NotAFile => write!(f, "not a regular file"),
            Self::TooManySymlinks => write!(f, "too many levels of symbolic links"),
            Self::CorruptData(e) => write!(f, "corrupt data: {e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidExecutable(e) => Some(e),
            Self::UnsupportedFilesystemFormat(e) | Self::CorruptData(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::NotFound | Self::NotAFile | Self::TooManySymlinks => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ElfError> for Error {
    fn from(e: ElfError) -> Self {
        Self::InvalidExecutable(e)
    }
}

impl From<FsError> for Error {
    fn from(e: FsError) -> Self {
        match e {
            FsError::Io(e) => Self::Io(e),
            FsError::NotFound | FsError::NotADirectory => Self::NotFound,
            FsError::NotAFile | FsError::NotASymlink => Self::NotAFile,
            FsError::TooManySymlinks => Self::TooManySymlinks,
            e if e.is_unsupported_format() => Self::UnsupportedFilesystemFormat(e),
            e => Self::CorruptData(e),
        }
    }
}
