//! Opening the appended filesystem image.

use std::fs::File;
use std::path::Path;

use diricon_squashfs::{DirEntry, Inode, Limits, SquashFs, Superblock};

use crate::error::Error;

/// An open SquashFS image inside a host file.
///
/// Owns the file handle; dropping the handle closes it.
#[derive(Debug)]
pub struct FilesystemHandle {
    fs: SquashFs<File>,
}

/// Opens the SquashFS image that starts `base_offset` bytes into the file
/// at `path`.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFilesystemFormat`] if there is no supported
/// SquashFS 4.0 image at that offset, [`Error::CorruptData`] if its root
/// directory cannot be read, and [`Error::Io`] if the file cannot be read.
pub fn open_filesystem(
    path: impl AsRef<Path>,
    base_offset: u64,
) -> Result<FilesystemHandle, Error> {
    let fs = SquashFs::open_at(path, base_offset)?;
    Ok(FilesystemHandle { fs })
}

impl FilesystemHandle {
    /// Replaces the reader limits.
    #[must_use]
    pub fn with_limits(self, limits: Limits) -> Self {
        Self {
            fs: self.fs.with_limits(limits),
        }
    }

    /// Reads the regular file at `virtual_path`, following symlinks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`], [`Error::NotAFile`],
    /// [`Error::TooManySymlinks`] or [`Error::CorruptData`]. On error no
    /// partial data is returned.
    pub fn extract(&mut self, virtual_path: &str) -> Result<Vec<u8>, Error> {
        Ok(self.fs.extract(virtual_path)?)
    }

    /// Lists the directory at `virtual_path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the path is missing or not a directory.
    pub fn read_dir(&mut self, virtual_path: &str) -> Result<Vec<DirEntry>, Error> {
        Ok(self.fs.read_dir(virtual_path)?)
    }

    /// Looks up `virtual_path` without following a final symlink.
    ///
    /// # Errors
    ///
    /// As for [`FilesystemHandle::extract`], minus [`Error::NotAFile`].
    pub fn lookup(&mut self, virtual_path: &str) -> Result<Inode, Error> {
        Ok(self.fs.lookup(virtual_path)?)
    }

    /// The image superblock.
    #[must_use]
    pub fn superblock(&self) -> &Superblock {
        self.fs.superblock()
    }

    /// Offset of the image within the host file.
    #[must_use]
    pub fn base_offset(&self) -> u64 {
        self.fs.base_offset()
    }
}
