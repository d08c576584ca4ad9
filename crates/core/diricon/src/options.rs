//! Extraction settings.

use diricon_squashfs::{DEFAULT_MAX_FILE_SIZE, Limits, MAX_SYMLINK_HOPS};

/// Path of the bundle icon inside an AppImage or AppDir.
pub const DEFAULT_ICON_PATH: &str = "/.DirIcon";

/// Settings for locating and reading an icon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Path of the file to extract inside the image.
    pub icon_path: String,
    /// Symlinks followed before giving up.
    pub max_symlink_hops: u32,
    /// Largest file that will be read into memory.
    pub max_file_size: u64,
    /// Use this image offset instead of computing it from the ELF header.
    pub offset: Option<u64>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            icon_path: DEFAULT_ICON_PATH.to_owned(),
            max_symlink_hops: MAX_SYMLINK_HOPS,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            offset: None,
        }
    }
}

impl ExtractOptions {
    /// Extract `path` instead of `/.DirIcon`.
    #[must_use]
    pub fn icon_path(mut self, path: impl Into<String>) -> Self {
        self.icon_path = path.into();
        self
    }

    /// Sets the symlink hop limit.
    #[must_use]
    pub fn max_symlink_hops(mut self, hops: u32) -> Self {
        self.max_symlink_hops = hops;
        self
    }

    /// Sets the largest file that will be read.
    #[must_use]
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Skips offset computation and opens the image at `offset`.
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Reader limits derived from these options.
    #[must_use]
    pub fn limits(&self) -> Limits {
        Limits {
            max_symlink_hops: self.max_symlink_hops,
            max_file_size: self.max_file_size,
        }
    }
}
