//! Icon sources and the degrade-gracefully entry point.

use std::path::{Path, PathBuf};

use crate::appdir::{AppDir, is_app_dir};
use crate::appimage::{AppImage, has_appimage_suffix};
use crate::error::Error;
use crate::options::ExtractOptions;

/// Where an icon comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconSource {
    /// An AppImage file.
    AppImage(PathBuf),
    /// An unpacked AppDir.
    AppDir(PathBuf),
}

impl IconSource {
    /// Classifies `path` by name and, for directories, contents.
    ///
    /// Returns `None` for anything that is neither an `*.AppImage` file
    /// nor a valid AppDir.
    #[must_use]
    pub fn classify(path: &Path) -> Option<Self> {
        if is_app_dir(path) {
            Some(Self::AppDir(path.to_path_buf()))
        } else if has_appimage_suffix(path) && !path.is_dir() {
            Some(Self::AppImage(path.to_path_buf()))
        } else {
            None
        }
    }

    /// Host path of the bundle.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::AppImage(p) | Self::AppDir(p) => p,
        }
    }

    /// Reads the icon, reporting why when there is none.
    ///
    /// # Errors
    ///
    /// Any [`Error`] from the underlying bundle. An `AppDir` path that is no
    /// longer a valid AppDir is [`Error::NotFound`].
    pub fn icon_bytes(&self, options: &ExtractOptions) -> Result<Vec<u8>, Error> {
        match self {
            Self::AppImage(path) => AppImage::open(path.clone(), options.clone()).icon_bytes(),
            Self::AppDir(path) => AppDir::open(path.clone())
                .ok_or(Error::NotFound)?
                .icon_bytes(options),
        }
    }
}

/// Loads the icon for `source`, or `None` if it has none or cannot be read.
///
/// Never panics; the reason for a missing icon is logged.
#[must_use]
pub fn load_icon(source: &IconSource, options: &ExtractOptions) -> Option<Vec<u8>> {
    match source.icon_bytes(options) {
        Ok(bytes) => {
            log::debug!(
                "{}: loaded {} byte icon",
                source.path().display(),
                bytes.len()
            );
            Some(bytes)
        }
        Err(Error::NotFound) => {
            log::debug!("{}: no {}", source.path().display(), options.icon_path);
            None
        }
        Err(e) => {
            log::warn!("{}: cannot load icon: {e}", source.path().display());
            None
        }
    }
}
