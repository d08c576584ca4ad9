//! AppImage bundles: an ELF runtime with a SquashFS image appended.

use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::filesystem::{FilesystemHandle, open_filesystem};
use crate::offset::compute_appended_offset;
use crate::options::ExtractOptions;

/// File name suffix identifying an AppImage, compared case-insensitively.
pub const APPIMAGE_SUFFIX: &str = ".appimage";

/// Returns `true` if `path` has an `.AppImage` suffix in any case.
#[must_use]
pub fn has_appimage_suffix(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| {
            n.len() > APPIMAGE_SUFFIX.len()
                && n.is_char_boundary(n.len() - APPIMAGE_SUFFIX.len())
                && n[n.len() - APPIMAGE_SUFFIX.len()..].eq_ignore_ascii_case(APPIMAGE_SUFFIX)
        })
}

/// An AppImage on disk with its image offset resolved.
#[derive(Debug, Clone)]
pub struct AppImage {
    path: PathBuf,
    offset: u64,
    options: ExtractOptions,
}

impl AppImage {
    /// Resolves the image offset of the AppImage at `path`.
    ///
    /// Uses `options.offset` when set. Otherwise the offset is computed
    /// from the ELF header; if that fails the failure is logged and 0 is
    /// used, so a bare SquashFS image still works.
    pub fn open(path: impl Into<PathBuf>, options: ExtractOptions) -> Self {
        let path = path.into();
        let offset = match options.offset {
            Some(offset) => offset,
            None => compute_appended_offset(&path).unwrap_or_else(|e| {
                log::warn!(
                    "{}: cannot compute image offset: {e}; assuming 0",
                    path.display()
                );
                0
            }),
        };
        Self {
            path,
            offset,
            options,
        }
    }

    /// Host path of the AppImage.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Offset of the SquashFS image within the file.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Opens the embedded filesystem with the configured limits.
    ///
    /// # Errors
    ///
    /// See [`open_filesystem`].
    pub fn filesystem(&self) -> Result<FilesystemHandle, Error> {
        let fs = open_filesystem(&self.path, self.offset)?;
        Ok(fs.with_limits(self.options.limits()))
    }

    /// Reads the icon bytes, reporting why when there is none.
    ///
    /// # Errors
    ///
    /// Any [`Error`] from opening the image or extracting the icon path.
    pub fn icon_bytes(&self) -> Result<Vec<u8>, Error> {
        self.filesystem()?.extract(&self.options.icon_path)
    }

    /// Reads the icon bytes, or `None` if the icon cannot be extracted.
    #[must_use]
    pub fn icon(&self) -> Option<Vec<u8>> {
        match self.icon_bytes() {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                log::warn!(
                    "{}: no icon at {}: {e}",
                    self.path.display(),
                    self.options.icon_path
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_is_case_insensitive() {
        assert!(has_appimage_suffix(Path::new("/opt/Krita-5.2.AppImage")));
        assert!(has_appimage_suffix(Path::new("tool.appimage")));
        assert!(has_appimage_suffix(Path::new("TOOL.APPIMAGE")));
        assert!(!has_appimage_suffix(Path::new(".appimage")));
        assert!(!has_appimage_suffix(Path::new("tool.AppImage.zsync")));
        assert!(!has_appimage_suffix(Path::new("tool.AppDir")));
    }

    #[test]
    fn explicit_offset_skips_elf_parsing() {
        let options = ExtractOptions::default().offset(4096);
        let app = AppImage::open("/nonexistent/x.AppImage", options);
        assert_eq!(app.offset(), 4096);
        assert!(matches!(app.icon_bytes(), Err(Error::Io(_))));
        assert!(app.icon().is_none());
    }

    #[test]
    fn missing_file_falls_back_to_zero() {
        let app = AppImage::open("/nonexistent/x.AppImage", ExtractOptions::default());
        assert_eq!(app.offset(), 0);
    }
}
