//! AppDir bundles: an unpacked AppImage directory on the host.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::options::ExtractOptions;

/// Directory name suffix identifying an AppDir.
pub const APPDIR_SUFFIX: &str = ".AppDir";

/// Launcher names, in order of preference.
const APPRUN_NAMES: [&str; 2] = ["AppRun", "AppRun.bat"];

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Returns `true` if `path` is a directory named `*.AppDir` that holds an
/// executable `AppRun` or `AppRun.bat`.
#[must_use]
pub fn is_app_dir(path: &Path) -> bool {
    path.is_dir()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(APPDIR_SUFFIX))
        && APPRUN_NAMES.iter().any(|name| is_executable(&path.join(name)))
}

/// A validated AppDir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDir {
    root: PathBuf,
}

impl AppDir {
    /// Returns the AppDir at `path`, or `None` if it is not one.
    pub fn open(path: impl Into<PathBuf>) -> Option<Self> {
        let root = path.into();
        is_app_dir(&root).then_some(Self { root })
    }

    /// The AppDir's root directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Path of `.DirIcon`, if present.
    #[must_use]
    pub fn icon_path(&self) -> Option<PathBuf> {
        let icon = self.root.join(".DirIcon");
        icon.exists().then_some(icon)
    }

    /// Path of the launcher, preferring `AppRun` over `AppRun.bat`.
    #[must_use]
    pub fn apprun_path(&self) -> Option<PathBuf> {
        APPRUN_NAMES
            .iter()
            .map(|name| self.root.join(name))
            .find(|p| p.exists())
    }

    /// Reads the icon named by `options.icon_path`, relative to the root.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the icon is missing, [`Error::NotAFile`]
    /// if it is not a regular file, [`Error::CorruptData`] if it exceeds the
    /// size limit and [`Error::Io`] if it cannot be read.
    pub fn icon_bytes(&self, options: &ExtractOptions) -> Result<Vec<u8>, Error> {
        let relative = options.icon_path.trim_start_matches('/');
        let icon = self.root.join(relative);
        let meta = match fs::metadata(&icon) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(Error::NotFound),
            Err(e) => return Err(e.into()),
        };
        if !meta.is_file() {
            return Err(Error::NotAFile);
        }
        if meta.len() > options.max_file_size {
            return Err(Error::CorruptData(diricon_squashfs::FsError::FileTooLarge {
                size: meta.len(),
                limit: options.max_file_size,
            }));
        }
        Ok(fs::read(icon)?)
    }
}
