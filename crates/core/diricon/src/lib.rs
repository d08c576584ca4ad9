//! Icon extraction for AppImages and AppDirs.
//!
//! An AppImage is an ELF runtime followed by a SquashFS image. Extracting
//! its icon takes two steps:
//!
//! 1. [`compute_appended_offset`] finds where the ELF ends by taking the
//!    furthest end of the section header table, any section and any segment.
//! 2. [`open_filesystem`] opens the SquashFS image at that offset and
//!    [`FilesystemHandle::extract`] reads `/.DirIcon`, following symlinks.
//!
//! [`AppImage`] wraps both steps. [`load_icon`] accepts either kind of
//! bundle through [`IconSource`] and turns every failure into `None`.
//!
//! ```no_run
//! use diricon::{ExtractOptions, IconSource, load_icon};
//!
//! let source = IconSource::AppImage("Krita.AppImage".into());
//! if let Some(png) = load_icon(&source, &ExtractOptions::default()) {
//!     println!("{} byte icon", png.len());
//! }
//! ```

#![forbid(unsafe_code)]

pub mod appdir;
pub mod appimage;
pub mod error;
pub mod filesystem;
pub mod offset;
pub mod options;
pub mod source;

pub use appdir::{AppDir, is_app_dir};
pub use appimage::{AppImage, has_appimage_suffix};
pub use error::Error;
pub use filesystem::{FilesystemHandle, open_filesystem};
pub use offset::compute_appended_offset;
pub use options::{DEFAULT_ICON_PATH, ExtractOptions};
pub use source::{IconSource, load_icon};
