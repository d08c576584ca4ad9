//! Images and runtimes that were not produced by `ImageBuilder`/`ElfWriter`.
//!
//! `fixtures/dir-icon.sqfs` is a gzip SquashFS 4.0 image laid out the way
//! mksquashfs 4.x writes one: inodes in post-order with the root last, an
//! export table, DUPLICATES | EXPORTABLE | NO_XATTRS flags and padding to
//! 4 KiB. Its tree:
//!
//! ```text
//! /.DirIcon -> usr/share/icons/app.png
//! /AppRun                      43 bytes, fragment only
//! /usr/share/icons/app.png     5000 bytes, one 4 KiB block + fragment tail
//! ```

mod common;

use std::io::Cursor;

use diricon_squashfs::superblock::flags;
use diricon_squashfs::{Compression, InodeType, SquashFs};

const FIXTURE: &[u8] = include_bytes!("fixtures/dir-icon.sqfs");

const APPRUN: &[u8] = b"#!/bin/sh\nexec \"$APPDIR/usr/bin/app\" \"$@\"\n";

fn fixture_png() -> Vec<u8> {
    let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
    data.extend((0..4992u32).map(|i| ((i * 7 + 3) % 251) as u8));
    data
}

#[test]
fn fixture_superblock() {
    let fs = SquashFs::new(Cursor::new(FIXTURE), 0).expect("open");
    let sb = fs.superblock();
    assert_eq!(sb.compression, Compression::Gzip);
    assert_eq!(sb.block_size, 4096);
    assert_eq!(sb.inode_count, 7);
    assert_eq!(sb.fragment_count, 1);
    assert!(sb.has_flag(flags::EXPORTABLE));
    assert!(sb.has_flag(flags::NO_XATTRS));
    assert!(sb.bytes_used < FIXTURE.len() as u64);
}

#[test]
fn fixture_tree() {
    let mut fs = SquashFs::new(Cursor::new(FIXTURE), 0).expect("open");

    let root: Vec<_> = fs
        .read_dir("/")
        .expect("root")
        .into_iter()
        .map(|e| (e.name_lossy().into_owned(), e.kind(), e.inode_number))
        .collect();
    assert_eq!(
        root,
        [
            (".DirIcon".to_owned(), Some(InodeType::Symlink), 1),
            ("AppRun".to_owned(), Some(InodeType::File), 2),
            ("usr".to_owned(), Some(InodeType::Directory), 6),
        ]
    );
    assert_eq!(fs.root().expect("root inode").number, 7);
    let target = fs.read_link("/.DirIcon").expect("link");
    assert_eq!(target, b"usr/share/icons/app.png");

    assert_eq!(fs.extract("/AppRun").expect("AppRun"), APPRUN);
    let png = fs.extract("/usr/share/icons/app.png").expect("png");
    assert_eq!(png, fixture_png());
    assert_eq!(fs.extract("/.DirIcon").expect("icon"), fixture_png());
    let apprun = fs.extract("/usr/share/icons/../../../AppRun").expect("dotdot");
    assert_eq!(apprun, APPRUN);
}

#[cfg(target_os = "linux")]
mod real_runtime {
    use std::fs;

    use diricon::{AppImage, ExtractOptions, compute_appended_offset, open_filesystem};
    use diricon_squashfs::builder::ImageBuilder;

    use super::*;
    use crate::common::{png, write_appimage};

    /// The running test binary is a real linker-produced ELF.
    fn runtime() -> Vec<u8> {
        let exe = std::env::current_exe().expect("current exe");
        fs::read(exe).expect("read current exe")
    }

    #[test]
    fn offset_of_current_exe_is_its_length() {
        let dir = tempfile::tempdir().expect("tempdir");
        let elf = runtime();
        let path = write_appimage(dir.path(), "self.AppImage", &elf, FIXTURE);

        let offset = compute_appended_offset(&path).expect("offset");
        assert_eq!(offset, elf.len() as u64);
        let app = AppImage::open(&path, ExtractOptions::default());
        assert_eq!(app.offset(), elf.len() as u64);
        assert_eq!(app.icon(), Some(fixture_png()));
    }

    #[test]
    fn zstd_and_xz_images_behind_current_exe() {
        let dir = tempfile::tempdir().expect("tempdir");
        let elf = runtime();
        for compression in [Compression::Zstd, Compression::Xz] {
            let image = ImageBuilder::new(compression)
                .file("usr/share/icons/app.png", png())
                .symlink(".DirIcon", "usr/share/icons/app.png")
                .build()
                .expect("build image");
            let name = format!("{compression}.AppImage");
            let path = write_appimage(dir.path(), &name, &elf, &image);

            let mut fs = open_filesystem(&path, elf.len() as u64).expect("open");
            assert_eq!(fs.superblock().compression, compression);
            assert_eq!(fs.extract("/.DirIcon").expect("icon"), png());
        }
    }
}
