//! End-to-end extraction from AppImages written to disk.

mod common;

use std::fs;

use common::{png, runtime, write_appimage};
use diricon::{
    AppImage, Error, ExtractOptions, IconSource, compute_appended_offset, load_icon,
    open_filesystem,
};
use diricon_squashfs::Compression;
use diricon_squashfs::builder::ImageBuilder;

fn icon_image(compression: Compression) -> Vec<u8> {
    ImageBuilder::new(compression)
        .file("usr/share/icons/hicolor/256x256/apps/app.png", png())
        .symlink(".DirIcon", "usr/share/icons/hicolor/256x256/apps/app.png")
        .file("AppRun", "#!/bin/sh\n")
        .build()
        .expect("build image")
}

#[test]
fn dir_icon_round_trips_through_appimage() {
    let dir = tempfile::tempdir().expect("tempdir");
    let elf = runtime(true, false);
    let image = icon_image(Compression::Gzip);
    let path = write_appimage(dir.path(), "App-x86_64.AppImage", &elf, &image);

    let offset = compute_appended_offset(&path).expect("offset");
    assert_eq!(offset, elf.len() as u64);

    let mut fs = open_filesystem(&path, offset).expect("open");
    assert_eq!(fs.base_offset(), offset);
    let first = fs.extract("/.DirIcon").expect("icon");
    assert_eq!(first, png());
    assert_eq!(fs.extract("/.DirIcon").expect("icon again"), first);

    let app = AppImage::open(&path, ExtractOptions::default());
    assert_eq!(app.offset(), offset);
    assert_eq!(app.icon(), Some(png()));

    let source = IconSource::classify(&path).expect("classified");
    assert_eq!(source, IconSource::AppImage(path.clone()));
    assert_eq!(load_icon(&source, &ExtractOptions::default()), Some(png()));
}

#[test]
fn big_endian_elf32_runtime_and_lz4_image() {
    let dir = tempfile::tempdir().expect("tempdir");
    let elf = runtime(false, true);
    let image = icon_image(Compression::Lz4);
    let path = write_appimage(dir.path(), "app.appimage", &elf, &image);
    let app = AppImage::open(&path, ExtractOptions::default());
    assert_eq!(app.offset(), elf.len() as u64);
    assert_eq!(app.icon_bytes().expect("icon"), png());
}

#[test]
fn symlink_chain_and_loop() {
    let dir = tempfile::tempdir().expect("tempdir");
    let image = ImageBuilder::new(Compression::Gzip)
        .symlink("a", "/b")
        .symlink("b", "/c")
        .file("c", "contents of c")
        .symlink("x", "/y")
        .symlink("y", "/x")
        .build()
        .expect("build image");
    let elf = runtime(true, false);
    let path = write_appimage(dir.path(), "chain.AppImage", &elf, &image);

    let mut fs = open_filesystem(&path, elf.len() as u64).expect("open");
    assert_eq!(fs.extract("/a").expect("chain"), b"contents of c");
    assert!(matches!(fs.extract("/x"), Err(Error::TooManySymlinks)));
    // A trailing slash only matches directories.
    assert!(matches!(fs.extract("/c/"), Err(Error::NotFound)));
    assert!(matches!(fs.extract("/a/"), Err(Error::NotFound)));
}

#[test]
fn missing_paths_and_directories() {
    let dir = tempfile::tempdir().expect("tempdir");
    let elf = runtime(true, false);
    let image = icon_image(Compression::Gzip);
    let path = write_appimage(dir.path(), "app.AppImage", &elf, &image);
    let mut fs = open_filesystem(&path, elf.len() as u64).expect("open");

    assert!(matches!(
        fs.extract("/does/not/exist"),
        Err(Error::NotFound)
    ));
    assert!(matches!(fs.extract("/AppRun/child"), Err(Error::NotFound)));
    assert!(matches!(fs.extract("/usr/share"), Err(Error::NotAFile)));

    let app = AppImage::open(&path, ExtractOptions::default().icon_path("/missing.png"));
    assert!(matches!(app.icon_bytes(), Err(Error::NotFound)));
    assert!(app.icon().is_none());
}

#[test]
fn corrupt_block_returns_no_bytes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut image = ImageBuilder::new(Compression::Gzip)
        .fragments(false)
        .file("icon.png", png())
        .symlink(".DirIcon", "icon.png")
        .build()
        .expect("build image");
    // The only data block starts right after the superblock.
    image[96..112].fill(0xFF);
    let elf = runtime(true, false);
    let path = write_appimage(dir.path(), "broken.AppImage", &elf, &image);

    let mut fs = open_filesystem(&path, elf.len() as u64).expect("open");
    assert!(matches!(
        fs.extract("/.DirIcon"),
        Err(Error::CorruptData(_))
    ));
    let app = AppImage::open(&path, ExtractOptions::default());
    assert_eq!(app.icon(), None);
}

#[test]
fn unsupported_compression() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut image = icon_image(Compression::Gzip);
    // Compression id 3: lzo.
    image[20..22].copy_from_slice(&3u16.to_le_bytes());
    let elf = runtime(true, false);
    let path = write_appimage(dir.path(), "lzo.AppImage", &elf, &image);

    assert!(matches!(
        open_filesystem(&path, elf.len() as u64),
        Err(Error::UnsupportedFilesystemFormat(_))
    ));
    let app = AppImage::open(&path, ExtractOptions::default());
    assert!(app.icon().is_none());
}

#[test]
fn plain_executable_has_no_filesystem() {
    let dir = tempfile::tempdir().expect("tempdir");
    let elf = runtime(true, false);
    let path = dir.path().join("plain.AppImage");
    fs::write(&path, &elf).expect("write");

    let offset = compute_appended_offset(&path).expect("offset");
    assert!(matches!(
        open_filesystem(&path, offset),
        Err(Error::UnsupportedFilesystemFormat(_))
    ));
}

#[test]
fn bare_image_falls_back_to_offset_zero() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bare.AppImage");
    fs::write(&path, icon_image(Compression::Gzip)).expect("write");

    assert!(matches!(
        compute_appended_offset(&path),
        Err(Error::InvalidExecutable(_))
    ));
    let app = AppImage::open(&path, ExtractOptions::default());
    assert_eq!(app.offset(), 0);
    assert_eq!(app.icon(), Some(png()));
}

#[test]
fn symlink_limit_from_options() {
    let dir = tempfile::tempdir().expect("tempdir");
    let elf = runtime(true, false);
    let image = icon_image(Compression::Gzip);
    let path = write_appimage(dir.path(), "app.AppImage", &elf, &image);
    let app = AppImage::open(&path, ExtractOptions::default().max_symlink_hops(0));
    assert!(matches!(app.icon_bytes(), Err(Error::TooManySymlinks)));
    let app = AppImage::open(&path, ExtractOptions::default().max_file_size(16));
    assert!(matches!(app.icon_bytes(), Err(Error::CorruptData(_))));
}
