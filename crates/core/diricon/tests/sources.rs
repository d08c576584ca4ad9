//! Bundle classification and AppDir icons.

mod common;

use std::fs;
use std::path::Path;

use common::png;
use diricon::{AppDir, Error, ExtractOptions, IconSource, is_app_dir, load_icon};

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod");
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}

fn app_dir(parent: &Path, name: &str, launcher: &str) -> std::path::PathBuf {
    let root = parent.join(name);
    fs::create_dir(&root).expect("mkdir");
    let apprun = root.join(launcher);
    fs::write(&apprun, "#!/bin/sh\n").expect("write AppRun");
    make_executable(&apprun);
    root
}

#[test]
fn app_dir_with_icon() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = app_dir(tmp.path(), "Krita.AppDir", "AppRun");
    fs::write(root.join(".DirIcon"), png()).expect("write icon");

    assert!(is_app_dir(&root));
    let dir = AppDir::open(&root).expect("valid AppDir");
    assert_eq!(dir.icon_path(), Some(root.join(".DirIcon")));
    assert_eq!(dir.apprun_path(), Some(root.join("AppRun")));

    let source = IconSource::classify(&root).expect("classified");
    assert_eq!(source, IconSource::AppDir(root.clone()));
    assert_eq!(load_icon(&source, &ExtractOptions::default()), Some(png()));
}

#[test]
fn bat_launcher_counts() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = app_dir(tmp.path(), "Tool.AppDir", "AppRun.bat");
    let dir = AppDir::open(&root).expect("valid AppDir");
    assert_eq!(dir.apprun_path(), Some(root.join("AppRun.bat")));
    assert_eq!(dir.icon_path(), None);
    let options = ExtractOptions::default();
    assert!(matches!(dir.icon_bytes(&options), Err(Error::NotFound)));
    assert_eq!(load_icon(&IconSource::AppDir(root), &options), None);
}

#[cfg(unix)]
#[test]
fn dir_icon_symlink_is_followed() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = app_dir(tmp.path(), "Linked.AppDir", "AppRun");
    fs::create_dir_all(root.join("usr/share/icons")).expect("mkdir");
    fs::write(root.join("usr/share/icons/app.png"), png()).expect("write icon");
    std::os::unix::fs::symlink("usr/share/icons/app.png", root.join(".DirIcon")).expect("symlink");

    let dir = AppDir::open(&root).expect("valid AppDir");
    let icon = dir.icon_bytes(&ExtractOptions::default()).expect("icon");
    assert_eq!(icon, png());
}

#[cfg(unix)]
#[test]
fn non_executable_apprun_is_rejected() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = tmp.path().join("Plain.AppDir");
    fs::create_dir(&root).expect("mkdir");
    fs::write(root.join("AppRun"), "#!/bin/sh\n").expect("write");
    assert!(!is_app_dir(&root));
    assert!(AppDir::open(&root).is_none());
    assert_eq!(IconSource::classify(&root), None);
}

#[test]
fn wrong_suffix_is_not_an_app_dir() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = app_dir(tmp.path(), "Krita", "AppRun");
    assert!(!is_app_dir(&root));
    assert_eq!(IconSource::classify(&root), None);
}

#[test]
fn classify_files_by_suffix() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let image = tmp.path().join("Tool-1.0.APPIMAGE");
    fs::write(&image, b"").expect("write");
    assert_eq!(
        IconSource::classify(&image),
        Some(IconSource::AppImage(image.clone()))
    );

    let other = tmp.path().join("notes.txt");
    fs::write(&other, b"").expect("write");
    assert_eq!(IconSource::classify(&other), None);

    // An empty "AppImage" degrades to no icon.
    let options = ExtractOptions::default();
    assert_eq!(load_icon(&IconSource::AppImage(image), &options), None);
}

#[test]
fn icon_size_limit_applies_to_app_dirs() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = app_dir(tmp.path(), "Big.AppDir", "AppRun");
    fs::write(root.join(".DirIcon"), png()).expect("write icon");
    let dir = AppDir::open(&root).expect("valid AppDir");
    assert!(matches!(
        dir.icon_bytes(&ExtractOptions::default().max_file_size(8)),
        Err(Error::CorruptData(_))
    ));
}
