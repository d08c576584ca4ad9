//! diricon command-line tool.
//!
//! Thin front-end over the `diricon` library: prints image offsets, extracts
//! icons and inspects the SquashFS image embedded in an AppImage.

mod cli;

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use diricon::{AppImage, ExtractOptions, FilesystemHandle, IconSource, compute_appended_offset};
use diricon_squashfs::InodeType;
use diricon_squashfs::superblock::flags;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            match cli.verbose {
                0 => log::LevelFilter::Warn,
                1 => log::LevelFilter::Debug,
                _ => log::LevelFilter::Trace,
            }
        })
        .format_timestamp(None)
        .format_target(false)
        .init();

    match cli.command {
        cli::Command::Offset(ref args) => cmd_offset(args),
        cli::Command::Icon(ref args) => cmd_icon(args),
        cli::Command::Ls(ref args) => cmd_ls(args),
        cli::Command::Info(ref args) => cmd_info(args),
    }
}

fn cmd_offset(args: &cli::OffsetArgs) -> Result<()> {
    let offset = compute_appended_offset(&args.file)
        .with_context(|| format!("cannot compute image offset of {}", args.file.display()))?;
    println!("{offset}");
    Ok(())
}

fn cmd_icon(args: &cli::IconArgs) -> Result<()> {
    let mut options = ExtractOptions::default()
        .icon_path(args.path.clone())
        .max_symlink_hops(args.max_symlinks);
    if let Some(offset) = args.offset {
        options = options.offset(offset);
    }

    // Files without the usual suffix are still tried as AppImages.
    let source = IconSource::classify(&args.file)
        .unwrap_or_else(|| IconSource::AppImage(args.file.clone()));
    let bytes = source
        .icon_bytes(&options)
        .with_context(|| format!("cannot extract {} from {}", args.path, args.file.display()))?;

    match &args.output {
        Some(out) => {
            fs::write(out, &bytes)
                .with_context(|| format!("cannot write {}", out.display()))?;
            log::info!("wrote {} bytes to {}", bytes.len(), out.display());
        }
        None => io::stdout().lock().write_all(&bytes)?,
    }
    Ok(())
}

fn open_image(file: &Path, offset: Option<u64>) -> Result<FilesystemHandle> {
    let options = ExtractOptions {
        offset,
        ..ExtractOptions::default()
    };
    let app = AppImage::open(file, options);
    app.filesystem().with_context(|| {
        format!(
            "no readable filesystem at offset {} of {}",
            app.offset(),
            file.display()
        )
    })
}

fn cmd_ls(args: &cli::LsArgs) -> Result<()> {
    let mut image = open_image(&args.file, args.offset)?;
    let entries = image
        .read_dir(&args.dir)
        .with_context(|| format!("cannot list {}", args.dir))?;

    let mut out = io::stdout().lock();
    for entry in entries {
        let name = entry.name_lossy();
        let kind = match entry.kind() {
            Some(InodeType::Directory) => 'd',
            Some(InodeType::File) => '-',
            Some(InodeType::Symlink) => 'l',
            Some(InodeType::Other) | None => '?',
        };
        write!(out, "{kind} {:>6} {name}", entry.inode_number)?;
        if kind == 'l' {
            let path = format!("{}/{name}", args.dir.trim_end_matches('/'));
            if let Some(target) = image.lookup(&path)?.symlink_target() {
                write!(out, " -> {}", String::from_utf8_lossy(target))?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

fn cmd_info(args: &cli::InfoArgs) -> Result<()> {
    let image = open_image(&args.file, args.offset)?;
    let sb = image.superblock();

    let names = [
        (flags::UNCOMPRESSED_INODES, "uncompressed-inodes"),
        (flags::UNCOMPRESSED_DATA, "uncompressed-data"),
        (flags::UNCOMPRESSED_FRAGMENTS, "uncompressed-fragments"),
        (flags::NO_FRAGMENTS, "no-fragments"),
        (flags::ALWAYS_FRAGMENTS, "always-fragments"),
        (flags::DUPLICATES, "duplicates"),
        (flags::EXPORTABLE, "exportable"),
        (flags::UNCOMPRESSED_XATTRS, "uncompressed-xattrs"),
        (flags::NO_XATTRS, "no-xattrs"),
        (flags::COMPRESSOR_OPTIONS, "compressor-options"),
        (flags::UNCOMPRESSED_IDS, "uncompressed-ids"),
    ];
    let set: Vec<&str> = names
        .iter()
        .filter(|(bit, _)| sb.has_flag(*bit))
        .map(|(_, name)| *name)
        .collect();

    println!("offset:       {}", image.base_offset());
    println!("version:      {}.{}", sb.version_major, sb.version_minor);
    println!("compression:  {}", sb.compression);
    println!("block size:   {}", sb.block_size);
    println!("inodes:       {}", sb.inode_count);
    println!("fragments:    {}", sb.fragment_count);
    println!("bytes used:   {}", sb.bytes_used);
    println!("flags:        {}", set.join(" "));
    Ok(())
}
