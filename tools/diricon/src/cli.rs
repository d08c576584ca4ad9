//! Command-line interface definitions for diricon.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Extract icons from AppImages.
#[derive(Parser)]
#[command(name = "diricon", version, about)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Only report errors.
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log each pipeline step (repeat for trace output).
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Print the offset of the filesystem image appended to an executable.
    Offset(OffsetArgs),
    /// Extract the icon (or another file) from an AppImage or AppDir.
    Icon(IconArgs),
    /// List a directory inside an AppImage.
    Ls(LsArgs),
    /// Print a summary of the embedded filesystem.
    Info(InfoArgs),
}

/// Arguments for the `offset` subcommand.
#[derive(Parser)]
pub struct OffsetArgs {
    /// ELF executable to inspect.
    pub file: PathBuf,
}

/// Arguments for the `icon` subcommand.
#[derive(Parser)]
pub struct IconArgs {
    /// AppImage or AppDir to read.
    pub file: PathBuf,

    /// Write the icon here instead of stdout.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Path inside the bundle to extract.
    #[arg(long, default_value = diricon::DEFAULT_ICON_PATH)]
    pub path: String,

    /// Image offset to use instead of computing it from the ELF header.
    #[arg(long)]
    pub offset: Option<u64>,

    /// Maximum number of symlinks to follow.
    #[arg(long, default_value_t = diricon_squashfs::MAX_SYMLINK_HOPS)]
    pub max_symlinks: u32,
}

/// Arguments for the `ls` subcommand.
#[derive(Parser)]
pub struct LsArgs {
    /// AppImage to read.
    pub file: PathBuf,

    /// Directory inside the image.
    #[arg(default_value = "/")]
    pub dir: String,

    /// Image offset to use instead of computing it from the ELF header.
    #[arg(long)]
    pub offset: Option<u64>,
}

/// Arguments for the `info` subcommand.
#[derive(Parser)]
pub struct InfoArgs {
    /// AppImage to read.
    pub file: PathBuf,

    /// Image offset to use instead of computing it from the ELF header.
    #[arg(long)]
    pub offset: Option<u64>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn icon_defaults() {
        let cli = Cli::try_parse_from(["diricon", "icon", "Krita.AppImage"]).unwrap();
        let Command::Icon(args) = cli.command else {
            panic!("expected icon subcommand");
        };
        assert_eq!(args.path, diricon::DEFAULT_ICON_PATH);
        assert_eq!(args.max_symlinks, diricon_squashfs::MAX_SYMLINK_HOPS);
        assert!(args.output.is_none());
        assert!(args.offset.is_none());
    }

    #[test]
    fn verbosity_flags() {
        let cli = Cli::try_parse_from(["diricon", "-vv", "offset", "a"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);
        let both = Cli::try_parse_from(["diricon", "-q", "-v", "offset", "a"]);
        assert!(both.is_err());
    }

    #[test]
    fn ls_defaults_to_root() {
        let cli = Cli::try_parse_from(["diricon", "ls", "a", "--offset", "1024"]).unwrap();
        let Command::Ls(args) = cli.command else {
            panic!("expected ls subcommand");
        };
        assert_eq!(args.dir, "/");
        assert_eq!(args.offset, Some(1024));
    }
}
