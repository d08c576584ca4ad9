//! The filesystem handle: path resolution and file extraction.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::compress::Decompressor;
use crate::dir::{self, DirEntry};
use crate::error::FsError;
use crate::fragment;
use crate::inode::{DirInode, FileInode, Inode, InodeContext, InodeRef};
use crate::metadata::{METADATA_BLOCK_SIZE, MetadataCursor};
use crate::path::{Step, is_absolute, walk_steps};
use crate::reader::{DATA_SIZE_MASK, ImageReader};
use crate::superblock::{SUPERBLOCK_SIZE, Superblock, flags};

/// Default bound on symlink hops during one resolution, matching Linux.
pub const MAX_SYMLINK_HOPS: u32 = 40;

/// Default largest file [`SquashFs::read_file`] will load (64 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 64 << 20;

/// Resource limits applied while reading an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Symlinks followed before giving up with [`FsError::TooManySymlinks`].
    pub max_symlink_hops: u32,
    /// Largest file that will be read into memory.
    pub max_file_size: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_symlink_hops: MAX_SYMLINK_HOPS,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// A SquashFS image embedded at `base` inside a seekable reader.
#[derive(Debug)]
pub struct SquashFs<R> {
    reader: ImageReader<R>,
    sb: Superblock,
    limits: Limits,
    /// Last decompressed fragment block, keyed by fragment index.
    fragment_cache: Option<(u32, Vec<u8>)>,
}

impl SquashFs<File> {
    /// Opens the image that starts `base` bytes into the file at `path`.
    ///
    /// # Errors
    ///
    /// See [`SquashFs::new`].
    pub fn open_at(path: impl AsRef<Path>, base: u64) -> Result<Self, FsError> {
        Self::new(File::open(path)?, base)
    }
}

impl<R: Read + Seek> SquashFs<R> {
    /// Reads and validates the superblock at `base` and the root inode.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::BadMagic`] if there is no SquashFS image at `base`
    /// (including when the file ends before a full superblock), one of the
    /// unsupported-format errors from [`Superblock::parse`], or
    /// [`FsError::Corrupt`] if the root inode cannot be read.
    pub fn new(mut inner: R, base: u64) -> Result<Self, FsError> {
        let mut raw = [0u8; SUPERBLOCK_SIZE];
        inner.seek(SeekFrom::Start(base))?;
        match inner.read_exact(&mut raw) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                log::debug!("squashfs: no room for a superblock at offset {base}");
                return Err(FsError::BadMagic);
            }
            Err(e) => return Err(e.into()),
        }

        let sb = Superblock::parse(&raw)?;
        let decompressor = Decompressor::for_compression(sb.compression)?;
        log::debug!(
            "squashfs: {} image at offset {base}, block size {}, {} inodes, {} fragments",
            sb.compression,
            sb.block_size,
            sb.inode_count,
            sb.fragment_count,
        );
        if sb.has_flag(flags::COMPRESSOR_OPTIONS) {
            log::debug!("squashfs: ignoring compressor options block");
        }

        let mut fs = Self {
            reader: ImageReader::new(inner, base, sb.bytes_used, decompressor),
            sb,
            limits: Limits::default(),
            fragment_cache: None,
        };
        if fs.root()?.as_dir().is_none() {
            return Err(FsError::Corrupt("root inode is not a directory"));
        }
        Ok(fs)
    }

    /// Replaces the resource limits.
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// The validated superblock.
    #[must_use]
    pub fn superblock(&self) -> &Superblock {
        &self.sb
    }

    /// Offset of the image within the underlying reader.
    #[must_use]
    pub fn base_offset(&self) -> u64 {
        self.reader.base()
    }

    /// The resource limits in effect.
    #[must_use]
    pub fn limits(&self) -> Limits {
        self.limits
    }

    fn inode_context(&self) -> InodeContext {
        // Each on-disk metadata block is at least 3 bytes and expands to at
        // most 8 KiB, i.e. 2048 block size words.
        let table = self
            .sb
            .directory_table_start
            .saturating_sub(self.sb.inode_table_start);
        let words = (METADATA_BLOCK_SIZE / 4) as u64;
        InodeContext {
            block_size: self.sb.block_size,
            max_blocks: (table / 3 + 1).saturating_mul(words),
            max_file_size: self.limits.max_file_size,
        }
    }

    /// Decodes the inode at `iref`.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::Corrupt`] if the inode is malformed or lies outside
    /// the image.
    pub fn inode(&mut self, iref: InodeRef) -> Result<Inode, FsError> {
        let ctx = self.inode_context();
        let pos = self
            .sb
            .inode_table_start
            .checked_add(iref.block())
            .ok_or(FsError::Corrupt("inode reference overflows"))?;
        let mut c = MetadataCursor::new(&mut self.reader, pos, usize::from(iref.offset()))?;
        Inode::read(&mut c, ctx)
    }

    /// The root directory inode.
    ///
    /// # Errors
    ///
    /// See [`SquashFs::inode`].
    pub fn root(&mut self) -> Result<Inode, FsError> {
        self.inode(self.sb.root_inode)
    }

    /// Entries of the directory described by `dir`, in on-disk order.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::Corrupt`] if the listing is malformed.
    pub fn entries(&mut self, dir: &DirInode) -> Result<Vec<DirEntry>, FsError> {
        // An empty listing may point just past the end of the table.
        if dir.size == dir::EMPTY_LISTING_SIZE {
            return Ok(Vec::new());
        }
        let pos = self
            .sb
            .directory_table_start
            .checked_add(u64::from(dir.start_block))
            .ok_or(FsError::Corrupt("directory position overflows"))?;
        let mut c = MetadataCursor::new(&mut self.reader, pos, usize::from(dir.offset))?;
        dir::read_listing(&mut c, dir.size)
    }

    fn find(&mut self, dir: &DirInode, name: &[u8]) -> Result<DirEntry, FsError> {
        self.entries(dir)?
            .into_iter()
            .find(|e| e.name == name)
            .ok_or(FsError::NotFound)
    }

    /// Walks `path` from the root, following symlinks met along the way.
    ///
    /// `.` is skipped and `..` returns to the directory the walk came from,
    /// staying put at the root. Absolute symlink targets restart at the
    /// root; relative ones continue from the directory holding the link.
    /// A trailing slash requires the final entry to be a directory.
    fn walk(&mut self, path: &[u8], follow_final: bool) -> Result<Inode, FsError> {
        let root = self.root()?;
        let mut ancestors: Vec<Inode> = Vec::new();
        let mut current = root.clone();
        let mut pending: VecDeque<Vec<u8>> = walk_steps(path).map(<[u8]>::to_vec).collect();
        let mut hops = 0u32;

        while let Some(component) = pending.pop_front() {
            let Some(&dir) = current.as_dir() else {
                return Err(FsError::NotADirectory);
            };
            let name = match Step::classify(&component) {
                Step::Current => continue,
                Step::Parent => {
                    if let Some(parent) = ancestors.pop() {
                        current = parent;
                    }
                    continue;
                }
                Step::Name(name) => name,
            };

            let entry = self.find(&dir, name)?;
            let inode = self.inode(entry.inode)?;

            if let Some(target) = inode.symlink_target() {
                if follow_final || !pending.is_empty() {
                    hops += 1;
                    if hops > self.limits.max_symlink_hops {
                        log::debug!("squashfs: gave up after {} symlink hops", hops - 1);
                        return Err(FsError::TooManySymlinks);
                    }
                    log::trace!(
                        "squashfs: {} -> {}",
                        entry.name_lossy(),
                        String::from_utf8_lossy(target)
                    );
                    if target.is_empty() {
                        return Err(FsError::NotFound);
                    }
                    if is_absolute(target) {
                        ancestors.clear();
                        current = root.clone();
                    }
                    for part in walk_steps(target).rev() {
                        pending.push_front(part.to_vec());
                    }
                    continue;
                }
            }

            ancestors.push(core::mem::replace(&mut current, inode));
        }

        Ok(current)
    }

    /// Looks up `path` without following a symlink in the final component.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::NotFound`] for a missing component,
    /// [`FsError::NotADirectory`] if an intermediate component is not a
    /// directory, and [`FsError::TooManySymlinks`] if an intermediate
    /// symlink chain exceeds the hop limit.
    pub fn lookup(&mut self, path: impl AsRef<[u8]>) -> Result<Inode, FsError> {
        self.walk(path.as_ref(), false)
    }

    /// Looks up `path`, following symlinks in every component.
    ///
    /// # Errors
    ///
    /// As for [`SquashFs::lookup`].
    pub fn resolve(&mut self, path: impl AsRef<[u8]>) -> Result<Inode, FsError> {
        self.walk(path.as_ref(), true)
    }

    /// Lists the directory at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::NotADirectory`] if `path` resolves to something
    /// other than a directory, plus any error from [`SquashFs::resolve`].
    pub fn read_dir(&mut self, path: impl AsRef<[u8]>) -> Result<Vec<DirEntry>, FsError> {
        let inode = self.resolve(path)?;
        let dir = inode.as_dir().ok_or(FsError::NotADirectory)?;
        self.entries(dir)
    }

    /// Returns the raw target of the symlink at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::NotASymlink`] if the entry is not a symlink, plus
    /// any error from [`SquashFs::lookup`].
    pub fn read_link(&mut self, path: impl AsRef<[u8]>) -> Result<Vec<u8>, FsError> {
        let inode = self.lookup(path)?;
        inode
            .symlink_target()
            .map(<[u8]>::to_vec)
            .ok_or(FsError::NotASymlink)
    }

    fn fragment_block(&mut self, index: u32) -> Result<&[u8], FsError> {
        if self.fragment_cache.as_ref().is_none_or(|(cached, _)| *cached != index) {
            let entry = fragment::lookup(&mut self.reader, &self.sb, index)?;
            let block_size = self.sb.block_size as usize;
            let data = self.reader.data_block(entry.start, entry.size, block_size)?;
            self.fragment_cache = Some((index, data));
        }
        match &self.fragment_cache {
            Some((_, data)) => Ok(data),
            None => Err(FsError::Corrupt("fragment cache empty")),
        }
    }

    /// Reads the complete contents of a regular file.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::FileTooLarge`] if the file exceeds the configured
    /// limit and [`FsError::Corrupt`] if any block fails to decompress or
    /// the assembled length differs from the inode's size. Nothing is
    /// returned on failure.
    pub fn read_file(&mut self, file: &FileInode) -> Result<Vec<u8>, FsError> {
        if file.size > self.limits.max_file_size {
            return Err(FsError::FileTooLarge {
                size: file.size,
                limit: self.limits.max_file_size,
            });
        }
        let size = usize::try_from(file.size).map_err(|_| FsError::FileTooLarge {
            size: file.size,
            limit: self.limits.max_file_size,
        })?;
        let block_size = self.sb.block_size as usize;

        let mut out = Vec::with_capacity(size);
        let mut pos = file.blocks_start;
        for &word in &file.block_sizes {
            let remaining = size - out.len();
            if remaining == 0 {
                return Err(FsError::Corrupt("more blocks than the file size needs"));
            }
            let expected = remaining.min(block_size);
            if word & DATA_SIZE_MASK == 0 {
                out.resize(out.len() + expected, 0);
                continue;
            }
            let block = self.reader.data_block(pos, word, block_size)?;
            if block.len() != expected {
                return Err(FsError::Corrupt("data block has the wrong length"));
            }
            out.extend_from_slice(&block);
            pos = pos
                .checked_add(u64::from(word & DATA_SIZE_MASK))
                .ok_or(FsError::Corrupt("data block position overflows"))?;
        }

        if file.has_fragment() {
            let tail = size - out.len();
            let start = file.fragment_offset as usize;
            let frag = self.fragment_block(file.fragment)?;
            let bytes = start
                .checked_add(tail)
                .and_then(|end| frag.get(start..end))
                .ok_or(FsError::Corrupt("file tail lies outside its fragment"))?;
            out.extend_from_slice(bytes);
        }

        if out.len() != size {
            return Err(FsError::Corrupt("file data shorter than its size"));
        }
        Ok(out)
    }

    /// Resolves `path`, following symlinks, and returns the file's bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::NotAFile`] if `path` resolves to anything other
    /// than a regular file, plus any error from [`SquashFs::resolve`] or
    /// [`SquashFs::read_file`].
    pub fn extract(&mut self, path: impl AsRef<[u8]>) -> Result<Vec<u8>, FsError> {
        let path = path.as_ref();
        let inode = self.resolve(path)?;
        let file = inode.as_file().ok_or(FsError::NotAFile)?;
        let data = self.read_file(file)?;
        log::debug!(
            "squashfs: extracted {} ({} bytes)",
            String::from_utf8_lossy(path),
            data.len()
        );
        Ok(data)
    }
}
