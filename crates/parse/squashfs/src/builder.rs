//! SquashFS image writer for tests and fixtures.
//!
//! Produces small but complete SquashFS 4.0 images: data blocks (compressed,
//! stored or sparse), optional tail fragments, an inode table using basic or
//! extended inodes, a directory table, a fragment table and a one-entry ID
//! table. Ownership is always root and timestamps are zero, so output is
//! reproducible.
//!
//! # Example
//!
//! ```ignore
//! use diricon_squashfs::builder::ImageBuilder;
//! use diricon_squashfs::{Compression, SquashFs};
//!
//! let image = ImageBuilder::new(Compression::Gzip)
//!     .file("usr/share/icons/app.png", b"\x89PNG...")
//!     .symlink(".DirIcon", "usr/share/icons/app.png")
//!     .build()
//!     .unwrap();
//! let mut fs = SquashFs::new(std::io::Cursor::new(image), 0).unwrap();
//! assert_eq!(fs.extract("/.DirIcon").unwrap(), b"\x89PNG...");
//! ```

use std::collections::BTreeMap;

use crate::compress::Decompressor;
use crate::dir::MAX_ENTRIES_PER_HEADER;
use crate::error::FsError;
use crate::inode::{InodeRef, NO_FRAGMENT, types};
use crate::metadata::METADATA_BLOCK_SIZE;
use crate::path::components;
use crate::reader::{DATA_UNCOMPRESSED, METADATA_UNCOMPRESSED};
use crate::superblock::{Compression, NO_TABLE, SUPERBLOCK_SIZE, Superblock, flags};

/// Absent xattr index in extended inodes.
const NO_XATTR: u32 = u32::MAX;

#[derive(Debug, Clone)]
enum Node {
    File(Vec<u8>),
    Symlink(Vec<u8>),
    Dir(BTreeMap<Vec<u8>, Node>),
    Fifo,
}

impl Node {
    fn basic_type(&self) -> u16 {
        match self {
            Self::File(_) => types::FILE,
            Self::Symlink(_) => types::SYMLINK,
            Self::Dir(_) => types::DIR,
            Self::Fifo => types::FIFO,
        }
    }

    /// Number of inodes in this subtree, including itself.
    fn count(&self) -> u32 {
        match self {
            Self::Dir(children) => 1 + children.values().map(Node::count).sum::<u32>(),
            _ => 1,
        }
    }
}

/// Where a file's data landed in the data area.
#[derive(Debug, Clone)]
struct FileLayout {
    blocks_start: u64,
    block_sizes: Vec<u32>,
    fragment: u32,
    fragment_offset: u32,
}

/// Accumulates a metadata table as a chain of 8 KiB blocks.
struct MetadataWriter {
    compressor: Option<Decompressor>,
    out: Vec<u8>,
    buf: Vec<u8>,
    /// On-disk offset of every flushed block, relative to the table.
    block_starts: Vec<u64>,
}

impl MetadataWriter {
    fn new(compressor: Option<Decompressor>) -> Self {
        Self {
            compressor,
            out: Vec::new(),
            buf: Vec::new(),
            block_starts: Vec::new(),
        }
    }

    /// Position the next write will land at: (block, offset).
    fn position(&self) -> (u32, u16) {
        (self.out.len() as u32, self.buf.len() as u16)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), FsError> {
        self.buf.extend_from_slice(bytes);
        while self.buf.len() >= METADATA_BLOCK_SIZE {
            let rest = self.buf.split_off(METADATA_BLOCK_SIZE);
            let block = core::mem::replace(&mut self.buf, rest);
            self.flush_block(&block)?;
        }
        Ok(())
    }

    fn flush_block(&mut self, block: &[u8]) -> Result<(), FsError> {
        self.block_starts.push(self.out.len() as u64);
        let packed = match self.compressor {
            Some(c) => Some(c.compress(block)?).filter(|p| p.len() < block.len()),
            None => None,
        };
        match packed {
            Some(p) => {
                self.out.extend_from_slice(&(p.len() as u16).to_le_bytes());
                self.out.extend_from_slice(&p);
            }
            None => {
                let hdr = block.len() as u16 | METADATA_UNCOMPRESSED;
                self.out.extend_from_slice(&hdr.to_le_bytes());
                self.out.extend_from_slice(block);
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<(Vec<u8>, Vec<u64>), FsError> {
        if !self.buf.is_empty() {
            let block = core::mem::take(&mut self.buf);
            self.flush_block(&block)?;
        }
        Ok((self.out, self.block_starts))
    }
}

/// Builder for SquashFS 4.0 images.
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    compression: Compression,
    block_size: u32,
    fragments: bool,
    extended: bool,
    store: bool,
    root: BTreeMap<Vec<u8>, Node>,
}

impl ImageBuilder {
    /// Starts an empty image using `compression` and 128 KiB blocks.
    #[must_use]
    pub fn new(compression: Compression) -> Self {
        Self {
            compression,
            block_size: 128 * 1024,
            fragments: true,
            extended: false,
            store: false,
            root: BTreeMap::new(),
        }
    }

    /// Sets the data block size. Must be a power of two in 4 KiB..=1 MiB.
    #[must_use]
    pub fn block_size(mut self, size: u32) -> Self {
        self.block_size = size;
        self
    }

    /// Packs file tails into fragments (on by default).
    #[must_use]
    pub fn fragments(mut self, on: bool) -> Self {
        self.fragments = on;
        self
    }

    /// Writes every inode in its extended form.
    #[must_use]
    pub fn extended_inodes(mut self, on: bool) -> Self {
        self.extended = on;
        self
    }

    /// Stores data and metadata without compression.
    #[must_use]
    pub fn stored(mut self, on: bool) -> Self {
        self.store = on;
        self
    }

    /// Inserts `node` at `path`, creating (or replacing with) directories
    /// along the way.
    fn insert(mut self, path: &str, node: Node) -> Self {
        let parts: Vec<&[u8]> = components(path.as_bytes()).collect();
        insert_at(&mut self.root, &parts, node);
        self
    }

    /// Adds a regular file.
    #[must_use]
    pub fn file(self, path: &str, data: impl Into<Vec<u8>>) -> Self {
        self.insert(path, Node::File(data.into()))
    }

    /// Adds a symlink pointing at `target`.
    #[must_use]
    pub fn symlink(self, path: &str, target: impl Into<Vec<u8>>) -> Self {
        self.insert(path, Node::Symlink(target.into()))
    }

    /// Adds an empty directory.
    #[must_use]
    pub fn dir(self, path: &str) -> Self {
        self.insert(path, Node::Dir(BTreeMap::new()))
    }

    /// Adds a named pipe.
    #[must_use]
    pub fn fifo(self, path: &str) -> Self {
        self.insert(path, Node::Fifo)
    }

    /// Serializes the image.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::InvalidBlockSize`] or
    /// [`FsError::UnsupportedCompression`] for settings the reader would
    /// reject.
    pub fn build(&self) -> Result<Vec<u8>, FsError> {
        if !self.block_size.is_power_of_two() || !(4096..=1 << 20).contains(&self.block_size) {
            return Err(FsError::InvalidBlockSize(self.block_size));
        }
        let codec = Decompressor::for_compression(self.compression)?;
        let codec = (!self.store).then_some(codec);

        let mut w = Writer {
            b: self,
            codec,
            image: vec![0u8; SUPERBLOCK_SIZE],
            layouts: Vec::new(),
            next_layout: 0,
            frag_buf: Vec::new(),
            frag_entries: Vec::new(),
            inodes: MetadataWriter::new(codec),
            dirs: MetadataWriter::new(codec),
        };

        let root = Node::Dir(self.root.clone());
        w.write_data(&root)?;
        w.flush_fragment()?;

        let inode_count = root.count();
        let (root_ref, _, _) = w.write_inodes(&root, 1, inode_count + 1)?;
        let Writer {
            mut image,
            frag_entries,
            inodes,
            dirs,
            ..
        } = w;

        let inode_table_start = image.len() as u64;
        let (inode_bytes, _) = inodes.finish()?;
        image.extend_from_slice(&inode_bytes);

        let directory_table_start = image.len() as u64;
        let (dir_bytes, _) = dirs.finish()?;
        image.extend_from_slice(&dir_bytes);

        let fragment_table_start = if frag_entries.is_empty() {
            NO_TABLE
        } else {
            let mut table = MetadataWriter::new(codec);
            for (start, size) in &frag_entries {
                table.write(&start.to_le_bytes())?;
                table.write(&size.to_le_bytes())?;
                table.write(&0u32.to_le_bytes())?;
            }
            write_indexed_table(&mut image, table)?
        };

        let mut ids = MetadataWriter::new(codec);
        ids.write(&0u32.to_le_bytes())?;
        let id_table_start = write_indexed_table(&mut image, ids)?;

        let mut sb_flags = flags::NO_XATTRS;
        if self.store {
            sb_flags |= flags::UNCOMPRESSED_INODES
                | flags::UNCOMPRESSED_DATA
                | flags::UNCOMPRESSED_FRAGMENTS
                | flags::UNCOMPRESSED_IDS;
        }
        if !self.fragments {
            sb_flags |= flags::NO_FRAGMENTS;
        }

        let sb = Superblock {
            inode_count,
            mod_time: 0,
            block_size: self.block_size,
            fragment_count: frag_entries.len() as u32,
            compression: self.compression,
            block_log: self.block_size.trailing_zeros() as u16,
            flags: sb_flags,
            id_count: 1,
            version_major: 4,
            version_minor: 0,
            root_inode: root_ref,
            bytes_used: image.len() as u64,
            id_table_start,
            xattr_id_table_start: NO_TABLE,
            inode_table_start,
            directory_table_start,
            fragment_table_start,
            export_table_start: NO_TABLE,
        };
        image[..SUPERBLOCK_SIZE].copy_from_slice(&sb.to_bytes());
        Ok(image)
    }
}

fn insert_at(dir: &mut BTreeMap<Vec<u8>, Node>, parts: &[&[u8]], node: Node) {
    match parts {
        [] => {}
        [last] => {
            dir.insert(last.to_vec(), node);
        }
        [first, rest @ ..] => {
            let entry = dir
                .entry(first.to_vec())
                .or_insert_with(|| Node::Dir(BTreeMap::new()));
            if !matches!(entry, Node::Dir(_)) {
                *entry = Node::Dir(BTreeMap::new());
            }
            if let Node::Dir(children) = entry {
                insert_at(children, rest, node);
            }
        }
    }
}

/// Appends a metadata table followed by its `u64` block index, returning
/// the position of the index.
fn write_indexed_table(image: &mut Vec<u8>, table: MetadataWriter) -> Result<u64, FsError> {
    let start = image.len() as u64;
    let (bytes, blocks) = table.finish()?;
    image.extend_from_slice(&bytes);
    let index = image.len() as u64;
    for block in blocks {
        image.extend_from_slice(&(start + block).to_le_bytes());
    }
    Ok(index)
}

struct Writer<'a> {
    b: &'a ImageBuilder,
    codec: Option<Decompressor>,
    image: Vec<u8>,
    layouts: Vec<FileLayout>,
    next_layout: usize,
    frag_buf: Vec<u8>,
    frag_entries: Vec<(u64, u32)>,
    inodes: MetadataWriter,
    dirs: MetadataWriter,
}

impl Writer<'_> {
    /// Writes one data block, returning its size word.
    fn write_block(&mut self, chunk: &[u8]) -> Result<u32, FsError> {
        if chunk.iter().all(|&b| b == 0) {
            return Ok(0);
        }
        let packed = match self.codec {
            Some(c) => Some(c.compress(chunk)?).filter(|p| p.len() < chunk.len()),
            None => None,
        };
        Ok(match packed {
            Some(p) => {
                self.image.extend_from_slice(&p);
                p.len() as u32
            }
            None => {
                self.image.extend_from_slice(chunk);
                chunk.len() as u32 | DATA_UNCOMPRESSED
            }
        })
    }

    fn flush_fragment(&mut self) -> Result<(), FsError> {
        if self.frag_buf.is_empty() {
            return Ok(());
        }
        let start = self.image.len() as u64;
        let buf = core::mem::take(&mut self.frag_buf);
        // A fragment block is never sparse.
        let word = match self.write_block(&buf)? {
            0 => {
                self.image.extend_from_slice(&buf);
                buf.len() as u32 | DATA_UNCOMPRESSED
            }
            w => w,
        };
        self.frag_entries.push((start, word));
        Ok(())
    }

    /// Data pass: lays out every file's blocks, depth first in name order.
    fn write_data(&mut self, node: &Node) -> Result<(), FsError> {
        match node {
            Node::Dir(children) => {
                for child in children.values() {
                    self.write_data(child)?;
                }
            }
            Node::File(data) => {
                let bs = self.b.block_size as usize;
                let tail_len = data.len() % bs;
                let use_fragment = self.b.fragments && tail_len != 0;
                let full_len = if use_fragment {
                    data.len() - tail_len
                } else {
                    data.len()
                };

                let blocks_start = self.image.len() as u64;
                let mut block_sizes = Vec::new();
                for chunk in data[..full_len].chunks(bs) {
                    block_sizes.push(self.write_block(chunk)?);
                }

                let (fragment, fragment_offset) = if use_fragment {
                    if self.frag_buf.len() + tail_len > bs {
                        self.flush_fragment()?;
                    }
                    let offset = self.frag_buf.len() as u32;
                    self.frag_buf.extend_from_slice(&data[full_len..]);
                    (self.frag_entries.len() as u32, offset)
                } else {
                    (NO_FRAGMENT, 0)
                };

                self.layouts.push(FileLayout {
                    blocks_start,
                    block_sizes,
                    fragment,
                    fragment_offset,
                });
            }
            Node::Symlink(_) | Node::Fifo => {}
        }
        Ok(())
    }

    fn inode_header(&mut self, ty: u16, mode: u16, number: u32) -> Result<InodeRef, FsError> {
        let (block, offset) = self.inodes.position();
        let mut h = Vec::with_capacity(16);
        h.extend_from_slice(&ty.to_le_bytes());
        h.extend_from_slice(&mode.to_le_bytes());
        h.extend_from_slice(&0u16.to_le_bytes());
        h.extend_from_slice(&0u16.to_le_bytes());
        h.extend_from_slice(&0u32.to_le_bytes());
        h.extend_from_slice(&number.to_le_bytes());
        self.inodes.write(&h)?;
        Ok(InodeRef::new(block, offset))
    }

    /// Inode pass, post-order. Returns the node's reference, inode number
    /// and listing type.
    fn write_inodes(
        &mut self,
        node: &Node,
        first: u32,
        parent: u32,
    ) -> Result<(InodeRef, u32, u16), FsError> {
        let number = first + node.count() - 1;
        let ext = u16::from(self.b.extended) * types::EXTENDED_DELTA;

        let iref = match node {
            Node::Dir(children) => {
                let mut listed = Vec::with_capacity(children.len());
                let mut next = first;
                for (name, child) in children {
                    let (r, n, t) = self.write_inodes(child, next, number)?;
                    next += child.count();
                    listed.push((name.as_slice(), r, n, t));
                }

                let (start_block, offset) = self.dirs.position();
                let listing = encode_listing(&listed);
                self.dirs.write(&listing)?;
                let size = listing.len() as u32 + 3;
                let subdirs = children
                    .values()
                    .filter(|c| matches!(c, Node::Dir(_)))
                    .count();
                let nlink = 2 + subdirs as u32;

                if self.b.extended || size > u32::from(u16::MAX) {
                    let r = self.inode_header(types::EXT_DIR, 0o755, number)?;
                    let mut body = Vec::new();
                    body.extend_from_slice(&nlink.to_le_bytes());
                    body.extend_from_slice(&size.to_le_bytes());
                    body.extend_from_slice(&start_block.to_le_bytes());
                    body.extend_from_slice(&parent.to_le_bytes());
                    body.extend_from_slice(&0u16.to_le_bytes());
                    body.extend_from_slice(&offset.to_le_bytes());
                    body.extend_from_slice(&NO_XATTR.to_le_bytes());
                    self.inodes.write(&body)?;
                    r
                } else {
                    let r = self.inode_header(types::DIR, 0o755, number)?;
                    let mut body = Vec::new();
                    body.extend_from_slice(&start_block.to_le_bytes());
                    body.extend_from_slice(&nlink.to_le_bytes());
                    body.extend_from_slice(&(size as u16).to_le_bytes());
                    body.extend_from_slice(&offset.to_le_bytes());
                    body.extend_from_slice(&parent.to_le_bytes());
                    self.inodes.write(&body)?;
                    r
                }
            }
            Node::File(data) => {
                let layout = self
                    .layouts
                    .get(self.next_layout)
                    .cloned()
                    .ok_or(FsError::Corrupt("file missing from the data pass"))?;
                self.next_layout += 1;
                let size = data.len() as u64;
                let mut body = Vec::new();
                let r = if self.b.extended
                    || size > u64::from(u32::MAX)
                    || layout.blocks_start > u64::from(u32::MAX)
                {
                    let r = self.inode_header(types::EXT_FILE, 0o644, number)?;
                    body.extend_from_slice(&layout.blocks_start.to_le_bytes());
                    body.extend_from_slice(&size.to_le_bytes());
                    body.extend_from_slice(&0u64.to_le_bytes());
                    body.extend_from_slice(&1u32.to_le_bytes());
                    body.extend_from_slice(&layout.fragment.to_le_bytes());
                    body.extend_from_slice(&layout.fragment_offset.to_le_bytes());
                    body.extend_from_slice(&NO_XATTR.to_le_bytes());
                    r
                } else {
                    let r = self.inode_header(types::FILE, 0o644, number)?;
                    body.extend_from_slice(&(layout.blocks_start as u32).to_le_bytes());
                    body.extend_from_slice(&layout.fragment.to_le_bytes());
                    body.extend_from_slice(&layout.fragment_offset.to_le_bytes());
                    body.extend_from_slice(&(size as u32).to_le_bytes());
                    r
                };
                for word in &layout.block_sizes {
                    body.extend_from_slice(&word.to_le_bytes());
                }
                self.inodes.write(&body)?;
                r
            }
            Node::Symlink(target) => {
                let r = self.inode_header(types::SYMLINK + ext, 0o777, number)?;
                let mut body = Vec::new();
                body.extend_from_slice(&1u32.to_le_bytes());
                body.extend_from_slice(&(target.len() as u32).to_le_bytes());
                body.extend_from_slice(target);
                if self.b.extended {
                    body.extend_from_slice(&NO_XATTR.to_le_bytes());
                }
                self.inodes.write(&body)?;
                r
            }
            Node::Fifo => {
                let r = self.inode_header(types::FIFO + ext, 0o644, number)?;
                self.inodes.write(&1u32.to_le_bytes())?;
                if self.b.extended {
                    self.inodes.write(&NO_XATTR.to_le_bytes())?;
                }
                r
            }
        };

        Ok((iref, number, node.basic_type()))
    }
}

/// Encodes directory entries, starting a new header whenever the inode
/// block changes, a header fills up, or the number delta leaves `i16`.
fn encode_listing(entries: &[(&[u8], InodeRef, u32, u16)]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < entries.len() {
        let (_, first_ref, base, _) = entries[i];
        let run = entries[i..]
            .iter()
            .take(MAX_ENTRIES_PER_HEADER as usize)
            .take_while(|(_, r, n, _)| {
                r.block() == first_ref.block()
                    && i16::try_from(i64::from(*n) - i64::from(base)).is_ok()
            })
            .count();

        out.extend_from_slice(&(run as u32 - 1).to_le_bytes());
        out.extend_from_slice(&(first_ref.block() as u32).to_le_bytes());
        out.extend_from_slice(&base.to_le_bytes());
        for (name, r, n, t) in &entries[i..i + run] {
            let delta = (i64::from(*n) - i64::from(base)) as i16;
            out.extend_from_slice(&r.offset().to_le_bytes());
            out.extend_from_slice(&delta.to_le_bytes());
            out.extend_from_slice(&t.to_le_bytes());
            out.extend_from_slice(&(name.len() as u16 - 1).to_le_bytes());
            out.extend_from_slice(name);
        }
        i += run;
    }
    out
}
