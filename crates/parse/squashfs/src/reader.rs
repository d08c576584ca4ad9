//! Positioned reads against an image embedded at an offset.
//!
//! [`ImageReader`] owns the underlying reader and translates image-relative
//! positions into absolute file positions by adding the base offset. It also
//! decodes the two on-disk block framings (metadata and data) and caches
//! decompressed metadata blocks, which are revisited constantly during path
//! resolution.

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

use crate::compress::Decompressor;
use crate::error::FsError;
use crate::metadata::{METADATA_BLOCK_SIZE, MetadataBlock};

/// Data block size word: block is stored uncompressed.
pub const DATA_UNCOMPRESSED: u32 = 1 << 24;

/// Data block size word: mask for the on-disk size.
pub const DATA_SIZE_MASK: u32 = DATA_UNCOMPRESSED - 1;

/// Metadata block header: block is stored uncompressed.
pub const METADATA_UNCOMPRESSED: u16 = 0x8000;

/// Metadata block header: mask for the on-disk size.
pub const METADATA_SIZE_MASK: u16 = 0x7FFF;

/// Number of cached metadata blocks before the cache is flushed.
const METADATA_CACHE_LIMIT: usize = 256;

/// Image-relative reader with a metadata block cache.
#[derive(Debug)]
pub(crate) struct ImageReader<R> {
    inner: R,
    base: u64,
    /// Image-relative end of valid data (`bytes_used`).
    end: u64,
    decompressor: Decompressor,
    cache: HashMap<u64, Arc<MetadataBlock>>,
}

impl<R: Read + Seek> ImageReader<R> {
    pub(crate) fn new(inner: R, base: u64, end: u64, decompressor: Decompressor) -> Self {
        Self {
            inner,
            base,
            end,
            decompressor,
            cache: HashMap::new(),
        }
    }

    pub(crate) fn base(&self) -> u64 {
        self.base
    }

    /// Reads exactly `buf.len()` bytes at image position `pos`.
    pub(crate) fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<(), FsError> {
        let end = pos
            .checked_add(buf.len() as u64)
            .ok_or(FsError::Corrupt("read position overflows"))?;
        if end > self.end {
            return Err(FsError::Corrupt("read past the end of the image"));
        }
        let abs = self
            .base
            .checked_add(pos)
            .ok_or(FsError::Corrupt("read position overflows"))?;
        self.inner.seek(SeekFrom::Start(abs))?;
        self.inner.read_exact(buf)?;
        Ok(())
    }

    /// Reads a little-endian `u64` at image position `pos`.
    pub(crate) fn read_u64_at(&mut self, pos: u64) -> Result<u64, FsError> {
        let mut b = [0u8; 8];
        self.read_at(pos, &mut b)?;
        Ok(u64::from_le_bytes(b))
    }

    /// Returns the decompressed metadata block starting at image position
    /// `pos`, reading it on a cache miss.
    pub(crate) fn metadata_block(&mut self, pos: u64) -> Result<Arc<MetadataBlock>, FsError> {
        if let Some(block) = self.cache.get(&pos) {
            return Ok(Arc::clone(block));
        }

        let mut hdr = [0u8; 2];
        self.read_at(pos, &mut hdr)?;
        let hdr = u16::from_le_bytes(hdr);
        let len = hdr & METADATA_SIZE_MASK;
        if len == 0 || usize::from(len) > METADATA_BLOCK_SIZE {
            return Err(FsError::Corrupt("bad metadata block length"));
        }

        let mut raw = vec![0u8; usize::from(len)];
        self.read_at(pos + 2, &mut raw)?;
        let data = if hdr & METADATA_UNCOMPRESSED != 0 {
            raw
        } else {
            self.decompressor.decompress(&raw, METADATA_BLOCK_SIZE)?
        };
        if data.is_empty() {
            return Err(FsError::Corrupt("empty metadata block"));
        }

        let block = Arc::new(MetadataBlock {
            data,
            next: pos + 2 + u64::from(len),
        });
        if self.cache.len() >= METADATA_CACHE_LIMIT {
            log::trace!("squashfs: flushing metadata cache");
            self.cache.clear();
        }
        self.cache.insert(pos, Arc::clone(&block));
        Ok(block)
    }

    /// Reads the data block at image position `pos` described by size word
    /// `word`, decompressing into at most `max_len` bytes.
    ///
    /// Sparse blocks (size 0) must be handled by the caller.
    pub(crate) fn data_block(
        &mut self,
        pos: u64,
        word: u32,
        max_len: usize,
    ) -> Result<Vec<u8>, FsError> {
        let len = (word & DATA_SIZE_MASK) as usize;
        if len == 0 {
            return Err(FsError::Corrupt("unexpected sparse block"));
        }
        if len > max_len {
            return Err(FsError::Corrupt("data block larger than the block size"));
        }
        let mut raw = vec![0u8; len];
        self.read_at(pos, &mut raw)?;
        if word & DATA_UNCOMPRESSED != 0 {
            Ok(raw)
        } else {
            self.decompressor.decompress(&raw, max_len)
        }
    }
}
