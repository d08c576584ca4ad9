//! Metadata block streams.
//!
//! Inodes, directory listings, the fragment table and the ID table are
//! stored as a chain of metadata blocks of up to 8 KiB each. A structure
//! may straddle two blocks, so reads go through [`MetadataCursor`], which
//! moves to the following block when the current one is exhausted.

use std::io::{Read, Seek};
use std::sync::Arc;

use crate::error::FsError;
use crate::reader::ImageReader;

/// Maximum decompressed size of a metadata block.
pub const METADATA_BLOCK_SIZE: usize = 8192;

/// A decompressed metadata block.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct MetadataBlock {
    /// Decompressed contents.
    pub(crate) data: Vec<u8>,
    /// Image position of the block that follows this one.
    pub(crate) next: u64,
}

/// Sequential reader over a chain of metadata blocks.
pub(crate) struct MetadataCursor<'a, R> {
    reader: &'a mut ImageReader<R>,
    block: Arc<MetadataBlock>,
    offset: usize,
}

impl<'a, R: Read + Seek> MetadataCursor<'a, R> {
    /// Opens a cursor at byte `offset` of the block at image position `pos`.
    pub(crate) fn new(
        reader: &'a mut ImageReader<R>,
        pos: u64,
        offset: usize,
    ) -> Result<Self, FsError> {
        let block = reader.metadata_block(pos)?;
        if offset > block.data.len() {
            return Err(FsError::Corrupt("metadata offset past end of block"));
        }
        Ok(Self {
            reader,
            block,
            offset,
        })
    }

    fn advance(&mut self) -> Result<(), FsError> {
        self.block = self.reader.metadata_block(self.block.next)?;
        self.offset = 0;
        Ok(())
    }

    /// Fills `buf` completely, crossing block boundaries as needed.
    pub(crate) fn read_exact(&mut self, mut buf: &mut [u8]) -> Result<(), FsError> {
        while !buf.is_empty() {
            if self.offset == self.block.data.len() {
                self.advance()?;
            }
            let avail = &self.block.data[self.offset..];
            let n = avail.len().min(buf.len());
            buf[..n].copy_from_slice(&avail[..n]);
            self.offset += n;
            buf = &mut buf[n..];
        }
        Ok(())
    }

    /// Reads `len` bytes into a new buffer.
    pub(crate) fn read_vec(&mut self, len: usize) -> Result<Vec<u8>, FsError> {
        let mut v = vec![0u8; len];
        self.read_exact(&mut v)?;
        Ok(v)
    }

    /// Discards `len` bytes.
    #[cfg(test)]
    pub(crate) fn skip(&mut self, mut len: usize) -> Result<(), FsError> {
        while len > 0 {
            if self.offset == self.block.data.len() {
                self.advance()?;
            }
            let n = (self.block.data.len() - self.offset).min(len);
            self.offset += n;
            len -= n;
        }
        Ok(())
    }

    pub(crate) fn u16(&mut self) -> Result<u16, FsError> {
        let mut b = [0u8; 2];
        self.read_exact(&mut b)?;
        Ok(u16::from_le_bytes(b))
    }

    pub(crate) fn i16(&mut self) -> Result<i16, FsError> {
        let mut b = [0u8; 2];
        self.read_exact(&mut b)?;
        Ok(i16::from_le_bytes(b))
    }

    pub(crate) fn u32(&mut self) -> Result<u32, FsError> {
        let mut b = [0u8; 4];
        self.read_exact(&mut b)?;
        Ok(u32::from_le_bytes(b))
    }

    pub(crate) fn u64(&mut self) -> Result<u64, FsError> {
        let mut b = [0u8; 8];
        self.read_exact(&mut b)?;
        Ok(u64::from_le_bytes(b))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::compress::Decompressor;
    use crate::reader::METADATA_UNCOMPRESSED;

    /// Two uncompressed blocks: "abcd" then "efgh".
    fn chain() -> ImageReader<Cursor<Vec<u8>>> {
        let mut data = Vec::new();
        for part in [b"abcd", b"efgh"] {
            data.extend_from_slice(&(METADATA_UNCOMPRESSED | 4).to_le_bytes());
            data.extend_from_slice(part);
        }
        let len = data.len() as u64;
        ImageReader::new(Cursor::new(data), 0, len, Decompressor::Gzip)
    }

    #[test]
    fn reads_cross_block_boundaries() {
        let mut r = chain();
        let mut c = MetadataCursor::new(&mut r, 0, 2).expect("cursor");
        assert_eq!(c.read_vec(4).expect("read"), b"cdef");
        assert_eq!(c.u16().expect("u16"), u16::from_le_bytes(*b"gh"));
    }

    #[test]
    fn skip_then_read() {
        let mut r = chain();
        let mut c = MetadataCursor::new(&mut r, 0, 0).expect("cursor");
        c.skip(5).expect("skip");
        assert_eq!(c.read_vec(3).expect("read"), b"fgh");
    }

    #[test]
    fn reading_past_chain_fails() {
        let mut r = chain();
        let mut c = MetadataCursor::new(&mut r, 6, 0).expect("cursor");
        assert!(c.u64().is_err());
    }

    #[test]
    fn offset_past_block_is_corrupt() {
        let mut r = chain();
        assert!(matches!(
            MetadataCursor::new(&mut r, 0, 5),
            Err(FsError::Corrupt(_))
        ));
    }
}
