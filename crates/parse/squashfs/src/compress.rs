//! Block decompression.
//!
//! gzip (zlib), LZMA, XZ, LZ4 and Zstandard are supported. LZO is
//! recognised but rejected. Every call is bounded by the expected output
//! size so a malformed block cannot expand without limit.

use std::io::Read;

use flate2::read::ZlibDecoder;
use ruzstd::decoding::StreamingDecoder;
use xz2::read::XzDecoder;
use xz2::stream::Stream;

use crate::error::FsError;
use crate::superblock::Compression;

/// A decompressor for one of the supported algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decompressor {
    /// zlib stream, as written by mksquashfs `-comp gzip`.
    Gzip,
    /// Legacy `.lzma` stream with a 13-byte header.
    Lzma,
    /// XZ stream, possibly with BCJ filters.
    Xz,
    /// Raw LZ4 block.
    Lz4,
    /// One Zstandard frame.
    Zstd,
}

impl Decompressor {
    /// Selects the decompressor for `compression`.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::UnsupportedCompression`] for LZO and unknown ids.
    pub fn for_compression(compression: Compression) -> Result<Self, FsError> {
        match compression {
            Compression::Gzip => Ok(Self::Gzip),
            Compression::Lzma => Ok(Self::Lzma),
            Compression::Xz => Ok(Self::Xz),
            Compression::Lz4 => Ok(Self::Lz4),
            Compression::Zstd => Ok(Self::Zstd),
            other => Err(FsError::UnsupportedCompression(other)),
        }
    }

    /// Decompresses `input`, producing at most `max_len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::Corrupt`] if the input is not a valid stream or
    /// would decompress to more than `max_len` bytes.
    pub fn decompress(self, input: &[u8], max_len: usize) -> Result<Vec<u8>, FsError> {
        match self {
            Self::Gzip => read_bounded(ZlibDecoder::new(input), max_len, "invalid zlib stream"),
            Self::Lzma => {
                let stream = Stream::new_lzma_decoder(u64::MAX)
                    .map_err(|_| FsError::Corrupt("cannot set up lzma decoder"))?;
                let decoder = XzDecoder::new_stream(input, stream);
                read_bounded(decoder, max_len, "invalid lzma stream")
            }
            Self::Xz => read_bounded(XzDecoder::new(input), max_len, "invalid xz stream"),
            Self::Lz4 => lz4_flex::block::decompress(input, max_len)
                .map_err(|_| FsError::Corrupt("invalid lz4 block")),
            Self::Zstd => {
                let decoder = StreamingDecoder::new(input)
                    .map_err(|_| FsError::Corrupt("invalid zstd frame"))?;
                read_bounded(decoder, max_len, "invalid zstd frame")
            }
        }
    }

    /// Compresses `input` in the format this decompressor reads.
    #[cfg(any(test, feature = "builder"))]
    pub fn compress(self, input: &[u8]) -> Result<Vec<u8>, FsError> {
        use std::io::Write;

        use ruzstd::encoding::{CompressionLevel, compress_to_vec};
        use xz2::read::XzEncoder;
        use xz2::stream::LzmaOptions;

        let out = match self {
            Self::Gzip => {
                let mut enc =
                    flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::best());
                enc.write_all(input)?;
                enc.finish()?
            }
            Self::Lzma => {
                let stream = LzmaOptions::new_preset(6)
                    .and_then(|opts| Stream::new_lzma_encoder(&opts))
                    .map_err(|_| FsError::Corrupt("cannot set up lzma encoder"))?;
                let mut out = Vec::new();
                XzEncoder::new_stream(input, stream).read_to_end(&mut out)?;
                out
            }
            Self::Xz => {
                let mut out = Vec::new();
                XzEncoder::new(input, 6).read_to_end(&mut out)?;
                out
            }
            Self::Lz4 => lz4_flex::block::compress(input),
            Self::Zstd => compress_to_vec(input, CompressionLevel::Fastest),
        };
        Ok(out)
    }
}

/// Drains `reader`, failing if it yields more than `max_len` bytes.
fn read_bounded(reader: impl Read, max_len: usize, what: &'static str) -> Result<Vec<u8>, FsError> {
    let mut out = Vec::with_capacity(max_len);
    reader
        .take(max_len as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|_| FsError::Corrupt(what))?;
    if out.len() > max_len {
        return Err(FsError::Corrupt("block decompresses past its limit"));
    }
    Ok(out)
}
