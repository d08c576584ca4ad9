//! Fixture builders shared by the integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub const SHT_NULL: u32 = 0;
pub const SHT_PROGBITS: u32 = 1;
pub const SHT_NOBITS: u32 = 8;
pub const PT_LOAD: u32 = 1;

/// Fake PNG payload: a real signature followed by compressible filler.
pub fn png() -> Vec<u8> {
    let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
    data.extend(std::iter::repeat_n(b"IDAT rows ".as_slice(), 600).flatten());
    data
}

/// Minimal ELF writer: header, program headers, body, then section headers.
pub struct ElfWriter {
    is64: bool,
    big: bool,
    body_len: u64,
    padding: u64,
    segments: Vec<(u32, u64, u64)>,
    sections: Vec<(u32, u64, u64)>,
}

impl ElfWriter {
    pub fn new(is64: bool, big: bool) -> Self {
        Self {
            is64,
            big,
            body_len: 0,
            padding: 0,
            segments: Vec::new(),
            sections: Vec::new(),
        }
    }

    fn ehdr_size(&self) -> u64 {
        if self.is64 { 64 } else { 52 }
    }

    fn phdr_size(&self) -> u64 {
        if self.is64 { 56 } else { 32 }
    }

    fn shdr_size(&self) -> u64 {
        if self.is64 { 64 } else { 40 }
    }

    /// Declares `e_phentsize`/`e_shentsize` larger than the class minimum;
    /// the extra bytes of every entry are filled with 0xFF.
    pub fn entry_padding(mut self, bytes: u64) -> Self {
        self.padding = bytes;
        self
    }

    fn phent(&self) -> u64 {
        self.phdr_size() + self.padding
    }

    fn shent(&self) -> u64 {
        self.shdr_size() + self.padding
    }

    pub fn body(mut self, len: u64) -> Self {
        self.body_len = len;
        self
    }

    pub fn segment(mut self, p_type: u32, offset: u64, filesz: u64) -> Self {
        self.segments.push((p_type, offset, filesz));
        self
    }

    pub fn section(mut self, sh_type: u32, offset: u64, size: u64) -> Self {
        self.sections.push((sh_type, offset, size));
        self
    }

    /// File offset where the body starts.
    pub fn body_offset(&self) -> u64 {
        self.ehdr_size() + self.phent() * self.segments.len() as u64
    }

    fn put(&self, buf: &mut [u8], off: usize, value: u64, width: usize) {
        let bytes = if self.big {
            value.to_be_bytes()[8 - width..].to_vec()
        } else {
            value.to_le_bytes()[..width].to_vec()
        };
        buf[off..off + width].copy_from_slice(&bytes);
    }

    fn word(&self) -> usize {
        if self.is64 { 8 } else { 4 }
    }

    pub fn finish(self) -> Vec<u8> {
        let phoff = self.ehdr_size();
        let body = self.body_offset();
        let shoff = body + self.body_len;
        let len = shoff + self.shent() * self.sections.len() as u64;
        let mut buf = vec![0u8; len as usize];
        let w = self.word();

        buf[..4].copy_from_slice(b"\x7fELF");
        buf[4] = if self.is64 { 2 } else { 1 };
        buf[5] = if self.big { 2 } else { 1 };
        buf[6] = 1;
        self.put(&mut buf, 16, 2, 2);
        self.put(&mut buf, 18, 0x3e, 2);
        self.put(&mut buf, 20, 1, 4);
        self.put(&mut buf, 24, 0x40_1000, w);
        let phoff_field = if self.is64 { 32 } else { 28 };
        let sizes = if self.is64 { 52 } else { 40 };
        if !self.segments.is_empty() {
            self.put(&mut buf, phoff_field, phoff, w);
        }
        if !self.sections.is_empty() {
            self.put(&mut buf, phoff_field + w, shoff, w);
        }
        self.put(&mut buf, sizes, self.ehdr_size(), 2);
        self.put(&mut buf, sizes + 2, self.phent(), 2);
        self.put(&mut buf, sizes + 4, self.segments.len() as u64, 2);
        self.put(&mut buf, sizes + 6, self.shent(), 2);
        self.put(&mut buf, sizes + 8, self.sections.len() as u64, 2);

        for (i, &(p_type, offset, filesz)) in self.segments.iter().enumerate() {
            let at = (phoff + self.phent() * i as u64) as usize;
            buf[at + self.phdr_size() as usize..at + self.phent() as usize].fill(0xFF);
            self.put(&mut buf, at, u64::from(p_type), 4);
            if self.is64 {
                self.put(&mut buf, at + 8, offset, 8);
                self.put(&mut buf, at + 32, filesz, 8);
                self.put(&mut buf, at + 40, filesz, 8);
            } else {
                self.put(&mut buf, at + 4, offset, 4);
                self.put(&mut buf, at + 16, filesz, 4);
                self.put(&mut buf, at + 20, filesz, 4);
            }
        }

        for (i, &(sh_type, offset, size)) in self.sections.iter().enumerate() {
            let at = (shoff + self.shent() * i as u64) as usize;
            buf[at + self.shdr_size() as usize..at + self.shent() as usize].fill(0xFF);
            self.put(&mut buf, at + 4, u64::from(sh_type), 4);
            if self.is64 {
                self.put(&mut buf, at + 24, offset, 8);
                self.put(&mut buf, at + 32, size, 8);
            } else {
                self.put(&mut buf, at + 16, offset, 4);
                self.put(&mut buf, at + 20, size, 4);
            }
        }
        buf
    }
}

/// A plausible AppImage runtime: two loadable segments, a code section, a
/// `.bss` section and a trailing section header table.
pub fn runtime(is64: bool, big: bool) -> Vec<u8> {
    let w = ElfWriter::new(is64, big)
        .segment(PT_LOAD, 0, 0)
        .segment(PT_LOAD, 0, 0);
    let body = w.body_offset();
    ElfWriter::new(is64, big)
        .segment(PT_LOAD, 0, body + 0x100)
        .segment(PT_LOAD, body + 0x100, 0x100)
        .body(0x200)
        .section(SHT_NULL, 0, 0)
        .section(SHT_PROGBITS, body, 0x180)
        .section(SHT_NOBITS, body + 0x200, 0x10_0000)
        .finish()
}

/// Writes `runtime ++ image` to `dir/name` and returns the path.
pub fn write_appimage(dir: &Path, name: &str, runtime: &[u8], image: &[u8]) -> PathBuf {
    let path = dir.join(name);
    let mut data = runtime.to_vec();
    data.extend_from_slice(image);
    fs::write(&path, data).expect("write fixture");
    path
}
