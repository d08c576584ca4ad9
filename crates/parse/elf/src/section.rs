//! Section header parsing.
//!
//! Section headers are parsed zero-copy from the raw bytes of the section
//! header table, for either ELF class.

use crate::header::{ElfClass, Endian};

/// Section type: inactive entry.
pub const SHT_NULL: u32 = 0;

/// Section type: program-defined contents.
pub const SHT_PROGBITS: u32 = 1;

/// Section type: string table.
pub const SHT_STRTAB: u32 = 3;

/// Section type: occupies no file space (`.bss`).
pub const SHT_NOBITS: u32 = 8;

/// Parsed section header entry, widened to 64-bit fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader {
    /// Offset into the section header string table for this section's name.
    pub sh_name: u32,
    /// Section type (`SHT_PROGBITS`, `SHT_NOBITS`, etc.).
    pub sh_type: u32,
    /// Section flags.
    pub sh_flags: u64,
    /// Virtual address of the section in memory (0 for non-loaded sections).
    pub sh_addr: u64,
    /// File offset of the section data.
    pub sh_offset: u64,
    /// Size of the section in bytes.
    pub sh_size: u64,
}

impl SectionHeader {
    /// Parse a section header from raw bytes at the given offset.
    ///
    /// The caller must ensure `offset + class.shdr_size() <= data.len()`.
    pub(crate) fn parse(data: &[u8], offset: usize, class: ElfClass, endian: Endian) -> Self {
        let b = &data[offset..];
        match class {
            ElfClass::Elf32 => Self {
                sh_name: endian.u32(b, 0),
                sh_type: endian.u32(b, 4),
                sh_flags: u64::from(endian.u32(b, 8)),
                sh_addr: u64::from(endian.u32(b, 12)),
                sh_offset: u64::from(endian.u32(b, 16)),
                sh_size: u64::from(endian.u32(b, 20)),
            },
            ElfClass::Elf64 => Self {
                sh_name: endian.u32(b, 0),
                sh_type: endian.u32(b, 4),
                sh_flags: endian.u64(b, 8),
                sh_addr: endian.u64(b, 16),
                sh_offset: endian.u64(b, 24),
                sh_size: endian.u64(b, 32),
            },
        }
    }

    /// Returns `true` if the section's bytes are present in the file.
    #[must_use]
    pub fn occupies_file(&self) -> bool {
        self.sh_type != SHT_NOBITS && self.sh_type != SHT_NULL
    }
}

/// An iterator over section headers in a section header table.
#[derive(Debug, Clone)]
pub struct SectionIter<'a> {
    table: &'a [u8],
    entry_size: usize,
    class: ElfClass,
    endian: Endian,
    index: usize,
    count: usize,
}

impl<'a> SectionIter<'a> {
    /// Creates an iterator over `count` entries of `entry_size` bytes in `table`.
    ///
    /// Entries that would run past the end of `table` are not yielded.
    #[must_use]
    pub fn new(
        table: &'a [u8],
        entry_size: usize,
        count: usize,
        class: ElfClass,
        endian: Endian,
    ) -> Self {
        Self {
            table,
            entry_size: entry_size.max(class.shdr_size()),
            class,
            endian,
            index: 0,
            count,
        }
    }
}

impl Iterator for SectionIter<'_> {
    type Item = SectionHeader;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.count {
            return None;
        }
        let offset = self.index * self.entry_size;
        if offset + self.class.shdr_size() > self.table.len() {
            self.index = self.count;
            return None;
        }
        let hdr = SectionHeader::parse(self.table, offset, self.class, self.endian);
        self.index += 1;
        Some(hdr)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count.saturating_sub(self.index);
        (0, Some(remaining))
    }
}
