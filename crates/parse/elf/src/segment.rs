//! Program header (segment) iteration.
//!
//! Provides [`ElfFile`] as the entry point for an in-memory ELF image, and
//! [`ProgramHeaderIter`] for walking the raw bytes of a program header table.

use crate::header::{ElfClass, ElfError, ElfHeader, Endian};
use crate::section::SectionIter;

/// Program header type: unused entry.
pub const PT_NULL: u32 = 0;

/// Program header type: loadable segment.
pub const PT_LOAD: u32 = 1;

/// Program header type: dynamic linking information.
pub const PT_DYNAMIC: u32 = 2;

/// Program header type: interpreter path.
pub const PT_INTERP: u32 = 3;

/// Program header type: auxiliary notes.
pub const PT_NOTE: u32 = 4;

/// Parsed program header entry, widened to 64-bit fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramHeader {
    /// Segment type.
    pub p_type: u32,
    /// Segment flags (read/write/execute).
    pub p_flags: u32,
    /// Offset of the segment data in the file.
    pub p_offset: u64,
    /// Virtual address of the segment.
    pub p_vaddr: u64,
    /// Size of the segment data in the file.
    pub p_filesz: u64,
    /// Size of the segment in memory.
    pub p_memsz: u64,
}

impl ProgramHeader {
    /// Parse a program header entry from raw bytes at the given offset.
    ///
    /// The caller must ensure `offset + class.phdr_size() <= data.len()`.
    pub(crate) fn parse(data: &[u8], offset: usize, class: ElfClass, endian: Endian) -> Self {
        let b = &data[offset..];
        match class {
            // p_flags moved after p_memsz in the 32-bit layout.
            ElfClass::Elf32 => Self {
                p_type: endian.u32(b, 0),
                p_offset: u64::from(endian.u32(b, 4)),
                p_vaddr: u64::from(endian.u32(b, 8)),
                p_filesz: u64::from(endian.u32(b, 16)),
                p_memsz: u64::from(endian.u32(b, 20)),
                p_flags: endian.u32(b, 24),
            },
            ElfClass::Elf64 => Self {
                p_type: endian.u32(b, 0),
                p_flags: endian.u32(b, 4),
                p_offset: endian.u64(b, 8),
                p_vaddr: endian.u64(b, 16),
                // p_paddr at 24..32 is not needed
                p_filesz: endian.u64(b, 32),
                p_memsz: endian.u64(b, 40),
            },
        }
    }
}

/// An iterator over program headers in a program header table.
#[derive(Debug, Clone)]
pub struct ProgramHeaderIter<'a> {
    table: &'a [u8],
    entry_size: usize,
    class: ElfClass,
    endian: Endian,
    index: usize,
    count: usize,
}

impl<'a> ProgramHeaderIter<'a> {
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
            entry_size: entry_size.max(class.phdr_size()),
            class,
            endian,
            index: 0,
            count,
        }
    }
}

impl Iterator for ProgramHeaderIter<'_> {
    type Item = ProgramHeader;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.count {
            return None;
        }
        let offset = self.index * self.entry_size;
        if offset + self.class.phdr_size() > self.table.len() {
            self.index = self.count;
            return None;
        }
        let phdr = ProgramHeader::parse(self.table, offset, self.class, self.endian);
        self.index += 1;
        Some(phdr)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count.saturating_sub(self.index);
        (0, Some(remaining))
    }
}

/// A parsed ELF file held entirely in memory.
#[derive(Debug, Clone, Copy)]
pub struct ElfFile<'a> {
    pub(crate) data: &'a [u8],
    header: ElfHeader,
}

impl<'a> ElfFile<'a> {
    /// Parse an ELF file from raw bytes.
    ///
    /// Validates the file header and that both header tables lie within
    /// `data`.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError`] if the header is invalid or a table is out of
    /// bounds.
    pub fn parse(data: &'a [u8]) -> Result<Self, ElfError> {
        let header = ElfHeader::parse(data)?;
        let len = data.len() as u64;
        header.program_table().check(header.class.phdr_size(), len)?;
        header.section_table().check(header.class.shdr_size(), len)?;
        Ok(Self { data, header })
    }

    /// Returns the parsed file header.
    #[must_use]
    pub fn header(&self) -> &ElfHeader {
        &self.header
    }

    /// Returns the underlying raw ELF data.
    #[must_use]
    pub fn raw_data(&self) -> &'a [u8] {
        self.data
    }

    /// Raw bytes of the section header table (empty if there are no sections).
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "table bounds were checked against data.len() in parse"
    )]
    pub fn section_table_bytes(&self) -> &'a [u8] {
        let table = self.header.section_table();
        if table.is_empty() {
            return &[];
        }
        let start = table.offset as usize;
        &self.data[start..start + table.byte_len() as usize]
    }

    /// Raw bytes of the program header table (empty if there are no segments).
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "table bounds were checked against data.len() in parse"
    )]
    pub fn program_table_bytes(&self) -> &'a [u8] {
        let table = self.header.program_table();
        if table.is_empty() {
            return &[];
        }
        let start = table.offset as usize;
        &self.data[start..start + table.byte_len() as usize]
    }

    /// Returns an iterator over all section headers.
    #[must_use]
    pub fn sections(&self) -> SectionIter<'a> {
        let hdr = &self.header;
        SectionIter::new(
            self.section_table_bytes(),
            usize::from(hdr.e_shentsize),
            usize::from(hdr.e_shnum),
            hdr.class,
            hdr.endian,
        )
    }

    /// Returns an iterator over all program headers.
    #[must_use]
    pub fn segments(&self) -> ProgramHeaderIter<'a> {
        let hdr = &self.header;
        ProgramHeaderIter::new(
            self.program_table_bytes(),
            usize::from(hdr.e_phentsize),
            usize::from(hdr.e_phnum),
            hdr.class,
            hdr.endian,
        )
    }
}
