//! File layout of an ELF image and the offset of data appended after it.
//!
//! The ELF format has no field recording the total size of the file. The
//! last byte the ELF "owns" is the furthest end of the section header table,
//! any section's contents or any segment's file image. Whatever follows
//! (for an AppImage, a SquashFS image) starts at that offset.

use crate::header::{ElfError, ElfHeader};
use crate::section::SectionIter;
use crate::segment::{ElfFile, ProgramHeaderIter};

/// A byte range `[offset, offset + size)` within the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    /// Start of the range.
    pub offset: u64,
    /// Length of the range.
    pub size: u64,
}

impl Extent {
    /// End of the range, or `None` if `offset + size` overflows.
    #[must_use]
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }
}

/// Read-only view over the header tables of an ELF file.
///
/// Borrows the raw bytes of the section and program header tables; the rest
/// of the file is never needed, so callers working on large executables only
/// have to read the header and these two tables.
#[derive(Debug, Clone, Copy)]
pub struct ElfLayout<'a> {
    header: ElfHeader,
    section_table: &'a [u8],
    program_table: &'a [u8],
    section_stride: usize,
    program_stride: usize,
    file_len: u64,
}

impl<'a> ElfLayout<'a> {
    /// Builds a layout from a parsed header and the bytes of both tables.
    ///
    /// `file_len` is the length of the whole file, used to validate the
    /// tables and to discard entries that point past the end of the file.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::InvalidOffset`] if a table does not fit in the
    /// file or has undersized entries, and [`ElfError::Truncated`] if the
    /// supplied table bytes are shorter than the header declares.
    pub fn new(
        header: ElfHeader,
        section_table: &'a [u8],
        program_table: &'a [u8],
        file_len: u64,
    ) -> Result<Self, ElfError> {
        let sh = header.section_table();
        let ph = header.program_table();
        sh.check(header.class.shdr_size(), file_len)?;
        ph.check(header.class.phdr_size(), file_len)?;

        if (section_table.len() as u64) < sh.byte_len()
            || (program_table.len() as u64) < ph.byte_len()
        {
            return Err(ElfError::Truncated);
        }

        Ok(Self {
            header,
            section_table,
            program_table,
            section_stride: usize::from(sh.entry_size),
            program_stride: usize::from(ph.entry_size),
            file_len,
        })
    }

    /// Like [`new`](Self::new), but for tables whose entries were packed to
    /// the class's header size, dropping any padding the file declares via
    /// `e_shentsize`/`e_phentsize`.
    ///
    /// The tables must still fit in the file at their declared size.
    ///
    /// # Errors
    ///
    /// As for [`new`](Self::new), with the packed table lengths checked
    /// against `count * header size`.
    pub fn from_packed(
        header: ElfHeader,
        section_table: &'a [u8],
        program_table: &'a [u8],
        file_len: u64,
    ) -> Result<Self, ElfError> {
        let sh = header.section_table();
        let ph = header.program_table();
        let shdr_size = header.class.shdr_size();
        let phdr_size = header.class.phdr_size();
        sh.check(shdr_size, file_len)?;
        ph.check(phdr_size, file_len)?;

        if section_table.len() < shdr_size * usize::from(sh.count)
            || program_table.len() < phdr_size * usize::from(ph.count)
        {
            return Err(ElfError::Truncated);
        }

        Ok(Self {
            header,
            section_table,
            program_table,
            section_stride: shdr_size,
            program_stride: phdr_size,
            file_len,
        })
    }

    /// The parsed file header.
    #[must_use]
    pub fn header(&self) -> &ElfHeader {
        &self.header
    }

    /// Length of the file this layout was computed for.
    #[must_use]
    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    /// End of the section header table (0 if there are no sections).
    #[must_use]
    pub fn section_table_end(&self) -> u64 {
        // Validated in `new`, so this cannot overflow.
        self.header.section_table().end().unwrap_or(0)
    }

    /// File extents of every section that occupies bytes in the file.
    ///
    /// `SHT_NOBITS` and `SHT_NULL` sections are skipped.
    pub fn sections(&self) -> impl Iterator<Item = Extent> + 'a {
        let hdr = &self.header;
        SectionIter::new(
            self.section_table,
            self.section_stride,
            usize::from(hdr.e_shnum),
            hdr.class,
            hdr.endian,
        )
        .filter(|s| s.occupies_file())
        .map(|s| Extent {
            offset: s.sh_offset,
            size: s.sh_size,
        })
    }

    /// File extents of every segment (program header entry).
    pub fn segments(&self) -> impl Iterator<Item = Extent> + 'a {
        let hdr = &self.header;
        ProgramHeaderIter::new(
            self.program_table,
            self.program_stride,
            usize::from(hdr.e_phnum),
            hdr.class,
            hdr.endian,
        )
        .map(|p| Extent {
            offset: p.p_offset,
            size: p.p_filesz,
        })
    }

    /// End of `extent` if it lies within the file, `None` otherwise.
    fn end_within_file(&self, extent: Extent) -> Option<u64> {
        extent.end().filter(|&end| end <= self.file_len)
    }

    /// Furthest end of any in-bounds section, or 0.
    #[must_use]
    pub fn max_section_end(&self) -> u64 {
        self.sections()
            .filter_map(|e| self.end_within_file(e))
            .max()
            .unwrap_or(0)
    }

    /// Furthest end of any in-bounds segment, or 0.
    #[must_use]
    pub fn max_segment_end(&self) -> u64 {
        self.segments()
            .filter_map(|e| self.end_within_file(e))
            .max()
            .unwrap_or(0)
    }

    /// Offset of the first byte not covered by the ELF image.
    ///
    /// This is `max(section table end, section ends, segment ends)`, with
    /// entries that overflow or point past the end of the file ignored.
    #[must_use]
    pub fn appended_offset(&self) -> u64 {
        self.section_table_end()
            .max(self.max_section_end())
            .max(self.max_segment_end())
    }
}

impl<'a> ElfFile<'a> {
    /// Computes the layout of this in-memory ELF file.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError`] if the header tables are inconsistent with the
    /// data length.
    pub fn layout(&self) -> Result<ElfLayout<'a>, ElfError> {
        ElfLayout::new(
            *self.header(),
            self.section_table_bytes(),
            self.program_table_bytes(),
            self.raw_data().len() as u64,
        )
    }
}
