//! ELF file header parsing.
//!
//! Parses the ELF identification bytes and the class-dependent file header
//! from raw byte slices. Both `ELFCLASS32` and `ELFCLASS64` layouts are
//! understood, in either byte order, since the header only tells us where
//! the section and program header tables live.

use core::fmt;

/// ELF magic bytes: `\x7fELF`.
pub const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

/// ELF class: 32-bit.
const ELFCLASS32: u8 = 1;

/// ELF class: 64-bit.
const ELFCLASS64: u8 = 2;

/// ELF data encoding: little-endian.
const ELFDATA2LSB: u8 = 1;

/// ELF data encoding: big-endian.
const ELFDATA2MSB: u8 = 2;

/// Size of the `e_ident` array shared by both classes.
pub const EI_NIDENT: usize = 16;

/// Size of an ELF32 file header (52 bytes).
const ELF32_EHDR_SIZE: usize = 52;

/// Size of an ELF64 file header (64 bytes).
pub const ELF64_EHDR_SIZE: usize = 64;

/// Size of an ELF32 program header entry (32 bytes).
const ELF32_PHDR_SIZE: usize = 32;

/// Size of an ELF64 program header entry (56 bytes).
const ELF64_PHDR_SIZE: usize = 56;

/// Size of an ELF32 section header entry (40 bytes).
const ELF32_SHDR_SIZE: usize = 40;

/// Size of an ELF64 section header entry (64 bytes).
const ELF64_SHDR_SIZE: usize = 64;

/// Errors that can occur when parsing an ELF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfError {
    /// The file does not start with the ELF magic bytes.
    BadMagic,
    /// `EI_CLASS` is neither `ELFCLASS32` nor `ELFCLASS64`.
    UnsupportedClass,
    /// `EI_DATA` is neither little- nor big-endian.
    UnsupportedEncoding,
    /// The input data is too short for the declared structure.
    Truncated,
    /// A header table offset, entry size or count is out of bounds.
    InvalidOffset,
}

impl fmt::Display for ElfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic => write!(f, "invalid ELF magic bytes"),
            Self::UnsupportedClass => write!(f, "unsupported ELF class"),
            Self::UnsupportedEncoding => write!(f, "unsupported ELF data encoding"),
            Self::Truncated => write!(f, "input data truncated"),
            Self::InvalidOffset => write!(f, "invalid header table offset or size"),
        }
    }
}

impl core::error::Error for ElfError {}

/// Word size of the file, from `EI_CLASS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfClass {
    /// `ELFCLASS32`: 32-bit offsets and sizes.
    Elf32,
    /// `ELFCLASS64`: 64-bit offsets and sizes.
    Elf64,
}

impl ElfClass {
    /// Size of the file header for this class.
    #[must_use]
    pub fn header_size(self) -> usize {
        match self {
            Self::Elf32 => ELF32_EHDR_SIZE,
            Self::Elf64 => ELF64_EHDR_SIZE,
        }
    }

    /// Minimum size of one program header entry for this class.
    #[must_use]
    pub fn phdr_size(self) -> usize {
        match self {
            Self::Elf32 => ELF32_PHDR_SIZE,
            Self::Elf64 => ELF64_PHDR_SIZE,
        }
    }

    /// Minimum size of one section header entry for this class.
    #[must_use]
    pub fn shdr_size(self) -> usize {
        match self {
            Self::Elf32 => ELF32_SHDR_SIZE,
            Self::Elf64 => ELF64_SHDR_SIZE,
        }
    }
}

/// Byte order of the file, from `EI_DATA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    /// `ELFDATA2LSB`.
    Little,
    /// `ELFDATA2MSB`.
    Big,
}

impl Endian {
    /// Read a `u16` from `data` at byte offset `off`.
    ///
    /// # Panics
    ///
    /// Panics if `off + 2 > data.len()`. Callers must bounds-check first.
    pub(crate) fn u16(self, data: &[u8], off: usize) -> u16 {
        let mut b = [0u8; 2];
        b.copy_from_slice(&data[off..off + 2]);
        match self {
            Self::Little => u16::from_le_bytes(b),
            Self::Big => u16::from_be_bytes(b),
        }
    }

    /// Read a `u32` from `data` at byte offset `off`.
    pub(crate) fn u32(self, data: &[u8], off: usize) -> u32 {
        let mut b = [0u8; 4];
        b.copy_from_slice(&data[off..off + 4]);
        match self {
            Self::Little => u32::from_le_bytes(b),
            Self::Big => u32::from_be_bytes(b),
        }
    }

    /// Read a `u64` from `data` at byte offset `off`.
    pub(crate) fn u64(self, data: &[u8], off: usize) -> u64 {
        let mut b = [0u8; 8];
        b.copy_from_slice(&data[off..off + 8]);
        match self {
            Self::Little => u64::from_le_bytes(b),
            Self::Big => u64::from_be_bytes(b),
        }
    }

    /// Read a class-sized word (`Elf32_Off`/`Elf64_Off`) widened to `u64`.
    pub(crate) fn word(self, class: ElfClass, data: &[u8], off: usize) -> u64 {
        match class {
            ElfClass::Elf32 => u64::from(self.u32(data, off)),
            ElfClass::Elf64 => self.u64(data, off),
        }
    }
}

/// Location of a section or program header table within the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderTable {
    /// File offset of the first entry.
    pub offset: u64,
    /// Size of one entry, as declared by the header.
    pub entry_size: u16,
    /// Number of entries.
    pub count: u16,
}

impl HeaderTable {
    /// Returns `true` if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Total size of the table in bytes.
    #[must_use]
    pub fn byte_len(&self) -> u64 {
        u64::from(self.entry_size) * u64::from(self.count)
    }

    /// End offset of the table, or 0 for an empty table.
    ///
    /// Returns `None` on arithmetic overflow.
    #[must_use]
    pub fn end(&self) -> Option<u64> {
        if self.is_empty() {
            return Some(0);
        }
        self.offset.checked_add(self.byte_len())
    }

    /// Validates the table against the minimum entry size and the file length.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::InvalidOffset`] if the entries are too small to hold
    /// a header of this class, or if the table does not fit in `file_len` bytes.
    pub fn check(&self, min_entry_size: usize, file_len: u64) -> Result<(), ElfError> {
        if self.is_empty() {
            return Ok(());
        }
        if usize::from(self.entry_size) < min_entry_size {
            return Err(ElfError::InvalidOffset);
        }
        match self.end() {
            Some(end) if end <= file_len => Ok(()),
            _ => Err(ElfError::InvalidOffset),
        }
    }
}

/// Parsed ELF file header, widened to 64-bit fields for both classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfHeader {
    /// Word size of the file.
    pub class: ElfClass,
    /// Byte order of the file.
    pub endian: Endian,
    /// Object file type (`ET_EXEC`, `ET_DYN`, ...).
    pub e_type: u16,
    /// Target machine architecture.
    pub e_machine: u16,
    /// Virtual address of the entry point.
    pub e_entry: u64,
    /// Offset of the program header table in the file.
    pub e_phoff: u64,
    /// Size of each program header entry.
    pub e_phentsize: u16,
    /// Number of program header entries.
    pub e_phnum: u16,
    /// Offset of the section header table in the file.
    pub e_shoff: u64,
    /// Size of each section header entry.
    pub e_shentsize: u16,
    /// Number of section header entries.
    pub e_shnum: u16,
    /// Section header string table index.
    pub e_shstrndx: u16,
}

impl ElfHeader {
    /// Parse an ELF file header from the first bytes of a file.
    ///
    /// Only the identification bytes are validated here. The header tables
    /// are checked against the file length by [`HeaderTable::check`].
    ///
    /// # Errors
    ///
    /// Returns [`ElfError`] if the magic, class or encoding is wrong or the
    /// data is shorter than the header for its class.
    pub fn parse(data: &[u8]) -> Result<Self, ElfError> {
        if data.len() < EI_NIDENT {
            return Err(ElfError::Truncated);
        }

        if data[..4] != ELF_MAGIC {
            return Err(ElfError::BadMagic);
        }

        let class = match data[4] {
            ELFCLASS32 => ElfClass::Elf32,
            ELFCLASS64 => ElfClass::Elf64,
            _ => return Err(ElfError::UnsupportedClass),
        };

        let endian = match data[5] {
            ELFDATA2LSB => Endian::Little,
            ELFDATA2MSB => Endian::Big,
            _ => return Err(ElfError::UnsupportedEncoding),
        };

        if data.len() < class.header_size() {
            return Err(ElfError::Truncated);
        }

        let e_type = endian.u16(data, 16);
        let e_machine = endian.u16(data, 18);

        // Past e_version the two layouts diverge: three words, then the
        // 16-bit fields starting after e_flags and e_ehsize.
        let header = match class {
            ElfClass::Elf32 => Self {
                class,
                endian,
                e_type,
                e_machine,
                e_entry: endian.word(class, data, 24),
                e_phoff: endian.word(class, data, 28),
                e_shoff: endian.word(class, data, 32),
                e_phentsize: endian.u16(data, 42),
                e_phnum: endian.u16(data, 44),
                e_shentsize: endian.u16(data, 46),
                e_shnum: endian.u16(data, 48),
                e_shstrndx: endian.u16(data, 50),
            },
            ElfClass::Elf64 => Self {
                class,
                endian,
                e_type,
                e_machine,
                e_entry: endian.word(class, data, 24),
                e_phoff: endian.word(class, data, 32),
                e_shoff: endian.word(class, data, 40),
                e_phentsize: endian.u16(data, 54),
                e_phnum: endian.u16(data, 56),
                e_shentsize: endian.u16(data, 58),
                e_shnum: endian.u16(data, 60),
                e_shstrndx: endian.u16(data, 62),
            },
        };

        Ok(header)
    }

    /// Location of the section header table.
    #[must_use]
    pub fn section_table(&self) -> HeaderTable {
        HeaderTable {
            offset: self.e_shoff,
            entry_size: self.e_shentsize,
            count: self.e_shnum,
        }
    }

    /// Location of the program header table.
    #[must_use]
    pub fn program_table(&self) -> HeaderTable {
        HeaderTable {
            offset: self.e_phoff,
            entry_size: self.e_phentsize,
            count: self.e_phnum,
        }
    }
}
