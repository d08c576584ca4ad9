//! Minimal ELF layout parser for diricon.
//!
//! Parses ELF32/ELF64 headers, section headers and program headers from raw
//! byte slices using safe field extraction, and computes where data appended
//! to an executable begins. No unsafe code, no allocations.
//!
//! # Usage
//!
//! ```
//! use diricon_elf::ElfFile;
//!
//! fn payload_offset(data: &[u8]) -> Option<u64> {
//!     let elf = ElfFile::parse(data).ok()?;
//!     Some(elf.layout().ok()?.appended_offset())
//! }
//! ```
//!
//! When the file is too large to hold in memory, parse the header with
//! [`ElfHeader::parse`], read the two tables it points to, and build an
//! [`ElfLayout`] from them directly.

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

pub mod header;
pub mod layout;
pub mod section;
pub mod segment;

pub use header::{
    EI_NIDENT, ELF_MAGIC, ELF64_EHDR_SIZE, ElfClass, ElfError, ElfHeader, Endian, HeaderTable,
};
pub use layout::{ElfLayout, Extent};
pub use section::{SHT_NOBITS, SHT_NULL, SHT_PROGBITS, SHT_STRTAB, SectionHeader, SectionIter};
pub use segment::{
    ElfFile, PT_DYNAMIC, PT_INTERP, PT_LOAD, PT_NOTE, PT_NULL, ProgramHeader, ProgramHeaderIter,
};
