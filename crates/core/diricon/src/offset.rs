//! Locating the filesystem image appended to an executable.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use diricon_elf::{ELF64_EHDR_SIZE, ElfError, ElfHeader, ElfLayout, HeaderTable};

use crate::error::Error;

/// Returns the byte offset at which data appended to the ELF executable at
/// `path` begins.
///
/// Only the file header and the two header tables are read, so this is
/// cheap even for very large executables.
///
/// # Errors
///
/// Returns [`Error::InvalidExecutable`] if the file is not an ELF file or
/// its header tables do not fit in it, and [`Error::Io`] if it cannot be
/// read.
pub fn compute_appended_offset(path: impl AsRef<Path>) -> Result<u64, Error> {
    let path = path.as_ref();
    let mut file = File::open(path)?;
    let file_len = file.metadata()?.len();

    let mut ident = Vec::with_capacity(ELF64_EHDR_SIZE);
    (&mut file)
        .take(ELF64_EHDR_SIZE as u64)
        .read_to_end(&mut ident)?;
    let header = ElfHeader::parse(&ident)?;

    let shdr_size = header.class.shdr_size();
    let phdr_size = header.class.phdr_size();
    let sections = read_table(&mut file, header.section_table(), shdr_size, file_len)?;
    let segments = read_table(&mut file, header.program_table(), phdr_size, file_len)?;
    let layout = ElfLayout::from_packed(header, &sections, &segments, file_len)?;

    let offset = layout.appended_offset();
    log::debug!(
        "{}: {:?} {:?} ELF, tables end {}, sections {}, segments {}, image at {offset}",
        path.display(),
        header.class,
        header.endian,
        layout.section_table_end(),
        layout.max_section_end(),
        layout.max_segment_end(),
    );
    Ok(offset)
}

/// Reads the first `entry_size` bytes of every entry of one header table,
/// packed back to back, after validating the table against the file length.
///
/// Padding declared by a larger `e_shentsize`/`e_phentsize` is skipped, so
/// the buffer never exceeds 65535 entries of the class's header size.
fn read_table(
    file: &mut File,
    table: HeaderTable,
    entry_size: usize,
    file_len: u64,
) -> Result<Vec<u8>, Error> {
    if table.is_empty() {
        return Ok(Vec::new());
    }
    table.check(entry_size, file_len)?;
    let padding = u16::try_from(entry_size)
        .ok()
        .and_then(|min| table.entry_size.checked_sub(min))
        .ok_or(ElfError::InvalidOffset)?;

    let mut buf = vec![0u8; entry_size * usize::from(table.count)];
    file.seek(SeekFrom::Start(table.offset))?;
    let mut reader = BufReader::new(file);
    for (i, entry) in buf.chunks_exact_mut(entry_size).enumerate() {
        if i > 0 && padding > 0 {
            reader.seek_relative(i64::from(padding))?;
        }
        reader.read_exact(entry)?;
    }
    Ok(buf)
}
