//! Appended-offset computation against ELF files on disk.

mod common;

use std::fs;

use common::{ElfWriter, PT_LOAD, SHT_NOBITS, SHT_PROGBITS, runtime};
use diricon::{Error, compute_appended_offset};
use diricon_elf::ElfError;

fn offset_of(bytes: &[u8]) -> Result<u64, Error> {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("runtime");
    fs::write(&path, bytes).expect("write");
    compute_appended_offset(&path)
}

#[test]
fn runtime_ends_at_its_section_table() {
    for (is64, big) in [(true, false), (true, true), (false, false), (false, true)] {
        let elf = runtime(is64, big);
        assert_eq!(
            offset_of(&elf).expect("offset"),
            elf.len() as u64,
            "is64={is64} big={big}"
        );
    }
}

#[test]
fn furthest_segment_wins() {
    // Section table sits inside the body; a segment reaches the end.
    let base = ElfWriter::new(true, false)
        .segment(PT_LOAD, 0, 0)
        .segment(PT_LOAD, 0, 0);
    let body = base.body_offset();
    let mut elf = ElfWriter::new(true, false)
        .segment(PT_LOAD, 0, body)
        .segment(PT_LOAD, body, 0)
        .section(SHT_PROGBITS, body, 0x10)
        .body(0x40)
        .finish();
    elf.extend_from_slice(&[0u8; 0x300]);
    let end = elf.len() as u64;
    // Second program header: p_filesz reaches the end of the padding.
    let ph1 = 64 + 56;
    elf[ph1 + 32..ph1 + 40].copy_from_slice(&(end - body).to_le_bytes());

    assert_eq!(offset_of(&elf).expect("offset"), end);
}

#[test]
fn padded_entries_are_read_at_their_declared_stride() {
    for is64 in [true, false] {
        let base = ElfWriter::new(is64, false)
            .entry_padding(24)
            .segment(PT_LOAD, 0, 0)
            .segment(PT_LOAD, 0, 0);
        let body = base.body_offset();
        let mut elf = ElfWriter::new(is64, false)
            .entry_padding(24)
            .segment(PT_LOAD, 0, body)
            .segment(PT_LOAD, body, 0x400)
            .body(0x100)
            .section(SHT_PROGBITS, body, 0x80)
            .section(SHT_NOBITS, body + 0x100, 0x1000)
            .finish();
        // Only the second program header, past the first one's padding,
        // reaches this far.
        elf.resize((body + 0x400) as usize, 0);
        let end = elf.len() as u64;
        elf.extend_from_slice(b"hsqs");
        assert_eq!(offset_of(&elf).expect("offset"), end, "is64={is64}");
    }
}

#[test]
fn nobits_and_oversized_entries_are_ignored() {
    let elf = ElfWriter::new(true, false)
        .segment(PT_LOAD, 0x10, u64::MAX - 4)
        .body(0x80)
        .section(SHT_NOBITS, 0x40, 0x1_0000_0000)
        .section(SHT_PROGBITS, 0x40, 0x10_0000)
        .finish();
    assert_eq!(offset_of(&elf).expect("offset"), elf.len() as u64);
}

#[test]
fn appended_bytes_are_not_part_of_the_elf() {
    let mut file = runtime(true, false);
    let elf_len = file.len() as u64;
    file.extend_from_slice(b"hsqs and more bytes that belong to the image");
    assert_eq!(offset_of(&file).expect("offset"), elf_len);
}

#[test]
fn no_tables_gives_zero() {
    let elf = ElfWriter::new(true, false).finish();
    assert_eq!(offset_of(&elf).expect("offset"), 0);
}

#[test]
fn non_elf_and_empty_files_are_invalid() {
    assert!(matches!(
        offset_of(b"#!/bin/sh\necho not an executable\n"),
        Err(Error::InvalidExecutable(ElfError::BadMagic))
    ));
    assert!(matches!(
        offset_of(b""),
        Err(Error::InvalidExecutable(ElfError::Truncated))
    ));
    assert!(matches!(
        offset_of(b"\x7fELF"),
        Err(Error::InvalidExecutable(_))
    ));
}

#[test]
fn section_table_past_end_is_invalid() {
    let mut elf = runtime(true, false);
    // e_shnum: claim one more section header than the file holds.
    let shnum = u16::from_le_bytes([elf[60], elf[61]]);
    elf[60..62].copy_from_slice(&(shnum + 1).to_le_bytes());
    assert!(matches!(
        offset_of(&elf),
        Err(Error::InvalidExecutable(ElfError::InvalidOffset))
    ));
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    assert!(matches!(
        compute_appended_offset(dir.path().join("absent")),
        Err(Error::Io(_))
    ));
}
