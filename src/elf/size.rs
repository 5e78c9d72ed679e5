use std::io::Error;
use std::io::ErrorKind;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;

use elb::Elf;
use fs_err::File;

/// Computes the size of the ELF file at the start of `reader`.
///
/// The size is the end of the section header table or the end of the last section, whichever
/// is larger. Everything past this offset is not part of the executable.
pub fn elf_size<R: Read + Seek>(mut reader: R) -> Result<u64, Error> {
    reader.seek(SeekFrom::Start(0))?;
    let elf = Elf::read(&mut reader, PAGE_SIZE).map_err(elf_error)?;
    let header = &elf.header;
    let table_len = u64::from(header.section_len) * u64::from(header.num_sections);
    let table_end = header
        .section_header_offset
        .checked_add(table_len)
        .ok_or_else(|| out_of_range("section header table"))?;
    let last_section_end = match elf.sections.last() {
        Some(section) => section
            .offset
            .checked_add(section.size)
            .ok_or_else(|| out_of_range("last section"))?,
        None => 0,
    };
    Ok(table_end.max(last_section_end))
}

pub fn elf_file_size<P: AsRef<Path>>(path: P) -> Result<u64, Error> {
    elf_size(File::open(path.as_ref())?)
}

fn elf_error(e: elb::Error) -> Error {
    match e {
        elb::Error::Io(e) => e,
        other => Error::new(ErrorKind::InvalidData, other.to_string()),
    }
}

fn out_of_range(what: &str) -> Error {
    Error::new(ErrorKind::InvalidData, format!("{what} ends past u64::MAX"))
}

pub const MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const PAGE_SIZE: u64 = 4096;
