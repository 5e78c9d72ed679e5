use std::io::Error;
use std::io::ErrorKind;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Take;

use crate::iso9660::u16_read;
use crate::iso9660::RawRecord;
use crate::iso9660::Record;
use crate::iso9660::RecordKind;
use crate::iso9660::RockRidge;
use crate::iso9660::MIN_RECORD_LEN;

pub struct IsoImage<R: Read + Seek> {
    reader: R,
    block_len: u64,
    root: Record,
}

impl<R: Read + Seek> IsoImage<R> {
    /// Reads the primary volume descriptor.
    pub fn new(mut reader: R) -> Result<Self, Error> {
        let mut sector = [0_u8; SECTOR_LEN];
        for i in 0..MAX_VOLUME_DESCRIPTORS {
            reader.seek(SeekFrom::Start((FIRST_VOLUME_DESCRIPTOR + i) * SECTOR_LEN as u64))?;
            reader.read_exact(&mut sector[..])?;
            if sector[1..6] != MAGIC[..] {
                return Err(Error::new(ErrorKind::InvalidData, "not an iso 9660 image"));
            }
            match sector[0] {
                PRIMARY_VOLUME_DESCRIPTOR => {
                    let block_len = u16_read(&sector[128..130]) as u64;
                    if !block_len.is_power_of_two() || block_len < 512 {
                        return Err(Error::new(
                            ErrorKind::InvalidData,
                            format!("invalid logical block size {}", block_len),
                        ));
                    }
                    let raw = RawRecord::parse(&sector[156..156 + MIN_RECORD_LEN])?;
                    let root = Record {
                        name: String::new(),
                        kind: RecordKind::Directory,
                        extent: raw.extent,
                        size: raw.size,
                    };
                    return Ok(Self {
                        reader,
                        block_len,
                        root,
                    });
                }
                VOLUME_DESCRIPTOR_TERMINATOR => break,
                _ => {}
            }
        }
        Err(Error::new(
            ErrorKind::InvalidData,
            "primary volume descriptor not found",
        ))
    }

    pub fn root(&self) -> &Record {
        &self.root
    }

    /// Reads all records of the directory except `.` and `..`.
    pub fn read_dir(&mut self, dir: &Record) -> Result<Vec<Record>, Error> {
        let data = self.read_extent(dir.extent, dir.size)?;
        let block_len = self.block_len as usize;
        let mut records = Vec::new();
        let mut offset = 0;
        while offset < data.len() {
            let len = data[offset] as usize;
            if len == 0 {
                // Records do not cross block boundaries, the rest of the block is padding.
                offset = (offset / block_len + 1) * block_len;
                continue;
            }
            if offset + len > data.len() {
                return Err(Error::new(ErrorKind::InvalidData, "directory record overflow"));
            }
            let raw_bytes = &data[offset..offset + len];
            offset += len;
            if Record::is_self_or_parent(raw_bytes) {
                continue;
            }
            let raw = RawRecord::parse(raw_bytes)?;
            records.push(self.read_record(&raw)?);
        }
        Ok(records)
    }

    /// Returns the reader positioned at the start of the file data.
    pub fn open_file(&mut self, record: &Record) -> Result<Take<&mut R>, Error> {
        self.reader
            .seek(SeekFrom::Start(record.extent as u64 * self.block_len))?;
        Ok(self.reader.by_ref().take(record.size as u64))
    }

    fn read_record(&mut self, raw: &RawRecord) -> Result<Record, Error> {
        let mut rock_ridge = RockRidge::default();
        let mut continuation = rock_ridge.parse(raw.system_use);
        let mut num_continuations = 0;
        while let Some(area) = continuation.take() {
            num_continuations += 1;
            if num_continuations > MAX_CONTINUATIONS {
                return Err(Error::new(ErrorKind::InvalidData, "too many continuation areas"));
            }
            self.reader.seek(SeekFrom::Start(
                area.block as u64 * self.block_len + area.offset as u64,
            ))?;
            let mut data = vec![0_u8; area.len as usize];
            self.reader.read_exact(&mut data[..])?;
            continuation = rock_ridge.parse(&data[..]);
        }
        Ok(rock_ridge.into_record(raw))
    }

    fn read_extent(&mut self, extent: u32, size: u32) -> Result<Vec<u8>, Error> {
        self.reader
            .seek(SeekFrom::Start(extent as u64 * self.block_len))?;
        let mut data = vec![0_u8; size as usize];
        self.reader.read_exact(&mut data[..])?;
        Ok(data)
    }
}

/// Depth-first walk over the directory tree.
///
/// The walker does not borrow the image so that the caller can read the file the walker has
/// just returned.
#[derive(Default)]
pub struct Walker {
    stack: Vec<(String, std::vec::IntoIter<Record>)>,
    started: bool,
}

impl Walker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next record and its full path.
    pub fn next<R: Read + Seek>(
        &mut self,
        image: &mut IsoImage<R>,
    ) -> Result<Option<(String, Record)>, Error> {
        if !self.started {
            self.started = true;
            let root = image.root().clone();
            let records = image.read_dir(&root)?;
            self.stack.push((String::new(), records.into_iter()));
        }
        loop {
            let Some((prefix, records)) = self.stack.last_mut() else {
                return Ok(None);
            };
            let Some(record) = records.next() else {
                self.stack.pop();
                continue;
            };
            let path = if prefix.is_empty() {
                record.name.clone()
            } else {
                format!("{}/{}", prefix, record.name)
            };
            if record.is_dir() {
                if self.stack.len() >= MAX_DEPTH {
                    return Err(Error::new(
                        ErrorKind::InvalidData,
                        format!("directory tree is too deep: {}", path),
                    ));
                }
                let records = image.read_dir(&record)?;
                self.stack.push((path.clone(), records.into_iter()));
            }
            return Ok(Some((path, record)));
        }
    }
}

pub const SECTOR_LEN: usize = 2048;
const FIRST_VOLUME_DESCRIPTOR: u64 = 16;
const MAX_VOLUME_DESCRIPTORS: u64 = 32;
const PRIMARY_VOLUME_DESCRIPTOR: u8 = 1;
const VOLUME_DESCRIPTOR_TERMINATOR: u8 = 255;
const MAGIC: [u8; 5] = *b"CD001";
const MAX_CONTINUATIONS: usize = 16;
const MAX_DEPTH: usize = 256;
