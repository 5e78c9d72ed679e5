use std::io::Error;
use std::io::ErrorKind;

/// Parsed directory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// File name: Rock Ridge `NM` if present, ISO name otherwise.
    pub name: String,
    pub kind: RecordKind,
    /// First logical block of the file data.
    pub extent: u32,
    /// Data length in bytes.
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKind {
    Regular,
    Directory,
    Symlink(String),
    Other,
}

impl Record {
    pub fn is_dir(&self) -> bool {
        self.kind == RecordKind::Directory
    }

    /// `.` and `..` entries are encoded as single `0x00` and `0x01` bytes.
    pub(crate) fn is_self_or_parent(raw: &[u8]) -> bool {
        raw.len() > NAME_OFFSET && raw[NAME_LEN_OFFSET] == 1 && raw[NAME_OFFSET] <= 1
    }
}

/// The fixed part of a directory record.
#[derive(Debug)]
pub(crate) struct RawRecord<'a> {
    pub extent: u32,
    pub size: u32,
    pub flags: u8,
    pub name: &'a [u8],
    pub system_use: &'a [u8],
}

impl<'a> RawRecord<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, Error> {
        if data.len() < MIN_RECORD_LEN || data[0] as usize != data.len() {
            return Err(Error::new(ErrorKind::InvalidData, "invalid directory record"));
        }
        let name_len = data[NAME_LEN_OFFSET] as usize;
        let name_end = NAME_OFFSET + name_len;
        if name_end > data.len() {
            return Err(Error::new(ErrorKind::InvalidData, "directory record name overflow"));
        }
        // Name is padded to an even offset.
        let system_use_start = (name_end + (name_len + 1) % 2).min(data.len());
        Ok(Self {
            extent: u32_read(&data[2..6]),
            size: u32_read(&data[10..14]),
            flags: data[25],
            name: &data[NAME_OFFSET..name_end],
            system_use: &data[system_use_start..],
        })
    }

    pub fn is_dir(&self) -> bool {
        self.flags & FLAG_DIRECTORY != 0
    }

    /// ISO name without the `;version` suffix and the trailing dot.
    pub fn iso_name(&self) -> String {
        let name = String::from_utf8_lossy(self.name);
        let name = match name.find(';') {
            Some(i) => &name[..i],
            None => &name[..],
        };
        name.strip_suffix('.').unwrap_or(name).to_string()
    }
}

/// Rock Ridge information accumulated from one or more system use areas.
#[derive(Debug, Default)]
pub(crate) struct RockRidge {
    pub name: Option<String>,
    pub mode: Option<u32>,
    pub symlink: Option<String>,
    symlink_continues: bool,
}

/// Location of a continuation area (`CE` entry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Continuation {
    pub block: u32,
    pub offset: u32,
    pub len: u32,
}

impl RockRidge {
    /// Parses SUSP entries, returns the continuation area if there is one.
    pub fn parse(&mut self, mut area: &[u8]) -> Option<Continuation> {
        let mut continuation = None;
        while area.len() >= SUSP_HEADER_LEN {
            let len = area[2] as usize;
            if len < SUSP_HEADER_LEN || len > area.len() {
                break;
            }
            let entry = &area[..len];
            match &entry[..2] {
                b"NM" if len >= 5 => {
                    // Current and parent directory flags.
                    if entry[4] & 0b110 == 0 {
                        let part = String::from_utf8_lossy(&entry[5..]);
                        self.name.get_or_insert_with(String::new).push_str(&part);
                    }
                }
                b"PX" if len >= 8 => {
                    self.mode = Some(u32_read(&entry[4..8]));
                }
                b"SL" if len >= 5 => {
                    self.parse_symlink(&entry[5..]);
                }
                b"CE" if len >= 28 => {
                    continuation = Some(Continuation {
                        block: u32_read(&entry[4..8]),
                        offset: u32_read(&entry[12..16]),
                        len: u32_read(&entry[20..24]),
                    });
                }
                b"ST" => break,
                _ => {}
            }
            area = &area[len..];
        }
        continuation
    }

    fn parse_symlink(&mut self, mut components: &[u8]) {
        let target = self.symlink.get_or_insert_with(String::new);
        let mut continues = self.symlink_continues;
        while components.len() >= 2 {
            let flags = components[0];
            let len = components[1] as usize;
            if 2 + len > components.len() {
                break;
            }
            if !continues && !target.is_empty() && !target.ends_with('/') {
                target.push('/');
            }
            if flags & SL_ROOT != 0 {
                target.push('/');
            } else if flags & SL_PARENT != 0 {
                target.push_str("..");
            } else if flags & SL_CURRENT != 0 {
                target.push('.');
            } else {
                target.push_str(&String::from_utf8_lossy(&components[2..2 + len]));
            }
            continues = flags & SL_CONTINUE != 0;
            components = &components[2 + len..];
        }
        // A component may be split between consecutive `SL` entries.
        self.symlink_continues = continues;
    }

    pub fn into_record(self, raw: &RawRecord) -> Record {
        let kind = match self.mode.map(|mode| mode & S_IFMT) {
            Some(S_IFREG) => RecordKind::Regular,
            Some(S_IFDIR) => RecordKind::Directory,
            Some(S_IFLNK) => RecordKind::Symlink(self.symlink.unwrap_or_default()),
            Some(_) => RecordKind::Other,
            None if raw.is_dir() => RecordKind::Directory,
            None => RecordKind::Regular,
        };
        Record {
            name: self.name.unwrap_or_else(|| raw.iso_name()),
            kind,
            extent: raw.extent,
            size: raw.size,
        }
    }
}

pub(crate) fn u16_read(data: &[u8]) -> u16 {
    u16::from_le_bytes([data[0], data[1]])
}

pub(crate) fn u32_read(data: &[u8]) -> u32 {
    u32::from_le_bytes([data[0], data[1], data[2], data[3]])
}

pub(crate) const MIN_RECORD_LEN: usize = 34;
const NAME_LEN_OFFSET: usize = 32;
const NAME_OFFSET: usize = 33;
const FLAG_DIRECTORY: u8 = 0x02;
const SUSP_HEADER_LEN: usize = 4;
const SL_CONTINUE: u8 = 0x01;
const SL_CURRENT: u8 = 0x02;
const SL_PARENT: u8 = 0x04;
const SL_ROOT: u8 = 0x08;
const S_IFMT: u32 = 0o170000;
const S_IFREG: u32 = 0o100000;
const S_IFDIR: u32 = 0o040000;
const S_IFLNK: u32 = 0o120000;
