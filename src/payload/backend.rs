use std::io::ErrorKind;
use std::io::Read;
use std::path::Path;

use fs_err::os::unix::fs::OpenOptionsExt;
use fs_err::File;
use fs_err::OpenOptions;

use crate::payload::EntryType;
use crate::payload::IsoBackend;
use crate::payload::SquashfsBackend;
use crate::Bundle;
use crate::Error;
use crate::Format;

/// Capabilities every payload format provides.
///
/// Opening is the constructor of the implementation and closing is `Drop`.
pub trait PayloadBackend {
    /// Moves to the next entry. Returns `false` when the payload is exhausted.
    fn next_entry(&mut self) -> Result<bool, Error>;

    fn entry_type(&self) -> EntryType;

    /// Normalized path of the current entry relative to the payload root.
    fn path(&self) -> &str;

    /// Link target or an empty string.
    fn link_target(&self) -> &str;

    /// Streams the contents of the current entry.
    fn reader(&mut self) -> Result<Box<dyn Read + '_>, Error>;

    fn read_to_vec(&mut self) -> Result<Vec<u8>, Error> {
        let mut buf = Vec::new();
        self.reader()?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Materializes the current entry at `target`.
    fn extract_to(&mut self, target: &Path) -> Result<(), Error>;
}

/// The backend chosen once by the bundle format.
pub enum AnyBackend {
    Iso(IsoBackend),
    Squashfs(SquashfsBackend),
}

impl AnyBackend {
    pub fn open(bundle: &Bundle) -> Result<Self, Error> {
        match bundle.format() {
            Format::Type1 => Ok(Self::Iso(IsoBackend::open(bundle.path())?)),
            Format::Type2 => Ok(Self::Squashfs(SquashfsBackend::open(
                bundle.path(),
                bundle.payload_offset()?,
            )?)),
            Format::Invalid => Err(Error::Format(bundle.path().to_path_buf())),
        }
    }
}

impl PayloadBackend for AnyBackend {
    fn next_entry(&mut self) -> Result<bool, Error> {
        match self {
            Self::Iso(b) => b.next_entry(),
            Self::Squashfs(b) => b.next_entry(),
        }
    }

    fn entry_type(&self) -> EntryType {
        match self {
            Self::Iso(b) => b.entry_type(),
            Self::Squashfs(b) => b.entry_type(),
        }
    }

    fn path(&self) -> &str {
        match self {
            Self::Iso(b) => b.path(),
            Self::Squashfs(b) => b.path(),
        }
    }

    fn link_target(&self) -> &str {
        match self {
            Self::Iso(b) => b.link_target(),
            Self::Squashfs(b) => b.link_target(),
        }
    }

    fn reader(&mut self) -> Result<Box<dyn Read + '_>, Error> {
        match self {
            Self::Iso(b) => b.reader(),
            Self::Squashfs(b) => b.reader(),
        }
    }

    fn read_to_vec(&mut self) -> Result<Vec<u8>, Error> {
        match self {
            Self::Iso(b) => b.read_to_vec(),
            Self::Squashfs(b) => b.read_to_vec(),
        }
    }

    fn extract_to(&mut self, target: &Path) -> Result<(), Error> {
        match self {
            Self::Iso(b) => b.extract_to(target),
            Self::Squashfs(b) => b.extract_to(target),
        }
    }
}

/// Creates the parent directories and writes `reader` to a new file with mode 0644.
///
/// The file is truncated first. Partially written files are not removed on error.
pub(crate) fn write_file<R: Read>(mut reader: R, target: &Path) -> Result<u64, Error> {
    create_parent_dir(target)?;
    let mut file: File = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(FILE_MODE)
        .open(target)?;
    let n = std::io::copy(&mut reader, &mut file)?;
    Ok(n)
}

/// Creates the parent directories and the symbolic link replacing any existing file.
pub(crate) fn write_symlink(link_target: &str, target: &Path) -> Result<(), Error> {
    create_parent_dir(target)?;
    match fs_err::symlink_metadata(target) {
        Ok(metadata) if !metadata.is_dir() => fs_err::remove_file(target)?,
        Ok(..) => {}
        Err(ref e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    fs_err::os::unix::fs::symlink(link_target, target)?;
    Ok(())
}

pub(crate) fn create_parent_dir(target: &Path) -> Result<(), Error> {
    if let Some(dirname) = target.parent() {
        if !dirname.as_os_str().is_empty() {
            fs_err::create_dir_all(dirname)?;
        }
    }
    Ok(())
}

/// Owner read and write, group and others read.
pub const FILE_MODE: u32 = 0o644;
