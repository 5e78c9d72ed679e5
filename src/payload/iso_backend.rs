use std::io::Read;
use std::path::Path;

use fs_err::File;

use crate::iso9660::IsoImage;
use crate::iso9660::Record;
use crate::iso9660::RecordKind;
use crate::iso9660::Walker;
use crate::payload::write_file;
use crate::payload::write_symlink;
use crate::payload::EntryType;
use crate::payload::PayloadBackend;
use crate::Error;

/// Type 1 payload: the ISO 9660 image itself.
///
/// Regular files and Rock Ridge symbolic links are yielded, directories and special files are
/// skipped. Links have no contents: they can not be followed while streaming.
pub struct IsoBackend {
    image: IsoImage<File>,
    walker: Walker,
    current: Option<(String, Record)>,
}

impl IsoBackend {
    pub fn open(path: &Path) -> Result<Self, Error> {
        log::trace!("Opening {} as type 1 bundle", path.display());
        let image = IsoImage::new(File::open(path)?)?;
        Ok(Self {
            image,
            walker: Walker::new(),
            current: None,
        })
    }

    fn current(&self) -> Result<&Record, Error> {
        self.current
            .as_ref()
            .map(|(_, record)| record)
            .ok_or(Error::IteratorState)
    }
}

impl PayloadBackend for IsoBackend {
    fn next_entry(&mut self) -> Result<bool, Error> {
        self.current = None;
        while let Some((path, record)) = self.walker.next(&mut self.image)? {
            match record.kind {
                RecordKind::Regular | RecordKind::Symlink(..) => {
                    self.current = Some((path, record));
                    return Ok(true);
                }
                RecordKind::Directory => log::debug!("Skipping directory {:?}", path),
                RecordKind::Other => log::debug!("Skipping special file {:?}", path),
            }
        }
        Ok(false)
    }

    fn entry_type(&self) -> EntryType {
        match self.current.as_ref().map(|(_, record)| &record.kind) {
            Some(RecordKind::Regular) => EntryType::Regular,
            Some(RecordKind::Symlink(..)) => EntryType::Link,
            Some(RecordKind::Directory) => EntryType::Directory,
            Some(RecordKind::Other) | None => EntryType::Unknown,
        }
    }

    fn path(&self) -> &str {
        self.current
            .as_ref()
            .map(|(path, _)| path.as_str())
            .unwrap_or_default()
    }

    fn link_target(&self) -> &str {
        match self.current.as_ref().map(|(_, record)| &record.kind) {
            Some(RecordKind::Symlink(target)) => target.as_str(),
            _ => "",
        }
    }

    fn reader(&mut self) -> Result<Box<dyn Read + '_>, Error> {
        let record = self.current()?.clone();
        match record.kind {
            RecordKind::Regular => Ok(Box::new(self.image.open_file(&record)?)),
            _ => Ok(Box::new(std::io::empty())),
        }
    }

    fn read_to_vec(&mut self) -> Result<Vec<u8>, Error> {
        let record = self.current()?.clone();
        if record.kind != RecordKind::Regular {
            return Ok(Vec::new());
        }
        let mut buf = vec![0_u8; record.size as usize];
        self.image.open_file(&record)?.read_exact(&mut buf[..])?;
        Ok(buf)
    }

    fn extract_to(&mut self, target: &Path) -> Result<(), Error> {
        let record = self.current()?.clone();
        match &record.kind {
            RecordKind::Regular => {
                let n = write_file(self.image.open_file(&record)?, target)?;
                if n != record.size as u64 {
                    return Err(std::io::ErrorKind::UnexpectedEof.into());
                }
                Ok(())
            }
            RecordKind::Symlink(link_target) => write_symlink(link_target, target),
            RecordKind::Directory | RecordKind::Other => {
                Err(Error::UnsupportedEntry(self.path().to_string()))
            }
        }
    }
}

impl Drop for IsoBackend {
    fn drop(&mut self) {
        log::trace!("Closing type 1 payload");
    }
}
