use std::io::Read;
use std::path::Path;

use fs_err::File;

use crate::payload::write_file;
use crate::payload::write_symlink;
use crate::payload::EntryType;
use crate::payload::PayloadBackend;
use crate::squashfs::FileReader;
use crate::squashfs::Inode;
use crate::squashfs::InodeData;
use crate::squashfs::SquashFs;
use crate::squashfs::Walker;
use crate::Error;

/// Type 2 payload: SquashFS image that follows the runtime.
pub struct SquashfsBackend {
    fs: SquashFs<File>,
    walker: Walker,
    current: Option<(String, Inode)>,
}

impl SquashfsBackend {
    pub fn open(path: &Path, offset: u64) -> Result<Self, Error> {
        log::trace!(
            "Opening {} as type 2 bundle, payload offset {}",
            path.display(),
            offset
        );
        let fs = SquashFs::new(File::open(path)?, offset)?;
        Ok(Self {
            fs,
            walker: Walker::new(),
            current: None,
        })
    }

    fn current(&self) -> Result<&(String, Inode), Error> {
        self.current.as_ref().ok_or(Error::IteratorState)
    }

    /// Follows symbolic links starting from the current entry.
    fn resolve(&mut self) -> Result<Inode, Error> {
        let (path, inode) = self.current()?.clone();
        if !matches!(inode.data, InodeData::Symlink(..)) {
            return Ok(inode);
        }
        match self.fs.lookup(&path)? {
            Some(inode) => Ok(inode),
            None => Err(Error::EntryNotFound(path)),
        }
    }
}

impl PayloadBackend for SquashfsBackend {
    fn next_entry(&mut self) -> Result<bool, Error> {
        self.current = self.walker.next(&mut self.fs)?;
        Ok(self.current.is_some())
    }

    fn entry_type(&self) -> EntryType {
        match self.current.as_ref().map(|(_, inode)| &inode.data) {
            Some(InodeData::File(..)) => EntryType::Regular,
            Some(InodeData::Dir(..)) => EntryType::Directory,
            Some(InodeData::Symlink(..)) => EntryType::Link,
            Some(InodeData::Other(..)) | None => EntryType::Unknown,
        }
    }

    fn path(&self) -> &str {
        self.current
            .as_ref()
            .map(|(path, _)| path.as_str())
            .unwrap_or_default()
    }

    fn link_target(&self) -> &str {
        match self.current.as_ref().map(|(_, inode)| &inode.data) {
            Some(InodeData::Symlink(target)) => target.as_str(),
            _ => "",
        }
    }

    fn reader(&mut self) -> Result<Box<dyn Read + '_>, Error> {
        let inode = self.resolve()?;
        match inode.data {
            InodeData::File(file) => Ok(Box::new(FileReader::new(&mut self.fs, file))),
            InodeData::Dir(..) => Ok(Box::new(std::io::empty())),
            InodeData::Symlink(..) | InodeData::Other(..) => {
                Err(Error::UnsupportedEntry(self.path().to_string()))
            }
        }
    }

    fn extract_to(&mut self, target: &Path) -> Result<(), Error> {
        let (_, inode) = self.current()?.clone();
        match inode.data {
            InodeData::File(file) => {
                write_file(FileReader::new(&mut self.fs, file), target)?;
            }
            InodeData::Dir(..) => fs_err::create_dir_all(target)?,
            InodeData::Symlink(link_target) => write_symlink(&link_target, target)?,
            InodeData::Other(..) => {
                return Err(Error::UnsupportedEntry(self.path().to_string()));
            }
        }
        Ok(())
    }
}

impl Drop for SquashfsBackend {
    fn drop(&mut self) {
        log::trace!("Closing type 2 payload");
    }
}
