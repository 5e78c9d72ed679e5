use std::fmt::Display;
use std::fmt::Formatter;

use crate::payload::PayloadIterator;
use crate::Error;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(test, derive(arbitrary::Arbitrary))]
pub enum EntryType {
    Regular,
    Directory,
    Link,
    /// Devices, FIFOs, sockets and anything else without content.
    Unknown,
}

impl EntryType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Directory => "directory",
            Self::Link => "link",
            Self::Unknown => "unknown",
        }
    }
}

impl Display for EntryType {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A view of the entry the iterator is positioned on.
///
/// The view borrows the iterator mutably and thus can not outlive the current position.
pub struct PayloadEntry<'a> {
    iter: &'a mut PayloadIterator,
}

impl<'a> PayloadEntry<'a> {
    pub(crate) fn new(iter: &'a mut PayloadIterator) -> Self {
        Self { iter }
    }

    pub fn entry_type(&self) -> EntryType {
        self.iter.entry_type().unwrap_or(EntryType::Unknown)
    }

    pub fn path(&self) -> &str {
        self.iter.path().unwrap_or_default()
    }

    pub fn link_target(&self) -> &str {
        self.iter.link_target().unwrap_or_default()
    }

    pub fn read_to_vec(self) -> Result<Vec<u8>, Error> {
        self.iter.read_to_vec()
    }

    pub fn extract_to<P: AsRef<std::path::Path>>(self, target: P) -> Result<(), Error> {
        self.iter.extract_to(target)
    }
}
