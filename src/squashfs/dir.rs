use crate::squashfs::InodeKind;

/// An entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    /// Metadata reference of the inode: block start in the inode table and offset in the
    /// uncompressed block.
    pub inode_ref: u64,
    pub kind: InodeKind,
}

pub(crate) const DIR_HEADER_LEN: usize = 12;
pub(crate) const DIR_ENTRY_LEN: usize = 8;
pub(crate) const MAX_DIR_HEADER_ENTRIES: u32 = 256;
