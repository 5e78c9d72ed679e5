use crate::macros::define_int_enum;

define_int_enum! {
    /// Inode type as stored in inode headers and directory entries.
    pub enum InodeKind: u16 {
        Dir = 1 => "directory",
        File = 2 => "file",
        Symlink = 3 => "symlink",
        BlockDevice = 4 => "block device",
        CharDevice = 5 => "character device",
        Fifo = 6 => "fifo",
        Socket = 7 => "socket",
        ExtDir = 8 => "extended directory",
        ExtFile = 9 => "extended file",
        ExtSymlink = 10 => "extended symlink",
        ExtBlockDevice = 11 => "extended block device",
        ExtCharDevice = 12 => "extended character device",
        ExtFifo = 13 => "extended fifo",
        ExtSocket = 14 => "extended socket",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    pub number: u32,
    pub permissions: u16,
    pub data: InodeData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InodeData {
    Dir(DirInode),
    File(FileInode),
    Symlink(String),
    /// Devices, FIFOs and sockets.
    Other(InodeKind),
}

/// Location of the directory listing in the directory table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirInode {
    pub start_block: u32,
    pub offset: u16,
    /// Listing size plus 3 for the implicit `.` and `..` entries.
    pub file_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInode {
    pub blocks_start: u64,
    pub fragment: u32,
    pub fragment_offset: u32,
    pub file_size: u64,
    pub block_sizes: Vec<u32>,
}

impl Inode {
    pub fn is_dir(&self) -> bool {
        matches!(self.data, InodeData::Dir(..))
    }
}

impl FileInode {
    pub fn has_fragment(&self) -> bool {
        self.fragment != NO_FRAGMENT
    }

    /// The number of full and partial blocks stored outside of the fragment.
    pub fn num_blocks(file_size: u64, fragment: u32, block_size: u32) -> u64 {
        if fragment == NO_FRAGMENT {
            file_size.div_ceil(block_size as u64)
        } else {
            file_size / block_size as u64
        }
    }
}

/// Block size bit that marks uncompressed data blocks and fragments.
pub const UNCOMPRESSED_DATA: u32 = 1 << 24;
/// Metadata block header bit that marks uncompressed metadata.
pub const UNCOMPRESSED_METADATA: u16 = 1 << 15;
pub const NO_FRAGMENT: u32 = u32::MAX;
pub const INODE_HEADER_LEN: usize = 16;
