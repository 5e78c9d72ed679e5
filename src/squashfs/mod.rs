//! Read-only SquashFS 4.0 reader.
//!
//! Supports gzip, xz and zstd compression, fragments and the basic and extended inode types.
//! Extended attributes, the export table and the lookup index of extended directories are
//! ignored.

mod compress;
mod dir;
mod file;
mod inode;
mod read;
mod superblock;

pub use self::compress::*;
pub use self::dir::*;
pub use self::file::*;
pub use self::inode::*;
pub use self::read::*;
pub use self::superblock::*;
