//! ISO 9660 image reader with Rock Ridge extensions.
//!
//! Only the parts needed to walk the directory tree and read file extents are implemented.
//! Joliet, multi-extent files and interleaving are not supported.

mod read;
mod record;

pub use self::read::*;
pub use self::record::*;
