//! Format-agnostic, forward-only traversal of the bundle payload.

mod backend;
mod entry;
mod iso_backend;
mod iterator;
mod squashfs_backend;

pub use self::backend::*;
pub use self::entry::*;
pub use self::iso_backend::*;
pub use self::iterator::*;
pub use self::squashfs_backend::*;
