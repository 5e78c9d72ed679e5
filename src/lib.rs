//! Reader for AppImage bundles.
//!
//! Type 1 bundles are ISO 9660 images with the runtime in the system area, type 2 bundles are
//! the runtime followed by a SquashFS image. [`Bundle`] detects the format, [`PayloadIterator`]
//! walks the payload once regardless of the format and [`ResourcesExtractor`] pulls out the
//! files needed for desktop integration resolving symbolic links on the way.

mod bundle;
pub mod elf;
mod error;
pub mod format;
pub mod hash;
pub mod iso9660;
pub(crate) mod macros;
pub mod payload;
pub mod resources;
pub mod squashfs;
#[cfg(test)]
pub mod test;

pub use self::bundle::*;
pub use self::error::*;
pub use self::format::Detection;
pub use self::format::Diagnostic;
pub use self::format::Format;
pub use self::payload::EntryType;
pub use self::payload::PayloadEntry;
pub use self::payload::PayloadIterator;
pub use self::resources::Layout;
pub use self::resources::ResourcesExtractor;
