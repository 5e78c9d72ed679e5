
pub use self::bundle::*;
pub use self::elf::*;
pub use self::iso::*;
pub use self::squashfs::*;
pub use self::tree::*;
