mod handle;

pub use self::handle::*;
