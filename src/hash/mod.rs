mod digest;
mod md5;

pub use self::digest::*;
pub use self::md5::*;
