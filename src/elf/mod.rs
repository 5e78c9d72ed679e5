mod size;

pub use self::size::*;
