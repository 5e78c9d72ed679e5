mod probe;

pub use self::probe::*;
