mod errors;

pub use self::errors::*;
