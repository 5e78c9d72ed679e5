//! Desktop integration resources: the desktop entry, icons and MIME packages.

mod extractor;
mod layout;
mod links;

pub use self::extractor::*;
pub use self::layout::*;
pub(crate) use self::links::*;
