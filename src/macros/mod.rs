mod int_enum;

pub(crate) use self::int_enum::*;
