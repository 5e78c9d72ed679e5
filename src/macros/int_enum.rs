/// Defines a fieldless enum stored on disk as an integer.
///
/// Every variant gets a human-readable name. Conversion from the integer fails with
/// [`InvalidData`](std::io::ErrorKind::InvalidData) for unknown values.
macro_rules! define_int_enum {
    {
        $(#[$meta:meta])*
        $vis:vis enum $enum:ident: $int:ty {
            $( $name:ident = $value:literal => $str:literal, )*
        }
    } => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
        #[cfg_attr(test, derive(arbitrary::Arbitrary))]
        #[repr($int)]
        $vis enum $enum {
            $( $name = $value, )*
        }

        impl $enum {
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Self::$name => $str, )*
                }
            }
        }

        impl std::fmt::Display for $enum {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<$enum> for $int {
            fn from(value: $enum) -> $int {
                value as $int
            }
        }

        impl TryFrom<$int> for $enum {
            type Error = std::io::Error;

            fn try_from(value: $int) -> Result<Self, Self::Error> {
                $( if value == $value { return Ok(Self::$name); } )*
                Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("unknown {} value: {value}", stringify!($enum)),
                ))
            }
        }
    }
}

pub(crate) use define_int_enum;
