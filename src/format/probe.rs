use std::fmt::Display;
use std::fmt::Formatter;
use std::io::Error;
use std::io::ErrorKind;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;

use fs_err::File;

use crate::elf;

/// Container format of a bundle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(test, derive(arbitrary::Arbitrary))]
pub enum Format {
    /// ISO 9660 image with the runtime in the system area.
    Type1,
    /// Runtime followed by a SquashFS image.
    Type2,
    /// Not a bundle.
    Invalid,
}

impl Format {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Type1 => "type 1",
            Self::Type2 => "type 2",
            Self::Invalid => "invalid",
        }
    }

    /// Classifies the file without failing on unknown formats.
    ///
    /// Only I/O errors other than a too short file are returned as errors.
    pub fn probe<P: AsRef<Path>>(path: P) -> Result<Detection, Error> {
        let path = path.as_ref();
        let detection = Self::probe_reader(File::open(path)?)?;
        for diagnostic in detection.diagnostics.iter() {
            log::warn!("{}: {}", path.display(), diagnostic);
        }
        Ok(detection)
    }

    pub fn probe_reader<R: Read + Seek>(mut reader: R) -> Result<Detection, Error> {
        let mut diagnostics = Vec::new();
        let format = if !has_signature_at(reader.by_ref(), &elf::MAGIC[..], 0)? {
            Self::Invalid
        } else if has_signature_at(reader.by_ref(), &TYPE_1_MAGIC[..], MAGIC_OFFSET)? {
            Self::Type1
        } else if has_signature_at(reader.by_ref(), &TYPE_2_MAGIC[..], MAGIC_OFFSET)? {
            Self::Type2
        } else if has_iso9660_signature(reader.by_ref())? {
            diagnostics.push(Diagnostic::MissingMagicBytes);
            Self::Type1
        } else {
            Self::Invalid
        };
        Ok(Detection {
            format,
            diagnostics,
        })
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of format detection.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Detection {
    pub format: Format,
    pub diagnostics: Vec<Diagnostic>,
}

/// Non-fatal findings of format detection.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Diagnostic {
    /// ISO 9660 image without the type 1 magic bytes; treated as type 1.
    MissingMagicBytes,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Self::MissingMagicBytes => {
                f.write_str("seems to be a type 1 bundle without magic bytes")
            }
        }
    }
}

fn has_iso9660_signature<R: Read + Seek>(mut reader: R) -> Result<bool, Error> {
    for offset in ISO9660_OFFSETS {
        if has_signature_at(reader.by_ref(), &ISO9660_MAGIC[..], offset)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn has_signature_at<R: Read + Seek>(
    mut reader: R,
    signature: &[u8],
    offset: u64,
) -> Result<bool, Error> {
    let mut buf = [0_u8; 8];
    let buf = &mut buf[..signature.len()];
    reader.seek(SeekFrom::Start(offset))?;
    match reader.read_exact(buf) {
        Ok(()) => Ok(buf == signature),
        Err(ref e) if e.kind() == ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

pub const TYPE_1_MAGIC: [u8; 3] = [0x41, 0x49, 0x01];
pub const TYPE_2_MAGIC: [u8; 3] = [0x41, 0x49, 0x02];
pub const MAGIC_OFFSET: u64 = 8;
const ISO9660_MAGIC: [u8; 5] = *b"CD001";
const ISO9660_OFFSETS: [u64; 3] = [32769, 34817, 36865];

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::test::elf_stub;
    use crate::test::IsoBuilder;

    fn probe(data: &[u8]) -> Detection {
        Format::probe_reader(Cursor::new(data)).unwrap()
    }

    #[test]
    fn type_2() {
        let detection = probe(&elf_stub(TYPE_2_MAGIC));
        assert_eq!(Format::Type2, detection.format);
        assert!(detection.diagnostics.is_empty());
    }

    #[test]
    fn type_1() {
        let image = IsoBuilder::new().file("AppRun", b"#!/bin/sh\n").build();
        let detection = probe(&image);
        assert_eq!(Format::Type1, detection.format);
        assert!(detection.diagnostics.is_empty());
    }

    #[test]
    fn type_1_without_magic_bytes() {
        let image = IsoBuilder::new()
            .magic(*b"\0\0\0")
            .file("AppRun", b"#!/bin/sh\n")
            .build();
        let detection = probe(&image);
        assert_eq!(Format::Type1, detection.format);
        assert_eq!(vec![Diagnostic::MissingMagicBytes], detection.diagnostics);
    }

    #[test]
    fn elf_without_payload() {
        let detection = probe(&elf_stub(*b"\0\0\0"));
        assert_eq!(Format::Invalid, detection.format);
    }

    #[test]
    fn not_elf() {
        assert_eq!(Format::Invalid, probe(b"#!/bin/sh\necho hello\n").format);
        assert_eq!(Format::Invalid, probe(b"").format);
    }

    #[test]
    fn detection_is_deterministic() {
        arbtest::arbtest(|u| {
            let mut data: Vec<u8> = u.arbitrary()?;
            if u.arbitrary()? {
                let stub = elf_stub(if u.arbitrary()? {
                    TYPE_1_MAGIC
                } else {
                    TYPE_2_MAGIC
                });
                data.splice(0..0, stub);
            }
            assert_eq!(probe(&data), probe(&data));
            Ok(())
        });
    }
}
