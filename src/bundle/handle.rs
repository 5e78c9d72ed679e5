use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::OnceLock;

use fs_err::File;

use crate::elf::elf_file_size;
use crate::format::Diagnostic;
use crate::format::Format;
use crate::hash::md5_hex;
use crate::hash::md5_hex_str;
use crate::payload::PayloadIterator;
use crate::Error;

/// An opened bundle file with a known format.
///
/// The handle is immutable and cheap to clone. Clones share the identity: two handles are equal
/// only if one is the clone of the other.
#[derive(Clone, Debug)]
pub struct Bundle {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    format: Format,
    diagnostics: Vec<Diagnostic>,
    payload_offset: OnceLock<u64>,
}

impl Bundle {
    /// Detects the format of the file.
    ///
    /// Fails with [`Error::Format`] if the file is not a bundle.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self, Error> {
        let path = path.into();
        let detection = Format::probe(&path)?;
        if detection.format == Format::Invalid {
            return Err(Error::Format(path));
        }
        Ok(Self {
            inner: Arc::new(Inner {
                path,
                format: detection.format,
                diagnostics: detection.diagnostics,
                payload_offset: OnceLock::new(),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        self.inner.path.as_path()
    }

    pub fn format(&self) -> Format {
        self.inner.format
    }

    /// Non-fatal findings of format detection.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.inner.diagnostics[..]
    }

    /// Returns the offset of the payload, i.e. the size of the ELF runtime.
    ///
    /// The offset is computed on the first call. For type 1 bundles the payload starts at the
    /// beginning of the file and the runtime lives in the ISO 9660 system area, so the value is
    /// only informational.
    pub fn payload_offset(&self) -> Result<u64, Error> {
        if let Some(offset) = self.inner.payload_offset.get() {
            return Ok(*offset);
        }
        let offset = elf_file_size(self.path())?;
        Ok(*self.inner.payload_offset.get_or_init(|| offset))
    }

    /// Starts a new traversal of the payload.
    pub fn files(&self) -> Result<PayloadIterator, Error> {
        PayloadIterator::new(self)
    }

    /// Returns the paths of all payload entries in traversal order.
    pub fn list_files(&self) -> Result<Vec<String>, Error> {
        let mut files = self.files()?;
        let mut paths = Vec::new();
        while !files.is_end() {
            paths.push(files.path()?.to_string());
            files.advance()?;
        }
        Ok(paths)
    }

    /// Returns MD5 of the `file://` URI of the canonical path.
    ///
    /// Desktop integration uses this value to name the files installed for the bundle.
    pub fn uri_digest(&self) -> Result<String, Error> {
        let path = fs_err::canonicalize(self.path())?;
        let uri = format!("file://{}", path.display());
        Ok(md5_hex_str(&uri))
    }

    /// Returns MD5 of the whole file.
    pub fn digest(&self) -> Result<String, Error> {
        Ok(md5_hex(File::open(self.path())?)?)
    }
}

impl PartialEq for Bundle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Bundle {}
