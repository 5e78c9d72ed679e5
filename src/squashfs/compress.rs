use std::io::Error;
use std::io::ErrorKind;
use std::io::Read;

use flate2::read::ZlibDecoder;
use xz::read::XzDecoder;

use crate::squashfs::Compressor;

impl Compressor {
    /// Decompresses one block that is known to be at most `max_len` bytes long.
    pub fn decompress(self, data: &[u8], max_len: usize) -> Result<Vec<u8>, Error> {
        let mut output = Vec::with_capacity(max_len);
        match self {
            Self::Gzip => {
                ZlibDecoder::new(data)
                    .take(max_len as u64 + 1)
                    .read_to_end(&mut output)?;
            }
            Self::Xz => {
                XzDecoder::new(data)
                    .take(max_len as u64 + 1)
                    .read_to_end(&mut output)?;
            }
            Self::Zstd => {
                output = zstd::bulk::decompress(data, max_len)?;
            }
            other => {
                return Err(Error::new(
                    ErrorKind::Unsupported,
                    format!("unsupported compression {}", other),
                ))
            }
        }
        if output.len() > max_len {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("decompressed block is larger than {} bytes", max_len),
            ));
        }
        Ok(output)
    }
}
