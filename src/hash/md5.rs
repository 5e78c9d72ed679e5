use std::io::Read;

use crate::hash::Hasher;

impl Hasher for md5::Context {
    type Output = Md5Hash;

    fn new() -> Self {
        md5::Context::new()
    }

    fn update(&mut self, data: &[u8]) {
        self.consume(data);
    }

    fn finalize(self) -> Self::Output {
        self.compute()
    }
}

pub type Md5Hash = md5::Digest;

/// Computes MD5 of the stream and renders it as lowercase hex.
pub fn md5_hex<R: Read>(reader: R) -> Result<String, std::io::Error> {
    let (hash, _nread) = <md5::Context as Hasher>::compute_reader(reader)?;
    Ok(hex::encode(hash.0))
}

/// Computes MD5 of the string and renders it as lowercase hex.
pub fn md5_hex_str(data: &str) -> String {
    let hash = <md5::Context as Hasher>::compute(data.as_bytes());
    hex::encode(hash.0)
}
