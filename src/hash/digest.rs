use std::io::ErrorKind;
use std::io::Read;

/// Incremental message digest.
pub trait Hasher: Sized {
    type Output;

    fn new() -> Self;
    fn update(&mut self, data: &[u8]);
    fn finalize(self) -> Self::Output;

    fn compute(data: &[u8]) -> Self::Output {
        let mut hasher = Self::new();
        hasher.update(data);
        hasher.finalize()
    }

    /// Digests the rest of the stream reading it in [`CHUNK_LEN`] chunks.
    ///
    /// Returns the digest and the number of bytes read.
    fn compute_reader<R: Read>(mut reader: R) -> Result<(Self::Output, u64), std::io::Error> {
        let mut hasher = Self::new();
        let mut buf = [0_u8; CHUNK_LEN];
        let mut nread: u64 = 0;
        loop {
            let n = match reader.read(&mut buf[..]) {
                Ok(0) => break,
                Ok(n) => n,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buf[..n]);
            nread += n as u64;
        }
        Ok((hasher.finalize(), nread))
    }
}

pub const CHUNK_LEN: usize = 4096;
