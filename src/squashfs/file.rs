use std::io::Error;
use std::io::ErrorKind;
use std::io::Read;
use std::io::Seek;

use crate::squashfs::image_position;
use crate::squashfs::FileInode;
use crate::squashfs::SquashFs;
use crate::squashfs::UNCOMPRESSED_DATA;

/// Streams the contents of a regular file block by block.
pub struct FileReader<'a, R: Read + Seek> {
    fs: &'a mut SquashFs<R>,
    inode: FileInode,
    /// Index of the next data block.
    block: usize,
    /// Position of the next data block in the image.
    position: u64,
    buf: Vec<u8>,
    buf_offset: usize,
    remaining: u64,
    fragment_done: bool,
}

impl<'a, R: Read + Seek> FileReader<'a, R> {
    pub fn new(fs: &'a mut SquashFs<R>, inode: FileInode) -> Self {
        Self {
            fs,
            position: inode.blocks_start,
            remaining: inode.file_size,
            inode,
            block: 0,
            buf: Vec::new(),
            buf_offset: 0,
            fragment_done: false,
        }
    }

    fn fill_buf(&mut self) -> Result<(), Error> {
        let block_size = self.fs.superblock().block_size as u64;
        if let Some(size) = self.inode.block_sizes.get(self.block).copied() {
            self.block += 1;
            let expected = self.remaining.min(block_size) as usize;
            self.buf = if size == 0 {
                vec![0_u8; expected]
            } else {
                let data = self.fs.read_data_block(self.position, size)?;
                self.position =
                    image_position(&[self.position, (size & !UNCOMPRESSED_DATA) as u64])?;
                data
            };
            if self.buf.len() < expected {
                return Err(Error::new(ErrorKind::InvalidData, "truncated data block"));
            }
            self.buf.truncate(expected);
        } else if self.inode.has_fragment() && !self.fragment_done {
            self.fragment_done = true;
            let fragment = self.fs.fragment(self.inode.fragment)?;
            let data = self.fs.read_data_block(fragment.start, fragment.size)?;
            let start = self.inode.fragment_offset as usize;
            let tail = usize::try_from(self.remaining)
                .ok()
                .and_then(|len| start.checked_add(len))
                .and_then(|end| data.get(start..end));
            let Some(tail) = tail else {
                return Err(Error::new(ErrorKind::InvalidData, "truncated fragment"));
            };
            self.buf = tail.to_vec();
        } else {
            return Err(Error::new(ErrorKind::UnexpectedEof, "missing data blocks"));
        }
        self.buf_offset = 0;
        Ok(())
    }
}

impl<R: Read + Seek> Read for FileReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        if self.buf_offset == self.buf.len() {
            self.fill_buf()?;
        }
        let n = (self.buf.len() - self.buf_offset)
            .min(buf.len())
            .min(self.remaining as usize);
        buf[..n].copy_from_slice(&self.buf[self.buf_offset..self.buf_offset + n]);
        self.buf_offset += n;
        self.remaining -= n as u64;
        Ok(n)
    }
}
