use std::collections::HashMap;
use std::collections::VecDeque;
use std::io::Error;
use std::io::ErrorKind;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::rc::Rc;

use crate::squashfs::u16_read;
use crate::squashfs::u32_read;
use crate::squashfs::u64_read;
use crate::squashfs::DirEntry;
use crate::squashfs::DirInode;
use crate::squashfs::FileInode;
use crate::squashfs::Inode;
use crate::squashfs::InodeData;
use crate::squashfs::InodeKind;
use crate::squashfs::Superblock;
use crate::squashfs::DIR_ENTRY_LEN;
use crate::squashfs::DIR_HEADER_LEN;
use crate::squashfs::INODE_HEADER_LEN;
use crate::squashfs::MAX_DIR_HEADER_ENTRIES;
use crate::squashfs::METADATA_BLOCK_LEN;
use crate::squashfs::UNCOMPRESSED_DATA;
use crate::squashfs::UNCOMPRESSED_METADATA;

/// SquashFS image that starts at `offset` bytes into `reader`.
pub struct SquashFs<R: Read + Seek> {
    reader: R,
    offset: u64,
    superblock: Superblock,
    metadata: HashMap<u64, (Rc<[u8]>, u64)>,
    fragments: Option<Vec<Fragment>>,
}

/// Position in a metadata table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    /// Absolute position of the metadata block header.
    block: u64,
    /// Offset in the uncompressed block.
    offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    pub start: u64,
    pub size: u32,
}

impl<R: Read + Seek> SquashFs<R> {
    pub fn new(mut reader: R, offset: u64) -> Result<Self, Error> {
        reader.seek(SeekFrom::Start(offset))?;
        let superblock = Superblock::read(reader.by_ref())?;
        Ok(Self {
            reader,
            offset,
            superblock,
            metadata: HashMap::new(),
            fragments: None,
        })
    }

    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    pub fn root(&mut self) -> Result<Inode, Error> {
        let inode = self.read_inode(self.superblock.root_inode)?;
        if !inode.is_dir() {
            return Err(Error::new(ErrorKind::InvalidData, "root inode is not a directory"));
        }
        Ok(inode)
    }

    pub fn read_inode(&mut self, inode_ref: u64) -> Result<Inode, Error> {
        let mut cursor = Cursor {
            block: image_position(&[self.offset, self.superblock.inode_table, inode_ref >> 16])?,
            offset: (inode_ref & 0xffff) as usize,
        };
        let mut header = [0_u8; INODE_HEADER_LEN];
        self.read_metadata(&mut cursor, &mut header[..])?;
        let kind: InodeKind = u16_read(&header[0..2]).try_into()?;
        let permissions = u16_read(&header[2..4]);
        let number = u32_read(&header[12..16]);
        let data = match kind {
            InodeKind::Dir => {
                let mut buf = [0_u8; 16];
                self.read_metadata(&mut cursor, &mut buf[..])?;
                InodeData::Dir(DirInode {
                    start_block: u32_read(&buf[0..4]),
                    file_size: u16_read(&buf[8..10]) as u32,
                    offset: u16_read(&buf[10..12]),
                })
            }
            InodeKind::ExtDir => {
                let mut buf = [0_u8; 24];
                self.read_metadata(&mut cursor, &mut buf[..])?;
                InodeData::Dir(DirInode {
                    file_size: u32_read(&buf[4..8]),
                    start_block: u32_read(&buf[8..12]),
                    offset: u16_read(&buf[18..20]),
                })
            }
            InodeKind::File => {
                let mut buf = [0_u8; 16];
                self.read_metadata(&mut cursor, &mut buf[..])?;
                self.read_file_inode(
                    &mut cursor,
                    u32_read(&buf[0..4]) as u64,
                    u32_read(&buf[4..8]),
                    u32_read(&buf[8..12]),
                    u32_read(&buf[12..16]) as u64,
                )?
            }
            InodeKind::ExtFile => {
                let mut buf = [0_u8; 40];
                self.read_metadata(&mut cursor, &mut buf[..])?;
                self.read_file_inode(
                    &mut cursor,
                    u64_read(&buf[0..8]),
                    u32_read(&buf[28..32]),
                    u32_read(&buf[32..36]),
                    u64_read(&buf[8..16]),
                )?
            }
            InodeKind::Symlink | InodeKind::ExtSymlink => {
                let mut buf = [0_u8; 8];
                self.read_metadata(&mut cursor, &mut buf[..])?;
                let len = u32_read(&buf[4..8]) as usize;
                if len > MAX_SYMLINK_LEN {
                    return Err(Error::new(ErrorKind::InvalidData, "symlink target is too long"));
                }
                let mut target = vec![0_u8; len];
                self.read_metadata(&mut cursor, &mut target[..])?;
                InodeData::Symlink(String::from_utf8_lossy(&target).into_owned())
            }
            other => InodeData::Other(other),
        };
        Ok(Inode {
            number,
            permissions,
            data,
        })
    }

    fn read_file_inode(
        &mut self,
        cursor: &mut Cursor,
        blocks_start: u64,
        fragment: u32,
        fragment_offset: u32,
        file_size: u64,
    ) -> Result<InodeData, Error> {
        let num_blocks = FileInode::num_blocks(file_size, fragment, self.superblock.block_size);
        if num_blocks > MAX_BLOCKS {
            return Err(Error::new(ErrorKind::InvalidData, "file is too large"));
        }
        let mut buf = vec![0_u8; num_blocks as usize * 4];
        self.read_metadata(cursor, &mut buf[..])?;
        let block_sizes = buf.chunks_exact(4).map(u32_read).collect();
        Ok(InodeData::File(FileInode {
            blocks_start,
            fragment,
            fragment_offset,
            file_size,
            block_sizes,
        }))
    }

    /// Reads the listing of the directory without the implicit `.` and `..` entries.
    pub fn read_dir(&mut self, dir: &Inode) -> Result<Vec<DirEntry>, Error> {
        let InodeData::Dir(dir) = &dir.data else {
            return Err(Error::new(ErrorKind::InvalidData, "not a directory"));
        };
        let mut cursor = Cursor {
            block: image_position(&[
                self.offset,
                self.superblock.directory_table,
                dir.start_block as u64,
            ])?,
            offset: dir.offset as usize,
        };
        let mut remaining = (dir.file_size as usize).saturating_sub(3);
        let mut entries = Vec::new();
        while remaining != 0 {
            let mut header = [0_u8; DIR_HEADER_LEN];
            remaining = consume(remaining, header.len())?;
            self.read_metadata(&mut cursor, &mut header[..])?;
            let count = u32_read(&header[0..4]);
            let start = u32_read(&header[4..8]) as u64;
            if count >= MAX_DIR_HEADER_ENTRIES {
                return Err(Error::new(ErrorKind::InvalidData, "invalid directory header"));
            }
            let count = count + 1;
            for _ in 0..count {
                let mut entry = [0_u8; DIR_ENTRY_LEN];
                remaining = consume(remaining, entry.len())?;
                self.read_metadata(&mut cursor, &mut entry[..])?;
                let name_len = u16_read(&entry[6..8]) as usize + 1;
                remaining = consume(remaining, name_len)?;
                let mut name = vec![0_u8; name_len];
                self.read_metadata(&mut cursor, &mut name[..])?;
                entries.push(DirEntry {
                    name: String::from_utf8_lossy(&name).into_owned(),
                    inode_ref: (start << 16) | u16_read(&entry[0..2]) as u64,
                    kind: u16_read(&entry[4..6]).try_into()?,
                });
            }
        }
        Ok(entries)
    }

    /// Finds the inode by path following symbolic links.
    ///
    /// Relative link targets are resolved against the directory of the link, absolute ones
    /// against the root of the image. Returns `None` if any component is missing.
    pub fn lookup(&mut self, path: &str) -> Result<Option<Inode>, Error> {
        let root = self.root()?;
        let mut dirs = vec![root.clone()];
        let mut current = root;
        let mut queue: VecDeque<String> = path.split('/').map(ToString::to_string).collect();
        let mut num_links = 0;
        while let Some(comp) = queue.pop_front() {
            match comp.as_str() {
                "" | "." => continue,
                ".." => {
                    if dirs.len() > 1 {
                        dirs.pop();
                    }
                    current = dirs[dirs.len() - 1].clone();
                    continue;
                }
                _ => {}
            }
            if !current.is_dir() {
                return Ok(None);
            }
            let Some(entry) = self
                .read_dir(&current)?
                .into_iter()
                .find(|entry| entry.name == comp)
            else {
                return Ok(None);
            };
            let inode = self.read_inode(entry.inode_ref)?;
            match &inode.data {
                InodeData::Symlink(target) => {
                    num_links += 1;
                    if num_links > MAX_SYMLINKS {
                        return Err(Error::new(
                            ErrorKind::InvalidData,
                            format!("too many levels of symbolic links: {}", path),
                        ));
                    }
                    if target.starts_with('/') {
                        dirs.truncate(1);
                    }
                    for comp in target.split('/').rev() {
                        queue.push_front(comp.to_string());
                    }
                    current = dirs[dirs.len() - 1].clone();
                }
                InodeData::Dir(..) => {
                    dirs.push(inode.clone());
                    current = inode;
                }
                _ => current = inode,
            }
        }
        Ok(Some(current))
    }

    /// Reads and decompresses the data block stored at `start` bytes into the image.
    pub(crate) fn read_data_block(&mut self, start: u64, size: u32) -> Result<Vec<u8>, Error> {
        let len = (size & !UNCOMPRESSED_DATA) as usize;
        if len > self.superblock.block_size as usize {
            return Err(Error::new(ErrorKind::InvalidData, "invalid data block size"));
        }
        self.reader
            .seek(SeekFrom::Start(image_position(&[self.offset, start])?))?;
        let mut data = vec![0_u8; len];
        self.reader.read_exact(&mut data[..])?;
        if size & UNCOMPRESSED_DATA != 0 {
            Ok(data)
        } else {
            self.superblock
                .compressor
                .decompress(&data[..], self.superblock.block_size as usize)
        }
    }

    pub(crate) fn fragment(&mut self, i: u32) -> Result<Fragment, Error> {
        if self.fragments.is_none() {
            self.fragments = Some(self.read_fragment_table()?);
        }
        self.fragments
            .as_ref()
            .and_then(|fragments| fragments.get(i as usize))
            .copied()
            .ok_or_else(|| Error::new(ErrorKind::InvalidData, "invalid fragment index"))
    }

    fn read_fragment_table(&mut self) -> Result<Vec<Fragment>, Error> {
        let count = self.superblock.fragment_count as usize;
        let num_blocks = (count * FRAGMENT_ENTRY_LEN).div_ceil(METADATA_BLOCK_LEN);
        let mut pointers = vec![0_u8; num_blocks * 8];
        self.reader.seek(SeekFrom::Start(image_position(&[
            self.offset,
            self.superblock.fragment_table,
        ])?))?;
        self.reader.read_exact(&mut pointers[..])?;
        let mut fragments = Vec::with_capacity(count);
        for pointer in pointers.chunks_exact(8) {
            let mut cursor = Cursor {
                block: image_position(&[self.offset, u64_read(pointer)])?,
                offset: 0,
            };
            let n = (count - fragments.len()).min(METADATA_BLOCK_LEN / FRAGMENT_ENTRY_LEN);
            let mut entries = vec![0_u8; n * FRAGMENT_ENTRY_LEN];
            self.read_metadata(&mut cursor, &mut entries[..])?;
            fragments.extend(entries.chunks_exact(FRAGMENT_ENTRY_LEN).map(|entry| Fragment {
                start: u64_read(&entry[0..8]),
                size: u32_read(&entry[8..12]),
            }));
        }
        Ok(fragments)
    }

    /// Fills `buf` with metadata starting at the cursor, crossing block boundaries as needed.
    fn read_metadata(&mut self, cursor: &mut Cursor, buf: &mut [u8]) -> Result<(), Error> {
        let mut filled = 0;
        while filled != buf.len() {
            let (block, next) = self.metadata_block(cursor.block)?;
            if cursor.offset >= block.len() {
                if cursor.offset > block.len() {
                    return Err(Error::new(ErrorKind::InvalidData, "invalid metadata offset"));
                }
                cursor.block = next;
                cursor.offset = 0;
                continue;
            }
            let n = (block.len() - cursor.offset).min(buf.len() - filled);
            buf[filled..filled + n].copy_from_slice(&block[cursor.offset..cursor.offset + n]);
            filled += n;
            cursor.offset += n;
        }
        Ok(())
    }

    /// Returns the uncompressed block and the position of the next block.
    fn metadata_block(&mut self, position: u64) -> Result<(Rc<[u8]>, u64), Error> {
        if let Some((block, next)) = self.metadata.get(&position) {
            return Ok((block.clone(), *next));
        }
        self.reader.seek(SeekFrom::Start(position))?;
        let mut header = [0_u8; 2];
        self.reader.read_exact(&mut header[..])?;
        let header = u16::from_le_bytes(header);
        let len = (header & !UNCOMPRESSED_METADATA) as usize;
        let mut data = vec![0_u8; len];
        self.reader.read_exact(&mut data[..])?;
        let data = if header & UNCOMPRESSED_METADATA != 0 {
            data
        } else {
            self.superblock
                .compressor
                .decompress(&data[..], METADATA_BLOCK_LEN)?
        };
        if data.is_empty() {
            return Err(Error::new(ErrorKind::InvalidData, "empty metadata block"));
        }
        let block: Rc<[u8]> = data.into();
        let next = image_position(&[position, 2, len as u64])?;
        if self.metadata.len() >= MAX_CACHED_BLOCKS {
            self.metadata.clear();
        }
        self.metadata.insert(position, (block.clone(), next));
        Ok((block, next))
    }
}

/// Sums positions read from the image, failing on overflow.
pub(crate) fn image_position(parts: &[u64]) -> Result<u64, Error> {
    parts
        .iter()
        .try_fold(0_u64, |sum, part| sum.checked_add(*part))
        .ok_or_else(|| Error::new(ErrorKind::InvalidData, "position is out of range"))
}

/// Depth-first walk over the directory tree.
#[derive(Default)]
pub struct Walker {
    stack: Vec<(String, std::vec::IntoIter<DirEntry>)>,
    started: bool,
}

impl Walker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next inode and its full path.
    pub fn next<R: Read + Seek>(
        &mut self,
        fs: &mut SquashFs<R>,
    ) -> Result<Option<(String, Inode)>, Error> {
        if !self.started {
            self.started = true;
            let root = fs.root()?;
            let entries = fs.read_dir(&root)?;
            self.stack.push((String::new(), entries.into_iter()));
        }
        loop {
            let Some((prefix, entries)) = self.stack.last_mut() else {
                return Ok(None);
            };
            let Some(entry) = entries.next() else {
                self.stack.pop();
                continue;
            };
            let path = if prefix.is_empty() {
                entry.name.clone()
            } else {
                format!("{}/{}", prefix, entry.name)
            };
            let inode = fs.read_inode(entry.inode_ref)?;
            if inode.is_dir() {
                if self.stack.len() >= MAX_DEPTH {
                    return Err(Error::new(
                        ErrorKind::InvalidData,
                        format!("directory tree is too deep: {}", path),
                    ));
                }
                let entries = fs.read_dir(&inode)?;
                self.stack.push((path.clone(), entries.into_iter()));
            }
            return Ok(Some((path, inode)));
        }
    }
}

fn consume(remaining: usize, len: usize) -> Result<usize, Error> {
    remaining
        .checked_sub(len)
        .ok_or_else(|| Error::new(ErrorKind::InvalidData, "directory listing overflow"))
}

const FRAGMENT_ENTRY_LEN: usize = 16;
const MAX_CACHED_BLOCKS: usize = 1024;
const MAX_SYMLINK_LEN: usize = 4096;
const MAX_SYMLINKS: usize = 32;
const MAX_DEPTH: usize = 256;
const MAX_BLOCKS: u64 = 1 << 24;

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use arbtest::arbtest;

    use super::*;
    use crate::squashfs::FileReader;
    use crate::test::SquashfsBuilder;

    const OFFSET: u64 = 1024;

    fn open(builder: &SquashfsBuilder) -> SquashFs<Cursor<Vec<u8>>> {
        SquashFs::new(Cursor::new(builder.build()), OFFSET).unwrap()
    }

    fn walk(fs: &mut SquashFs<Cursor<Vec<u8>>>) -> Vec<(String, Inode)> {
        let mut walker = Walker::new();
        let mut entries = Vec::new();
        while let Some(entry) = walker.next(fs).unwrap() {
            entries.push(entry);
        }
        entries
    }

    fn contents(fs: &mut SquashFs<Cursor<Vec<u8>>>, inode: &Inode) -> Vec<u8> {
        let InodeData::File(file) = &inode.data else {
            panic!("not a file: {:?}", inode);
        };
        let mut buf = Vec::new();
        FileReader::new(fs, file.clone())
            .read_to_end(&mut buf)
            .unwrap();
        buf
    }

    #[test]
    fn walk_in_directory_order() {
        let mut fs = open(
            &SquashfsBuilder::new()
                .file("b.txt", b"b")
                .file("a/c.txt", b"c")
                .symlink("a/link", "c.txt")
                .dir("empty")
                .fifo("pipe"),
        );
        let entries = walk(&mut fs);
        let paths: Vec<&str> = entries.iter().map(|(path, _)| path.as_str()).collect();
        similar_asserts::assert_eq!(
            vec!["a", "a/c.txt", "a/link", "b.txt", "empty", "pipe"],
            paths
        );
        assert!(entries[0].1.is_dir());
        assert_eq!(InodeData::Symlink("c.txt".into()), entries[2].1.data);
        assert_eq!(InodeData::Other(InodeKind::Fifo), entries[5].1.data);
        assert_eq!(b"c".to_vec(), contents(&mut fs, &entries[1].1));
    }

    #[test]
    fn read_files() {
        arbtest(|u| {
            let num_files = u.int_in_range(1..=5)?;
            let mut builder = SquashfsBuilder::new();
            if u.arbitrary()? {
                builder = builder.compressed();
            }
            if u.arbitrary()? {
                builder = builder.with_fragments();
            }
            if u.arbitrary()? {
                builder = builder.extended();
            }
            let mut expected = Vec::new();
            for i in 0..num_files {
                let len = u.int_in_range(0..=20_000)?;
                let mut data = vec![0_u8; len];
                u.fill_buffer(&mut data[..])?;
                builder = builder.file(&format!("dir/file-{}", i), &data);
                expected.push((format!("dir/file-{}", i), data));
            }
            let mut fs = open(&builder);
            let entries = walk(&mut fs);
            let mut actual = Vec::new();
            for (path, inode) in entries.iter().filter(|(_, inode)| !inode.is_dir()) {
                actual.push((path.clone(), contents(&mut fs, inode)));
            }
            similar_asserts::assert_eq!(expected, actual);
            Ok(())
        });
    }

    #[test]
    fn sparse_blocks() {
        let mut data = vec![0_u8; 4096 * 2];
        data.extend_from_slice(b"tail");
        let mut fs = open(&SquashfsBuilder::new().compressed().file("sparse", &data));
        let inode = fs.lookup("sparse").unwrap().unwrap();
        let InodeData::File(file) = &inode.data else {
            panic!("not a file");
        };
        assert_eq!(vec![0, 0], file.block_sizes[..2].to_vec());
        assert_eq!(data, contents(&mut fs, &inode));
    }

    #[test]
    fn metadata_spans_several_blocks() {
        let mut builder = SquashfsBuilder::new();
        let mut expected = Vec::new();
        for i in 0..600 {
            let name = format!("{:0>40}", i);
            builder = builder.file(&name, name.as_bytes());
            expected.push(name);
        }
        let mut fs = open(&builder);
        let entries = walk(&mut fs);
        let paths: Vec<String> = entries.iter().map(|(path, _)| path.clone()).collect();
        similar_asserts::assert_eq!(expected, paths);
        let (path, inode) = &entries[599];
        assert_eq!(path.as_bytes(), contents(&mut fs, inode));
    }

    #[test]
    fn lookup_follows_links() {
        let mut fs = open(
            &SquashfsBuilder::new()
                .file("usr/share/icons/app.png", b"png")
                .symlink("app.png", "usr/share/icons/app.png")
                .symlink("usr/bin/abs", "/app.png")
                .symlink("usr/up", "../usr/share/./icons")
                .symlink("loop-a", "loop-b")
                .symlink("loop-b", "loop-a"),
        );
        for path in ["app.png", "usr/bin/abs", "usr/up/app.png"] {
            let inode = fs.lookup(path).unwrap().unwrap();
            assert_eq!(b"png".to_vec(), contents(&mut fs, &inode), "path = {}", path);
        }
        assert_eq!(None, fs.lookup("missing").unwrap());
        assert_eq!(None, fs.lookup("app.png/child").unwrap());
        assert_eq!(
            ErrorKind::InvalidData,
            fs.lookup("loop-a").unwrap_err().kind()
        );
    }

    #[test]
    fn table_offsets_overflow() {
        let image = SquashfsBuilder::new().file("AppRun", b"run").build();
        // Inode and directory table positions in the superblock.
        for field in [OFFSET as usize + 64, OFFSET as usize + 72] {
            let mut data = image.clone();
            data[field..field + 8].copy_from_slice(&u64::MAX.to_le_bytes());
            let mut fs = SquashFs::new(Cursor::new(data), OFFSET).unwrap();
            let e = fs.root().and_then(|root| fs.read_dir(&root)).unwrap_err();
            assert_eq!(ErrorKind::InvalidData, e.kind());
        }
        assert!(image_position(&[u64::MAX - 1, 1]).is_ok());
        assert!(image_position(&[u64::MAX, 2, 0]).is_err());
    }

    #[test]
    fn not_squashfs() {
        let data = vec![0_u8; 4096];
        assert!(SquashFs::new(Cursor::new(data), 0).is_err());
    }
}
