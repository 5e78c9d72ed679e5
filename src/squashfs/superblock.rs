use std::io::Error;
use std::io::ErrorKind;
use std::io::Read;
use std::io::Write;

use crate::macros::define_int_enum;

define_int_enum! {
    /// Compression algorithm of data and metadata blocks.
    pub enum Compressor: u16 {
        Gzip = 1 => "gzip",
        Lzma = 2 => "lzma",
        Lzo = 3 => "lzo",
        Xz = 4 => "xz",
        Lz4 = 5 => "lz4",
        Zstd = 6 => "zstd",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(test, derive(arbitrary::Arbitrary))]
pub struct Superblock {
    pub inode_count: u32,
    pub mtime: u32,
    pub block_size: u32,
    pub fragment_count: u32,
    pub compressor: Compressor,
    pub block_log: u16,
    pub flags: u16,
    pub id_count: u16,
    pub root_inode: u64,
    pub bytes_used: u64,
    pub id_table: u64,
    pub xattr_table: u64,
    pub inode_table: u64,
    pub directory_table: u64,
    pub fragment_table: u64,
    pub export_table: u64,
}

impl Superblock {
    pub fn read<R: Read>(mut reader: R) -> Result<Self, Error> {
        let mut header = [0_u8; SUPERBLOCK_LEN];
        reader.read_exact(&mut header[..])?;
        if header[0..MAGIC.len()] != MAGIC[..] {
            return Err(Error::new(ErrorKind::InvalidData, "not a squashfs image"));
        }
        let major = u16_read(&header[28..30]);
        let minor = u16_read(&header[30..32]);
        if (major, minor) != (4, 0) {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("unsupported squashfs version {}.{}", major, minor),
            ));
        }
        let superblock = Self {
            inode_count: u32_read(&header[4..8]),
            mtime: u32_read(&header[8..12]),
            block_size: u32_read(&header[12..16]),
            fragment_count: u32_read(&header[16..20]),
            compressor: u16_read(&header[20..22]).try_into()?,
            block_log: u16_read(&header[22..24]),
            flags: u16_read(&header[24..26]),
            id_count: u16_read(&header[26..28]),
            root_inode: u64_read(&header[32..40]),
            bytes_used: u64_read(&header[40..48]),
            id_table: u64_read(&header[48..56]),
            xattr_table: u64_read(&header[56..64]),
            inode_table: u64_read(&header[64..72]),
            directory_table: u64_read(&header[72..80]),
            fragment_table: u64_read(&header[80..88]),
            export_table: u64_read(&header[88..96]),
        };
        if !(MIN_BLOCK_LOG..=MAX_BLOCK_LOG).contains(&superblock.block_log)
            || superblock.block_size != 1 << superblock.block_log
        {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!(
                    "invalid block size {} (log {})",
                    superblock.block_size, superblock.block_log
                ),
            ));
        }
        Ok(superblock)
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<(), Error> {
        writer.write_all(&MAGIC[..])?;
        writer.write_all(&self.inode_count.to_le_bytes()[..])?;
        writer.write_all(&self.mtime.to_le_bytes()[..])?;
        writer.write_all(&self.block_size.to_le_bytes()[..])?;
        writer.write_all(&self.fragment_count.to_le_bytes()[..])?;
        writer.write_all(&u16::from(self.compressor).to_le_bytes()[..])?;
        writer.write_all(&self.block_log.to_le_bytes()[..])?;
        writer.write_all(&self.flags.to_le_bytes()[..])?;
        writer.write_all(&self.id_count.to_le_bytes()[..])?;
        writer.write_all(&4_u16.to_le_bytes()[..])?;
        writer.write_all(&0_u16.to_le_bytes()[..])?;
        writer.write_all(&self.root_inode.to_le_bytes()[..])?;
        writer.write_all(&self.bytes_used.to_le_bytes()[..])?;
        writer.write_all(&self.id_table.to_le_bytes()[..])?;
        writer.write_all(&self.xattr_table.to_le_bytes()[..])?;
        writer.write_all(&self.inode_table.to_le_bytes()[..])?;
        writer.write_all(&self.directory_table.to_le_bytes()[..])?;
        writer.write_all(&self.fragment_table.to_le_bytes()[..])?;
        writer.write_all(&self.export_table.to_le_bytes()[..])?;
        Ok(())
    }
}

pub(crate) fn u16_read(data: &[u8]) -> u16 {
    u16::from_le_bytes([data[0], data[1]])
}

pub(crate) fn u32_read(data: &[u8]) -> u32 {
    u32::from_le_bytes([data[0], data[1], data[2], data[3]])
}

pub(crate) fn u64_read(data: &[u8]) -> u64 {
    u64::from_le_bytes([
        data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
    ])
}

pub const SUPERBLOCK_LEN: usize = 96;
pub const MAGIC: [u8; 4] = *b"hsqs";
pub const NO_FRAGMENTS: u16 = 0x0010;
pub const METADATA_BLOCK_LEN: usize = 8192;
const MIN_BLOCK_LOG: u16 = 12;
const MAX_BLOCK_LOG: u16 = 20;
