// src/layout.rs
use crate::error::{FsError, Result};

// -----------------------------------------------------------------------------
// MFS constants
// -----------------------------------------------------------------------------

pub const BLOCK_SIZE: usize = 1024;
pub const NUM_BLOCKS: u32 = 65536;
pub const NUM_FILES: u32 = 256;
pub const BLOCKS_PER_FILE: u32 = 1024;
pub const MAX_FILE_SIZE: u64 = 1_048_576;
pub const NAME_LEN: usize = 64;

pub const MFS_MAGIC: u32 = 0x4D46_5331; // "MFS1"
pub const MFS_VERSION: u32 = 1;
pub const SUPERBLOCK_SIZE: usize = 64;

/// name, in_use, 3 bytes padding, inode, deleted_seq
pub const DIRENT_SIZE: usize = NAME_LEN + 16;
/// in_use, attributes, 6 bytes padding, size
pub const INODE_HEADER_SIZE: usize = 16;
pub const BLOCK_REF_SIZE: usize = 4;

/// On-disk marker for an absent block or inode reference.
pub const NO_REF: u32 = u32::MAX;

pub type BlockId = u32;
pub type InodeId = u32;

// -----------------------------------------------------------------------------
// Geometry
// -----------------------------------------------------------------------------

/// Shape of an image. Stored in the superblock so images describe themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub block_size: usize,
    pub num_blocks: u32,
    pub num_files: u32,
    pub blocks_per_file: u32,
    pub max_file_size: u64,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            block_size: BLOCK_SIZE,
            num_blocks: NUM_BLOCKS,
            num_files: NUM_FILES,
            blocks_per_file: BLOCKS_PER_FILE,
            max_file_size: MAX_FILE_SIZE,
        }
    }
}

/// Block ranges of each metadata region, in image order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub dir_start: u32,
    pub dir_blocks: u32,
    pub inode_start: u32,
    pub inode_blocks: u32,
    pub inode_map_start: u32,
    pub inode_map_blocks: u32,
    pub block_map_start: u32,
    pub block_map_blocks: u32,
    pub data_start: u32,
}

impl Geometry {
    pub fn image_size(&self) -> u64 {
        self.num_blocks as u64 * self.block_size as u64
    }

    pub fn inode_size(&self) -> usize {
        INODE_HEADER_SIZE + self.blocks_per_file as usize * BLOCK_REF_SIZE
    }

    /// Largest file the image accepts: the byte cap or the inode's block capacity,
    /// whichever is smaller.
    pub fn file_capacity(&self) -> u64 {
        let by_blocks = self.blocks_per_file as u64 * self.block_size as u64;
        self.max_file_size.min(by_blocks)
    }

    /// Number of blocks needed to hold `size` bytes.
    pub fn blocks_for(&self, size: u64) -> u64 {
        size.div_ceil(self.block_size as u64)
    }

    /// Checks that the metadata fits and leaves a non-empty data region.
    pub fn validate(&self) -> Result<Layout> {
        if self.block_size < SUPERBLOCK_SIZE || self.block_size > u32::MAX as usize {
            return Err(FsError::InvalidArgument(format!(
                "block size {} must be between {} and {}",
                self.block_size,
                SUPERBLOCK_SIZE,
                u32::MAX
            )));
        }
        if self.num_files == 0 || self.blocks_per_file == 0 || self.max_file_size == 0 {
            return Err(FsError::InvalidArgument(
                "file count, blocks per file and max file size must be non-zero".into(),
            ));
        }
        if usize::try_from(self.image_size()).is_err() {
            return Err(FsError::InvalidArgument(format!(
                "image of {} bytes does not fit in memory",
                self.image_size()
            )));
        }

        let layout = self.compute_layout();
        if layout.data_start as u64 >= self.num_blocks as u64 {
            return Err(FsError::InvalidArgument(format!(
                "no room for data blocks: metadata needs {} of {} blocks",
                layout.data_start, self.num_blocks
            )));
        }
        Ok(layout)
    }

    /// Layout of a geometry that already passed `validate`.
    pub fn layout(&self) -> Layout {
        self.compute_layout()
    }

    fn compute_layout(&self) -> Layout {
        let bs = self.block_size as u64;
        let region = |bytes: u64| -> u64 { bytes.div_ceil(bs).max(1) };

        let dir_blocks = region(self.num_files as u64 * DIRENT_SIZE as u64);
        let inode_blocks = region(self.num_files as u64 * self.inode_size() as u64);
        let inode_map_blocks = region((self.num_files as u64).div_ceil(8));
        let block_map_blocks = region((self.num_blocks as u64).div_ceil(8));

        // Block 0 holds the superblock.
        let dir_start = 1u64;
        let inode_start = dir_start + dir_blocks;
        let inode_map_start = inode_start + inode_blocks;
        let block_map_start = inode_map_start + inode_map_blocks;
        let data_start = block_map_start + block_map_blocks;

        let clamp = |v: u64| v.min(u32::MAX as u64) as u32;
        Layout {
            dir_start: clamp(dir_start),
            dir_blocks: clamp(dir_blocks),
            inode_start: clamp(inode_start),
            inode_blocks: clamp(inode_blocks),
            inode_map_start: clamp(inode_map_start),
            inode_map_blocks: clamp(inode_map_blocks),
            block_map_start: clamp(block_map_start),
            block_map_blocks: clamp(block_map_blocks),
            data_start: clamp(data_start),
        }
    }
}

// -----------------------------------------------------------------------------
// Superblock
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperblockDisk {
    pub magic: u32,
    pub version: u32,
    pub block_size: u32,
    pub num_blocks: u32,
    pub num_files: u32,
    pub blocks_per_file: u32,
    pub max_file_size: u64,
    pub delete_seq: u64,
    pub data_start: u32,
}

impl SuperblockDisk {
    pub fn new(geometry: &Geometry, delete_seq: u64) -> Self {
        Self {
            magic: MFS_MAGIC,
            version: MFS_VERSION,
            block_size: geometry.block_size as u32,
            num_blocks: geometry.num_blocks,
            num_files: geometry.num_files,
            blocks_per_file: geometry.blocks_per_file,
            max_file_size: geometry.max_file_size,
            delete_seq,
            data_start: geometry.layout().data_start,
        }
    }

    pub fn geometry(&self) -> Geometry {
        Geometry {
            block_size: self.block_size as usize,
            num_blocks: self.num_blocks,
            num_files: self.num_files,
            blocks_per_file: self.blocks_per_file,
            max_file_size: self.max_file_size,
        }
    }

    pub fn encode(&self) -> [u8; SUPERBLOCK_SIZE] {
        let mut buf = [0u8; SUPERBLOCK_SIZE];
        put_u32(&mut buf, 0, self.magic);
        put_u32(&mut buf, 4, self.version);
        put_u32(&mut buf, 8, self.block_size);
        put_u32(&mut buf, 12, self.num_blocks);
        put_u32(&mut buf, 16, self.num_files);
        put_u32(&mut buf, 20, self.blocks_per_file);
        put_u64(&mut buf, 24, self.max_file_size);
        put_u64(&mut buf, 32, self.delete_seq);
        put_u32(&mut buf, 40, self.data_start);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < SUPERBLOCK_SIZE {
            return Err(FsError::InvalidFormat(format!(
                "{} bytes is too short for a superblock",
                buf.len()
            )));
        }

        let sb = Self {
            magic: get_u32(buf, 0),
            version: get_u32(buf, 4),
            block_size: get_u32(buf, 8),
            num_blocks: get_u32(buf, 12),
            num_files: get_u32(buf, 16),
            blocks_per_file: get_u32(buf, 20),
            max_file_size: get_u64(buf, 24),
            delete_seq: get_u64(buf, 32),
            data_start: get_u32(buf, 40),
        };

        if sb.magic != MFS_MAGIC {
            return Err(FsError::InvalidFormat(format!(
                "bad magic (expected {:#X}, found {:#X})",
                MFS_MAGIC, sb.magic
            )));
        }
        if sb.version != MFS_VERSION {
            return Err(FsError::InvalidFormat(format!(
                "unsupported version (expected {}, found {})",
                MFS_VERSION, sb.version
            )));
        }
        Ok(sb)
    }
}

// -------------------- little-endian helpers --------------------

pub(crate) fn put_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_u64(buf: &mut [u8], off: usize, v: u64) {
    buf[off..off + 8].copy_from_slice(&v.to_le_bytes());
}

pub(crate) fn get_u32(buf: &[u8], off: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[off..off + 4]);
    u32::from_le_bytes(raw)
}

pub(crate) fn get_u64(buf: &[u8], off: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[off..off + 8]);
    u64::from_le_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout() {
        let layout = Geometry::default().validate().unwrap();
        assert_eq!(layout.dir_start, 1);
        assert_eq!(layout.dir_blocks, 20); // 256 * 80 bytes
        assert_eq!(layout.inode_blocks, 1028); // 256 * 4112 bytes
        assert_eq!(layout.inode_map_blocks, 1);
        assert_eq!(layout.block_map_blocks, 8);
        assert_eq!(layout.data_start, 1058);
    }

    #[test]
    fn regions_follow_each_other() {
        let g = Geometry {
            block_size: 128,
            num_blocks: 256,
            num_files: 8,
            blocks_per_file: 16,
            max_file_size: 2048,
        };
        let l = g.validate().unwrap();
        assert_eq!(l.inode_start, l.dir_start + l.dir_blocks);
        assert_eq!(l.inode_map_start, l.inode_start + l.inode_blocks);
        assert_eq!(l.block_map_start, l.inode_map_start + l.inode_map_blocks);
        assert_eq!(l.data_start, l.block_map_start + l.block_map_blocks);
    }

    #[test]
    fn rejects_geometry_without_data_region() {
        let g = Geometry {
            num_blocks: 4,
            ..Geometry::default()
        };
        assert!(matches!(g.validate(), Err(FsError::InvalidArgument(_))));

        let tiny = Geometry {
            block_size: 16,
            ..Geometry::default()
        };
        assert!(matches!(tiny.validate(), Err(FsError::InvalidArgument(_))));
    }

    #[test]
    fn file_capacity_is_the_smaller_limit() {
        let g = Geometry {
            block_size: 1024,
            num_blocks: 64,
            num_files: 4,
            blocks_per_file: 2,
            max_file_size: 10_000,
        };
        assert_eq!(g.file_capacity(), 2048);
        assert_eq!(g.blocks_for(2500), 3);
        assert_eq!(g.blocks_for(0), 0);
    }

    #[test]
    fn superblock_codec() {
        let g = Geometry::default();
        let sb = SuperblockDisk::new(&g, 7);
        let decoded = SuperblockDisk::decode(&sb.encode()).unwrap();
        assert_eq!(decoded, sb);
        assert_eq!(decoded.geometry(), g);
    }

    #[test]
    fn superblock_rejects_foreign_bytes() {
        let mut raw = SuperblockDisk::new(&Geometry::default(), 0).encode();
        raw[0] ^= 0xFF;
        assert!(matches!(
            SuperblockDisk::decode(&raw),
            Err(FsError::InvalidFormat(_))
        ));
        assert!(matches!(
            SuperblockDisk::decode(&raw[..10]),
            Err(FsError::InvalidFormat(_))
        ));
    }
}
