mod bitmap;
mod block;
pub mod command;
mod dir;
mod error;
mod fs;
pub mod fsck;
mod image;
mod inode;
mod layout;
mod listing;
pub mod logger;
mod persist;

#[cfg(test)]
mod test_util;

pub use crate::bitmap::Bitmap;
pub use crate::block::BlockStore;
pub use crate::dir::{Directory, DirectoryEntry};
pub use crate::error::{FsError, Resource, Result};
pub use crate::fs::{parse_key, MfsFilesystem};
pub use crate::image::DiskImage;
pub use crate::inode::{AttribOp, Attributes, Inode};
pub use crate::layout::{
    BlockId, Geometry, InodeId, Layout, SuperblockDisk, BLOCK_SIZE, MFS_MAGIC, MFS_VERSION,
    NAME_LEN, NUM_BLOCKS,
};
pub use crate::listing::{HexDump, ListEntry, ListFilter, Listing};
