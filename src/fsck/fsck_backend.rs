/* What fsck needs to read from an image. `DiskImage` is the real backend;
tests use `mock::MockBackend` to feed deliberately broken state. */

use crate::dir::DirectoryEntry;
use crate::image::DiskImage;
use crate::inode::Inode;
use crate::layout::Geometry;

pub trait FsckBackend {
    fn geometry(&self) -> Geometry;
    /// First data block as recorded by the image.
    fn data_start(&self) -> u32;
    fn load_directory(&self) -> Vec<DirectoryEntry>;
    fn load_all_inodes(&self) -> Vec<Inode>;
    fn load_inode_bitmap(&self) -> Vec<bool>;
    fn load_block_bitmap(&self) -> Vec<bool>;
}

impl FsckBackend for DiskImage {
    fn geometry(&self) -> Geometry {
        *DiskImage::geometry(self)
    }

    fn data_start(&self) -> u32 {
        self.layout().data_start
    }

    fn load_directory(&self) -> Vec<DirectoryEntry> {
        self.directory().entries().to_vec()
    }

    fn load_all_inodes(&self) -> Vec<Inode> {
        self.inodes().to_vec()
    }

    fn load_inode_bitmap(&self) -> Vec<bool> {
        self.inode_map().as_slice().to_vec()
    }

    fn load_block_bitmap(&self) -> Vec<bool> {
        self.block_map().as_slice().to_vec()
    }
}
