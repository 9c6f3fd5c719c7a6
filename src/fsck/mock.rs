/* Backend with public fields, built from a real image and then broken on
purpose by the tests. */

use super::fsck_backend::FsckBackend;
use crate::dir::DirectoryEntry;
use crate::image::DiskImage;
use crate::inode::Inode;
use crate::layout::Geometry;

pub struct MockBackend {
    pub geometry: Geometry,
    pub data_start: u32,
    pub directory: Vec<DirectoryEntry>,
    pub inodes: Vec<Inode>,
    pub inode_bitmap: Vec<bool>,
    pub block_bitmap: Vec<bool>,
}

impl From<&DiskImage> for MockBackend {
    fn from(image: &DiskImage) -> Self {
        Self {
            geometry: FsckBackend::geometry(image),
            data_start: image.data_start(),
            directory: image.load_directory(),
            inodes: image.load_all_inodes(),
            inode_bitmap: image.load_inode_bitmap(),
            block_bitmap: image.load_block_bitmap(),
        }
    }
}

impl FsckBackend for MockBackend {
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn data_start(&self) -> u32 {
        self.data_start
    }

    fn load_directory(&self) -> Vec<DirectoryEntry> {
        self.directory.clone()
    }

    fn load_all_inodes(&self) -> Vec<Inode> {
        self.inodes.clone()
    }

    fn load_inode_bitmap(&self) -> Vec<bool> {
        self.inode_bitmap.clone()
    }

    fn load_block_bitmap(&self) -> Vec<bool> {
        self.block_bitmap.clone()
    }
}
