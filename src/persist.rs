// src/persist.rs
use std::fs;
use std::path::Path;

use log::debug;

use crate::bitmap::Bitmap;
use crate::block::BlockStore;
use crate::dir::Directory;
use crate::error::{FsError, Result};
use crate::image::DiskImage;
use crate::inode::Inode;
use crate::layout::{Geometry, Layout, SuperblockDisk, DIRENT_SIZE, SUPERBLOCK_SIZE};

// -----------------------------------------------------------------------------
// Whole-image codec
// -----------------------------------------------------------------------------

impl DiskImage {
    /// Writes the superblock, directory, inode table and bitmaps into their
    /// blocks so the store holds the complete image.
    pub fn flush_metadata(&mut self) {
        let layout = self.layout;
        let inode_size = self.geometry.inode_size();

        let sb = SuperblockDisk::new(&self.geometry, self.delete_seq);
        let block0 = self.store.block_mut(0);
        block0.fill(0);
        block0[..SUPERBLOCK_SIZE].copy_from_slice(&sb.encode());

        self.directory
            .encode_into(self.store.region_mut(layout.dir_start, layout.dir_blocks));

        let table = self
            .store
            .region_mut(layout.inode_start, layout.inode_blocks);
        table.fill(0);
        for (i, inode) in self.inodes.iter().enumerate() {
            inode.encode_into(&mut table[i * inode_size..(i + 1) * inode_size]);
        }

        self.inode_map.encode_into(
            self.store
                .region_mut(layout.inode_map_start, layout.inode_map_blocks),
        );
        self.block_map.encode_into(
            self.store
                .region_mut(layout.block_map_start, layout.block_map_blocks),
        );
    }

    /// Complete image bytes, `num_blocks * block_size` long.
    pub fn to_bytes(&mut self) -> &[u8] {
        self.flush_metadata();
        self.store.as_bytes()
    }

    /// Parses a raw image. The length must match the geometry in its superblock.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let sb = SuperblockDisk::decode(&bytes)?;
        let geometry = sb.geometry();
        let layout = geometry
            .validate()
            .map_err(|e| FsError::InvalidFormat(format!("bad geometry: {e}")))?;

        if bytes.len() as u64 != geometry.image_size() {
            return Err(FsError::InvalidFormat(format!(
                "image is {} bytes, expected {} ({} blocks of {} bytes)",
                bytes.len(),
                geometry.image_size(),
                geometry.num_blocks,
                geometry.block_size
            )));
        }
        if sb.data_start != layout.data_start {
            return Err(FsError::InvalidFormat(format!(
                "data region starts at block {}, expected {}",
                sb.data_start, layout.data_start
            )));
        }

        let store = BlockStore::from_bytes(geometry.block_size, bytes);

        let dir_raw = store.region(layout.dir_start, layout.dir_blocks);
        debug_assert!(dir_raw.len() >= geometry.num_files as usize * DIRENT_SIZE);
        let directory = Directory::decode(dir_raw, geometry.num_files);

        let inode_size = geometry.inode_size();
        let inodes: Vec<Inode> = store
            .region(layout.inode_start, layout.inode_blocks)
            .chunks(inode_size)
            .take(geometry.num_files as usize)
            .map(|raw| Inode::decode(raw, geometry.blocks_per_file))
            .collect();
        check_references(&geometry, &layout, &directory, &inodes)?;

        let inode_map = Bitmap::decode(
            store.region(layout.inode_map_start, layout.inode_map_blocks),
            geometry.num_files as usize,
        );
        let block_map = Bitmap::decode(
            store.region(layout.block_map_start, layout.block_map_blocks),
            geometry.num_blocks as usize,
        );

        Ok(DiskImage {
            geometry,
            layout,
            store,
            directory,
            inodes,
            inode_map,
            block_map,
            delete_seq: sb.delete_seq,
        })
    }

    // -------------------------------------------------------------------------
    // Host file
    // -------------------------------------------------------------------------

    /// Loads the whole image at `path` into memory.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| FsError::from_io(path, e))?;
        debug!("loaded {} bytes from {:?}", bytes.len(), path);
        Self::from_bytes(bytes)
    }

    /// Rewrites the whole file at `path`.
    pub fn save_to(&mut self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes();
        fs::write(path, bytes).map_err(|e| FsError::io(path, e))?;
        debug!("saved {} bytes to {:?}", bytes.len(), path);
        Ok(())
    }
}

/// Every inode ref must name an inode and every block ref a data block.
fn check_references(
    geometry: &Geometry,
    layout: &Layout,
    directory: &Directory,
    inodes: &[Inode],
) -> Result<()> {
    for (slot, entry) in directory.entries().iter().enumerate() {
        if let Some(ino) = entry.inode_ref {
            if ino >= geometry.num_files {
                return Err(FsError::InvalidFormat(format!(
                    "directory slot {slot} points to inode {ino}, table has {}",
                    geometry.num_files
                )));
            }
        }
    }

    for (ino, inode) in inodes.iter().enumerate() {
        for block in inode.block_refs.iter().flatten() {
            if *block < layout.data_start || *block >= geometry.num_blocks {
                return Err(FsError::InvalidFormat(format!(
                    "inode {ino} references block {block} outside the data region {}..{}",
                    layout.data_start, geometry.num_blocks
                )));
            }
        }
    }
    Ok(())
}
