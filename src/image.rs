// src/image.rs
use std::ops::Range;

use log::{debug, trace};

use crate::bitmap::Bitmap;
use crate::block::BlockStore;
use crate::dir::{validate_name, Directory, DirectoryEntry};
use crate::error::{FsError, Resource, Result};
use crate::inode::{AttribOp, Attributes, Inode};
use crate::layout::{BlockId, Geometry, InodeId, Layout};
use crate::listing::{ListEntry, ListFilter, Listing};

/// In-memory state of one MFS image.
///
/// The directory, inode table and bitmaps are kept as separate containers;
/// they are flattened into the leading blocks of `store` only when the image
/// is persisted (see `persist.rs`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskImage {
    pub(crate) geometry: Geometry,
    pub(crate) layout: Layout,
    pub(crate) store: BlockStore,
    pub(crate) directory: Directory,
    pub(crate) inodes: Vec<Inode>,
    pub(crate) inode_map: Bitmap,
    pub(crate) block_map: Bitmap,
    pub(crate) delete_seq: u64,
}

impl DiskImage {
    /// Empty image: every entry, inode and data block free.
    pub fn new(geometry: Geometry) -> Result<Self> {
        let layout = geometry.validate()?;

        let mut block_map = Bitmap::new(geometry.num_blocks as usize);
        // Metadata blocks are never allocatable.
        for b in 0..layout.data_start as usize {
            block_map.mark_used(b);
        }

        Ok(Self {
            geometry,
            layout,
            store: BlockStore::new(geometry.block_size, geometry.num_blocks),
            directory: Directory::new(geometry.num_files),
            inodes: vec![Inode::empty(geometry.blocks_per_file); geometry.num_files as usize],
            inode_map: Bitmap::new(geometry.num_files as usize),
            block_map,
            delete_seq: 0,
        })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn inodes(&self) -> &[Inode] {
        &self.inodes
    }

    pub fn inode_map(&self) -> &Bitmap {
        &self.inode_map
    }

    pub fn block_map(&self) -> &Bitmap {
        &self.block_map
    }

    pub fn data_range(&self) -> Range<usize> {
        self.layout.data_start as usize..self.geometry.num_blocks as usize
    }

    // -------------------------------------------------------------------------
    // Allocator (first-fit, linear scans)
    // -------------------------------------------------------------------------

    pub fn find_free_block(&self) -> Option<BlockId> {
        self.block_map
            .first_free(self.data_range())
            .map(|b| b as BlockId)
    }

    pub fn find_free_inode(&self) -> Option<InodeId> {
        self.inode_map
            .first_free(0..self.inode_map.len())
            .map(|i| i as InodeId)
    }

    pub fn find_free_slot(&self, ino: InodeId) -> Option<usize> {
        self.inodes[ino as usize].find_free_slot()
    }

    pub fn find_free_entry(&self) -> Option<usize> {
        self.directory.find_free_entry()
    }

    /// Free bytes in the data region.
    pub fn df(&self) -> u64 {
        self.block_map.count_free(self.data_range()) as u64 * self.geometry.block_size as u64
    }

    // -------------------------------------------------------------------------
    // File operations
    // -------------------------------------------------------------------------

    /// Stores `data` as a new file called `name`.
    ///
    /// Either the whole file is stored or the image is left untouched.
    pub fn insert(&mut self, name: &str, data: &[u8]) -> Result<InodeId> {
        validate_name(name)?;
        if self.directory.lookup(name).is_some() {
            return Err(FsError::AlreadyExists(name.to_string()));
        }

        let size = data.len() as u64;
        let capacity = self.geometry.file_capacity();
        if size > capacity {
            return Err(FsError::TooLarge(format!(
                "{name} is {size} bytes, the limit is {capacity} bytes"
            )));
        }
        let free = self.df();
        if size > free {
            return Err(FsError::TooLarge(format!(
                "{name} is {size} bytes, only {free} bytes free"
            )));
        }

        let slot = self
            .find_free_entry()
            .ok_or(FsError::ResourceExhausted(Resource::DirectoryEntry))?;
        let ino = self
            .find_free_inode()
            .ok_or(FsError::ResourceExhausted(Resource::Inode))?;

        self.store_file(ino, data)?;

        let entry = self.directory.entry_mut(slot);
        entry.filename = name.to_string();
        entry.in_use = true;
        entry.inode_ref = Some(ino);
        entry.deleted_seq = None;

        debug!("insert {name}: {size} bytes, slot {slot}, inode {ino}");
        Ok(ino)
    }

    /// Claims inode `ino` and one block per chunk of `data`, then copies the bytes.
    /// On exhaustion every claim is released and the inode restored.
    fn store_file(&mut self, ino: InodeId, data: &[u8]) -> Result<()> {
        let bs = self.geometry.block_size;
        let previous = self.inodes[ino as usize].clone();

        self.inode_map.mark_used(ino as usize);
        self.inodes[ino as usize].clear();

        let mut claimed: Vec<BlockId> = Vec::new();
        for _ in data.chunks(bs) {
            let claim = match (self.find_free_block(), self.find_free_slot(ino)) {
                (Some(block), Some(slot)) => Ok((block, slot)),
                (None, _) => Err(Resource::Block),
                (_, None) => Err(Resource::InodeSlot),
            };
            let (block, slot) = match claim {
                Ok(c) => c,
                Err(resource) => {
                    debug!(
                        "out of {resource} after {} blocks, rolling back inode {ino}",
                        claimed.len()
                    );
                    for b in &claimed {
                        self.block_map.mark_free(*b as usize);
                    }
                    self.inodes[ino as usize] = previous;
                    self.inode_map.mark_free(ino as usize);
                    return Err(FsError::ResourceExhausted(resource));
                }
            };
            self.block_map.mark_used(block as usize);
            self.inodes[ino as usize].block_refs[slot] = Some(block);
            claimed.push(block);
        }

        for (block, chunk) in claimed.iter().zip(data.chunks(bs)) {
            trace!("inode {ino}: {} bytes -> block {block}", chunk.len());
            let dst = self.store.block_mut(*block);
            dst[..chunk.len()].copy_from_slice(chunk);
            dst[chunk.len()..].fill(0);
        }

        let inode = &mut self.inodes[ino as usize];
        inode.size = data.len() as u64;
        inode.in_use = true;
        Ok(())
    }

    /// Directory slot and inode of the in-use file `name`.
    fn lookup(&self, name: &str) -> Result<(usize, InodeId)> {
        let slot = self
            .directory
            .lookup(name)
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        let ino = self
            .directory
            .entry(slot)
            .inode_ref
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        Ok((slot, ino))
    }

    /// Inode of the in-use file `name`.
    pub fn stat(&self, name: &str) -> Result<&Inode> {
        let (_, ino) = self.lookup(name)?;
        Ok(&self.inodes[ino as usize])
    }

    /// File content as one slice per block, the last one cut to `size`.
    pub fn contents(&self, name: &str) -> Result<impl Iterator<Item = &[u8]> + '_> {
        let (_, ino) = self.lookup(name)?;
        let inode = &self.inodes[ino as usize];
        let bs = self.geometry.block_size as u64;
        let size = inode.size;

        Ok(inode.blocks().enumerate().map_while(move |(i, block)| {
            let start = i as u64 * bs;
            if start >= size {
                return None;
            }
            let len = (size - start).min(bs) as usize;
            Some(&self.store.block(block)[..len])
        }))
    }

    pub fn read_all(&self, name: &str) -> Result<Vec<u8>> {
        Ok(self.contents(name)?.flatten().copied().collect())
    }

    /// Soft delete. Blocks and the inode stay reserved until `erase`.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let (slot, ino) = self.lookup(name)?;
        if self.inodes[ino as usize]
            .attributes
            .contains(Attributes::READONLY)
        {
            return Err(FsError::PermissionDenied(name.to_string()));
        }

        self.delete_seq += 1;
        let entry = self.directory.entry_mut(slot);
        entry.in_use = false;
        entry.deleted_seq = Some(self.delete_seq);
        self.inodes[ino as usize].in_use = false;

        debug!("delete {name}: slot {slot}, inode {ino}, seq {}", self.delete_seq);
        Ok(())
    }

    /// Restores the most recent soft delete of `name`.
    pub fn undelete(&mut self, name: &str) -> Result<()> {
        if self.directory.lookup(name).is_some() {
            return Err(FsError::AlreadyExists(name.to_string()));
        }
        let slot = self
            .directory
            .latest_deleted(name)
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;

        let entry = self.directory.entry_mut(slot);
        entry.in_use = true;
        entry.deleted_seq = None;
        if let Some(ino) = entry.inode_ref {
            self.inodes[ino as usize].in_use = true;
        }

        debug!("undelete {name}: slot {slot}");
        Ok(())
    }

    /// Permanently erases every soft-deleted copy of `name`, returning how many.
    pub fn erase(&mut self, name: &str) -> Result<usize> {
        let slots: Vec<usize> = self.directory.deleted(name).collect();
        if slots.is_empty() {
            return Err(FsError::NotFound(name.to_string()));
        }

        for slot in &slots {
            if let Some(ino) = self.directory.entry(*slot).inode_ref {
                let inode = &mut self.inodes[ino as usize];
                for block in inode.blocks() {
                    self.block_map.mark_free(block as usize);
                }
                inode.clear();
                self.inode_map.mark_free(ino as usize);
            }
            *self.directory.entry_mut(*slot) = DirectoryEntry::empty();
        }

        debug!("erase {name}: {} entries released", slots.len());
        Ok(slots.len())
    }

    pub fn attrib(&mut self, op: AttribOp, name: &str) -> Result<Attributes> {
        let (_, ino) = self.lookup(name)?;
        let attrs = &mut self.inodes[ino as usize].attributes;
        op.apply(attrs);
        Ok(*attrs)
    }

    /// XORs the file content with `key`. Applying it twice restores the file.
    pub fn encrypt(&mut self, name: &str, key: u8) -> Result<()> {
        let (_, ino) = self.lookup(name)?;
        let inode = &self.inodes[ino as usize];
        let bs = self.geometry.block_size as u64;

        let mut remaining = inode.size;
        for block in inode.blocks() {
            if remaining == 0 {
                break;
            }
            let len = remaining.min(bs) as usize;
            for byte in &mut self.store.block_mut(block)[..len] {
                *byte ^= key;
            }
            remaining -= len as u64;
        }
        Ok(())
    }

    /// Bytes `[start, start + len)` of the file, clamped to its size.
    pub fn read(&self, name: &str, start: u64, len: u64) -> Result<Vec<u8>> {
        let (_, ino) = self.lookup(name)?;
        let inode = &self.inodes[ino as usize];
        let bs = self.geometry.block_size as u64;

        let end = start.saturating_add(len).min(inode.size);
        let mut out = Vec::with_capacity(end.saturating_sub(start) as usize);
        for offset in start..end {
            let index = (offset / bs) as usize;
            let Some(block) = inode.block_refs.get(index).copied().flatten() else {
                break;
            };
            out.push(self.store.block(block)[(offset % bs) as usize]);
        }
        Ok(out)
    }

    pub fn list(&self, filter: ListFilter) -> Listing {
        let entries = self
            .directory
            .entries()
            .iter()
            .filter(|e| e.in_use)
            .filter_map(|e| {
                let inode = &self.inodes[e.inode_ref? as usize];
                if inode.attributes.contains(Attributes::HIDDEN) && !filter.show_hidden {
                    return None;
                }
                Some(ListEntry {
                    name: e.filename.clone(),
                    attributes: inode.attributes,
                    size: inode.size,
                })
            })
            .collect();

        Listing {
            entries,
            show_attributes: filter.show_attributes,
        }
    }
}
