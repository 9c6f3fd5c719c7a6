/* Consistency checker. Walks the directory, the inode table and both
bitmaps and reports every broken invariant it finds. Soft-deleted entries
own their inode and blocks until erased. */

pub mod fsck_backend;
pub mod fsck_types;
#[cfg(test)]
mod mock;

use std::collections::HashMap;

use log::debug;

use crate::dir::{validate_name, DirectoryEntry};
use crate::inode::Inode;
use crate::layout::Geometry;

use self::fsck_backend::FsckBackend;
use self::fsck_types::FsckReport;

/// Everything loaded from the backend once.
struct FsView {
    geometry: Geometry,
    data_start: u32,
    directory: Vec<DirectoryEntry>,
    inodes: Vec<Inode>,
    inode_bitmap: Vec<bool>,
    block_bitmap: Vec<bool>,
}

impl FsView {
    fn load<B: FsckBackend>(backend: &B) -> Self {
        Self {
            geometry: backend.geometry(),
            data_start: backend.data_start(),
            directory: backend.load_directory(),
            inodes: backend.load_all_inodes(),
            inode_bitmap: backend.load_inode_bitmap(),
            block_bitmap: backend.load_block_bitmap(),
        }
    }

    /// Inodes owned by a live or soft-deleted entry, with the number of owners.
    fn links(&self) -> HashMap<usize, usize> {
        let mut links = HashMap::new();
        for entry in &self.directory {
            if entry.is_free() {
                continue;
            }
            if let Some(ino) = entry.inode_ref {
                if (ino as usize) < self.inodes.len() {
                    *links.entry(ino as usize).or_insert(0) += 1;
                }
            }
        }
        links
    }
}

fn check_geometry(view: &FsView, report: &mut FsckReport) -> bool {
    let g = &view.geometry;

    // 1. The geometry itself
    let layout = match g.validate() {
        Ok(layout) => layout,
        Err(e) => {
            report.inode_error(format!("Superblock: {e}"));
            return false;
        }
    };

    // 2. Recorded data region start
    if view.data_start != layout.data_start {
        report.block_error(format!(
            "Superblock: data region starts at {}, layout says {}",
            view.data_start, layout.data_start
        ));
    }

    // 3. Table sizes
    let files = g.num_files as usize;
    if view.directory.len() != files {
        report.inode_error(format!(
            "Directory has {} slots, expected {}",
            view.directory.len(),
            files
        ));
    }
    if view.inodes.len() != files {
        report.inode_error(format!(
            "Inode table has {} inodes, expected {}",
            view.inodes.len(),
            files
        ));
    }
    if view.inode_bitmap.len() != files {
        report.inode_error(format!(
            "Inode bitmap has {} entries, expected {}",
            view.inode_bitmap.len(),
            files
        ));
    }
    if view.block_bitmap.len() != g.num_blocks as usize {
        report.block_error(format!(
            "Block bitmap has {} entries, expected {}",
            view.block_bitmap.len(),
            g.num_blocks
        ));
    }
    if view
        .inodes
        .iter()
        .any(|i| i.block_refs.len() != g.blocks_per_file as usize)
    {
        report.inode_error(format!(
            "Inode table: inodes must have {} block slots",
            g.blocks_per_file
        ));
    }

    report.is_clean()
}

fn check_directory(view: &FsView, report: &mut FsckReport) {
    let mut live_names: HashMap<&str, usize> = HashMap::new();

    for (slot, entry) in view.directory.iter().enumerate() {
        if entry.is_free() {
            if let Some(ino) = entry.inode_ref {
                report.inode_error(format!(
                    "Slot {slot}: free but still points to inode {ino}"
                ));
            }
            continue;
        }

        if validate_name(&entry.filename).is_err() {
            report.inode_error(format!(
                "Slot {slot}: invalid filename {:?}",
                entry.filename
            ));
        }

        let Some(ino) = entry.inode_ref else {
            report.inode_error(format!("Slot {slot}: '{}' has no inode", entry.filename));
            continue;
        };
        let Some(inode) = view.inodes.get(ino as usize) else {
            report.inode_error(format!(
                "Slot {slot}: '{}' points to missing inode {ino}",
                entry.filename
            ));
            continue;
        };

        if entry.in_use && !inode.in_use {
            report.inode_error(format!(
                "Slot {slot}: '{}' is live but inode {ino} is not",
                entry.filename
            ));
        }
        if !entry.in_use && inode.in_use {
            report.inode_error(format!(
                "Slot {slot}: '{}' is deleted but inode {ino} is still in use",
                entry.filename
            ));
        }

        if entry.in_use {
            if let Some(first) = live_names.insert(entry.filename.as_str(), slot) {
                report.inode_error(format!(
                    "Slots {first} and {slot}: duplicate name '{}'",
                    entry.filename
                ));
            }
        }
    }
}

fn check_inode_links(view: &FsView, report: &mut FsckReport) {
    let links = view.links();

    for (ino, inode) in view.inodes.iter().enumerate() {
        let count = links.get(&ino).copied().unwrap_or(0);
        if count > 1 {
            report.inode_error(format!(
                "Inode {ino}: referenced by {count} directory entries"
            ));
        }
        if inode.in_use && count == 0 {
            report.inode_error(format!("Inode {ino}: in use but orphaned"));
        }
        if !inode.in_use && count == 0 && (inode.size != 0 || inode.blocks().next().is_some()) {
            report.inode_error(format!("Inode {ino}: free but not cleared"));
        }
    }
}

fn check_inodes_basic(view: &FsView, report: &mut FsckReport) {
    let g = &view.geometry;
    let links = view.links();

    for (ino, inode) in view.inodes.iter().enumerate() {
        if !inode.in_use && !links.contains_key(&ino) {
            continue;
        }

        // 1. Populated references form a prefix
        let populated = inode.blocks().count();
        if inode.block_refs[populated..].iter().any(Option::is_some) {
            report.inode_error(format!("Inode {ino}: gap in block list"));
        }

        // 2. References stay inside the data region
        for block in inode.block_refs.iter().flatten() {
            if *block < view.data_start || *block >= g.num_blocks {
                report.block_error(format!(
                    "Inode {ino}: block {block} outside the data region"
                ));
            }
        }

        // 3. Size agrees with the block count
        let needed = g.blocks_for(inode.size);
        if needed != populated as u64 {
            report.inode_error(format!(
                "Inode {ino}: size {} needs {needed} blocks, has {populated}",
                inode.size
            ));
        }
        if inode.size > g.file_capacity() {
            report.inode_error(format!(
                "Inode {ino}: size {} exceeds the file limit {}",
                inode.size,
                g.file_capacity()
            ));
        }
    }
}

fn check_blocks_global(view: &FsView, report: &mut FsckReport) {
    let links = view.links();
    let mut owner: HashMap<u32, usize> = HashMap::new();

    let mut linked: Vec<usize> = links.keys().copied().collect();
    linked.sort_unstable();
    for ino in linked {
        for block in view.inodes[ino].block_refs.iter().flatten() {
            if let Some(first) = owner.insert(*block, ino) {
                report.block_error(format!(
                    "Block {block}: shared by inodes {first} and {ino}"
                ));
            }
        }
    }
}

fn check_block_bitmap(view: &FsView, report: &mut FsckReport) {
    let g = &view.geometry;
    let links = view.links();

    let mut referenced = vec![false; g.num_blocks as usize];
    for ino in links.keys() {
        for block in view.inodes[*ino].block_refs.iter().flatten() {
            if let Some(r) = referenced.get_mut(*block as usize) {
                *r = true;
            }
        }
    }

    for block in 0..g.num_blocks as usize {
        let used = view.block_bitmap[block];
        if block < view.data_start as usize {
            if !used {
                report.block_error(format!("Block {block}: metadata block marked free"));
            }
            continue;
        }
        if referenced[block] && !used {
            report.block_error(format!("Block {block}: referenced but marked free"));
        }
        if used && !referenced[block] {
            report.block_error(format!("Block {block}: marked used but unreferenced"));
        }
    }
}

fn check_inode_bitmap(view: &FsView, report: &mut FsckReport) {
    let links = view.links();
    for (ino, used) in view.inode_bitmap.iter().enumerate() {
        let linked = links.contains_key(&ino);
        if linked && !used {
            report.inode_error(format!("Inode {ino}: referenced but marked free"));
        }
        if *used && !linked {
            report.inode_error(format!("Inode {ino}: marked used but unreferenced"));
        }
    }
}

pub fn run_fsck<B: FsckBackend>(backend: &B) -> FsckReport {
    let mut report = FsckReport::new();
    let view = FsView::load(backend);

    // --- Step 1: geometry and table sizes ---
    if !check_geometry(&view, &mut report) {
        return report;
    }

    // --- Step 2: directory entries ---
    check_directory(&view, &mut report);

    // --- Step 3: inode ownership ---
    check_inode_links(&view, &mut report);

    // --- Step 4: per-inode block lists ---
    check_inodes_basic(&view, &mut report);

    // --- Step 5: aliasing ---
    check_blocks_global(&view, &mut report);

    // --- Step 6: bitmaps against reality ---
    check_block_bitmap(&view, &mut report);
    check_inode_bitmap(&view, &mut report);

    debug!("fsck finished with {} errors", report.errors.len());
    report
}
