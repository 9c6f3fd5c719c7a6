// src/dir.rs
use crate::error::{FsError, Result};
use crate::layout::{get_u32, get_u64, put_u32, put_u64, InodeId, DIRENT_SIZE, NAME_LEN, NO_REF};

/// Checks a flat-namespace filename: 1..=64 bytes, no `/`, no NUL.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(FsError::InvalidArgument("filename is empty".into()));
    }
    if name.len() > NAME_LEN {
        return Err(FsError::InvalidArgument(format!(
            "filename {name:?} is longer than {NAME_LEN} bytes"
        )));
    }
    if name.contains(['/', '\0']) {
        return Err(FsError::InvalidArgument(format!(
            "filename {name:?} contains a path separator"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub filename: String,
    pub in_use: bool,
    pub inode_ref: Option<InodeId>,
    /// Set while the entry is soft-deleted. Larger = deleted more recently.
    pub deleted_seq: Option<u64>,
}

impl DirectoryEntry {
    pub fn empty() -> Self {
        Self {
            filename: String::new(),
            in_use: false,
            inode_ref: None,
            deleted_seq: None,
        }
    }

    /// Neither live nor holding a soft-deleted file.
    pub fn is_free(&self) -> bool {
        !self.in_use && self.deleted_seq.is_none()
    }

    pub fn is_deleted(&self) -> bool {
        !self.in_use && self.deleted_seq.is_some()
    }

    fn encode_into(&self, out: &mut [u8]) {
        out.fill(0);
        let name = self.filename.as_bytes();
        out[..name.len()].copy_from_slice(name);
        out[NAME_LEN] = self.in_use as u8;
        put_u32(out, NAME_LEN + 4, self.inode_ref.unwrap_or(NO_REF));
        put_u64(out, NAME_LEN + 8, self.deleted_seq.unwrap_or(0));
    }

    fn decode(raw: &[u8]) -> Self {
        let name_end = raw[..NAME_LEN].iter().position(|b| *b == 0).unwrap_or(NAME_LEN);
        let inode = get_u32(raw, NAME_LEN + 4);
        let seq = get_u64(raw, NAME_LEN + 8);
        Self {
            filename: String::from_utf8_lossy(&raw[..name_end]).into_owned(),
            in_use: raw[NAME_LEN] != 0,
            inode_ref: (inode != NO_REF).then_some(inode),
            deleted_seq: (seq != 0).then_some(seq),
        }
    }
}

/// Fixed table of directory slots, scanned in slot order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    entries: Vec<DirectoryEntry>,
}

impl Directory {
    pub fn new(num_files: u32) -> Self {
        Self {
            entries: vec![DirectoryEntry::empty(); num_files as usize],
        }
    }

    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    pub fn entry(&self, slot: usize) -> &DirectoryEntry {
        &self.entries[slot]
    }

    pub fn entry_mut(&mut self, slot: usize) -> &mut DirectoryEntry {
        &mut self.entries[slot]
    }

    /// Slot of the in-use entry called `name`.
    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.in_use && e.filename == name)
    }

    pub fn find_free_entry(&self) -> Option<usize> {
        self.entries.iter().position(DirectoryEntry::is_free)
    }

    /// Slot of the most recently soft-deleted entry called `name`.
    pub fn latest_deleted(&self, name: &str) -> Option<usize> {
        self.deleted(name)
            .max_by_key(|slot| self.entries[*slot].deleted_seq)
    }

    /// Slots of every soft-deleted entry called `name`.
    pub fn deleted<'a>(&'a self, name: &'a str) -> impl Iterator<Item = usize> + 'a {
        self.entries
            .iter()
            .enumerate()
            .filter(move |(_, e)| e.is_deleted() && e.filename == name)
            .map(|(slot, _)| slot)
    }

    pub fn encode_into(&self, out: &mut [u8]) {
        out.fill(0);
        for (slot, entry) in self.entries.iter().enumerate() {
            let off = slot * DIRENT_SIZE;
            entry.encode_into(&mut out[off..off + DIRENT_SIZE]);
        }
    }

    pub fn decode(raw: &[u8], num_files: u32) -> Self {
        let entries = (0..num_files as usize)
            .map(|slot| DirectoryEntry::decode(&raw[slot * DIRENT_SIZE..(slot + 1) * DIRENT_SIZE]))
            .collect();
        Self { entries }
    }
}
