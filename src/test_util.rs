// src/test_util.rs
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::layout::Geometry;

static COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Unique path in the temp dir, removed when dropped.
pub(crate) struct TempPath(PathBuf);

impl TempPath {
    pub fn new(name: &str) -> Self {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let file = format!("mfs-{}-{n}-{name}", process::id());
        Self(env::temp_dir().join(file))
    }

    /// Creates the file with `content`.
    pub fn with_content(name: &str, content: &[u8]) -> Self {
        let path = Self::new(name);
        fs::write(&path.0, content).unwrap();
        path
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn file_name(&self) -> String {
        self.0.file_name().unwrap().to_string_lossy().into_owned()
    }
}

impl Drop for TempPath {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

/// 64 blocks of 1 KiB, 8 files, 8 blocks per file, 6 KiB max file size.
/// Data region starts at block 5.
pub(crate) fn small_geometry() -> Geometry {
    Geometry {
        block_size: 1024,
        num_blocks: 64,
        num_files: 8,
        blocks_per_file: 8,
        max_file_size: 6 * 1024,
    }
}

/// Deterministic non-trivial content.
pub(crate) fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}
