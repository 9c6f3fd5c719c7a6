// src/error.rs
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FsError>;

/// Resources the allocator can run out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    DirectoryEntry,
    Inode,
    Block,
    /// A free position in an inode's block list.
    InodeSlot,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::DirectoryEntry => "directory entry",
            Resource::Inode => "inode",
            Resource::Block => "data block",
            Resource::InodeSlot => "inode block slot",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum FsError {
    #[error("disk image is not open")]
    NotOpen,
    #[error("disk image {0:?} is already open")]
    AlreadyOpen(PathBuf),
    #[error("{0} not found")]
    NotFound(String),
    #[error("not a valid image file: {0}")]
    InvalidFormat(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("file {0} already exists")]
    AlreadyExists(String),
    #[error("file is too large: {0}")]
    TooLarge(String),
    #[error("no free {0} available")]
    ResourceExhausted(Resource),
    #[error("{0} is marked read-only")]
    PermissionDenied(String),
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FsError {
    /// Wraps a host I/O error, turning a missing file into `NotFound`.
    pub fn from_io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            FsError::NotFound(path.display().to_string())
        } else {
            FsError::io(path, source)
        }
    }

    /// Wraps a host I/O error as-is.
    pub fn io(path: &Path, source: io::Error) -> Self {
        FsError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Short upper-case tag used by the shell when printing errors.
    pub fn kind_tag(&self) -> &'static str {
        match self {
            FsError::NotOpen => "NOT OPEN",
            FsError::AlreadyOpen(_) => "ALREADY OPEN",
            FsError::NotFound(_) => "NOT FOUND",
            FsError::InvalidFormat(_) => "INVALID FORMAT",
            FsError::InvalidArgument(_) => "INVALID ARGUMENT",
            FsError::AlreadyExists(_) => "EXISTS",
            FsError::TooLarge(_) => "TOO LARGE",
            FsError::ResourceExhausted(_) => "NO SPACE",
            FsError::PermissionDenied(_) => "PERMISSION DENIED",
            FsError::Io { .. } => "IO",
        }
    }
}
