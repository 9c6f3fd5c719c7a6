// src/fs.rs
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::{FsError, Result};
use crate::image::DiskImage;
use crate::inode::{AttribOp, Attributes};
use crate::layout::{Geometry, InodeId};
use crate::listing::{HexDump, ListFilter, Listing};

/// Parses an `encrypt`/`decrypt` key: exactly one byte.
pub fn parse_key(token: &str) -> Result<u8> {
    match token.as_bytes() {
        [key] => Ok(*key),
        _ => Err(FsError::InvalidArgument(format!(
            "cipher key {token:?} must be a single 1-byte value"
        ))),
    }
}

/// Both paths name the same host file, however they are spelled.
fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

// -------------------- Open image state --------------------

struct MfsInner {
    path: PathBuf,
    image: DiskImage,
}

/// Owner of the (at most one) open image. Every operation goes through this
/// handle; opening or creating another image closes the current one.
#[derive(Default)]
pub struct MfsFilesystem {
    inner: Option<MfsInner>,
}

impl MfsFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// Backing file of the open image.
    pub fn path(&self) -> Option<&Path> {
        self.inner.as_ref().map(|i| i.path.as_path())
    }

    pub fn geometry(&self) -> Result<&Geometry> {
        Ok(self.image()?.geometry())
    }

    pub fn image(&self) -> Result<&DiskImage> {
        self.inner.as_ref().map(|i| &i.image).ok_or(FsError::NotOpen)
    }

    fn image_mut(&mut self) -> Result<&mut DiskImage> {
        self.inner
            .as_mut()
            .map(|i| &mut i.image)
            .ok_or(FsError::NotOpen)
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Creates an empty image with the default geometry and opens it.
    pub fn create(&mut self, path: &Path) -> Result<()> {
        self.create_with(path, Geometry::default())
    }

    pub fn create_with(&mut self, path: &Path, geometry: Geometry) -> Result<()> {
        if self.path().is_some_and(|open| same_file(open, path)) {
            return Err(FsError::AlreadyOpen(path.to_path_buf()));
        }

        let mut image = DiskImage::new(geometry)?;
        image.save_to(path)?;

        if let Some(old) = self.inner.take() {
            debug!("closing {:?} to make room for {:?}", old.path, path);
        }
        info!(
            "created {:?}: {} blocks of {} bytes, {} bytes free",
            path,
            geometry.num_blocks,
            geometry.block_size,
            image.df()
        );
        self.inner = Some(MfsInner {
            path: path.to_path_buf(),
            image,
        });
        Ok(())
    }

    /// Loads the image at `path`. On failure the current image stays open.
    pub fn open(&mut self, path: &Path) -> Result<()> {
        let image = DiskImage::load(path)?;
        if let Some(old) = self.inner.take() {
            debug!("closing {:?} to open {:?}", old.path, path);
        }
        info!("opened {:?}", path);
        self.inner = Some(MfsInner {
            path: path.to_path_buf(),
            image,
        });
        Ok(())
    }

    pub fn save(&mut self) -> Result<()> {
        let inner = self.inner.as_mut().ok_or(FsError::NotOpen)?;
        inner.image.save_to(&inner.path)?;
        info!("saved {:?}", inner.path);
        Ok(())
    }

    /// Drops the in-memory image. Changes since the last `save` are lost.
    pub fn close(&mut self) -> Result<()> {
        let inner = self.inner.take().ok_or(FsError::NotOpen)?;
        info!("closed {:?}", inner.path);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // File operations
    // -------------------------------------------------------------------------

    /// Copies the host file at `host_path` in, named after its last component.
    pub fn insert(&mut self, host_path: &Path) -> Result<InodeId> {
        let name = host_path
            .file_name()
            .and_then(OsStr::to_str)
            .ok_or_else(|| {
                FsError::InvalidArgument(format!("{host_path:?} has no usable file name"))
            })?
            .to_string();
        self.insert_as(host_path, &name)
    }

    pub fn insert_as(&mut self, host_path: &Path, name: &str) -> Result<InodeId> {
        let image = self.image_mut()?;

        let meta = fs::metadata(host_path).map_err(|e| FsError::from_io(host_path, e))?;
        if !meta.is_file() {
            return Err(FsError::InvalidArgument(format!(
                "{host_path:?} is not a regular file"
            )));
        }

        // 1. Size limits before reading anything
        let size = meta.len();
        let capacity = image.geometry().file_capacity();
        if size > capacity {
            return Err(FsError::TooLarge(format!(
                "{host_path:?} is {size} bytes, the limit is {capacity} bytes"
            )));
        }
        if size > image.df() {
            return Err(FsError::TooLarge(format!(
                "{host_path:?} is {size} bytes, only {} bytes free",
                image.df()
            )));
        }

        // 2. Read and store
        let data = fs::read(host_path).map_err(|e| FsError::from_io(host_path, e))?;
        debug!("read {} bytes from {:?}", data.len(), host_path);
        image.insert(name, &data)
    }

    /// Writes the file to `dest`, or to a host file called `name` when `dest` is `None`.
    pub fn retrieve(&self, name: &str, dest: Option<&Path>) -> Result<u64> {
        let dest = dest.unwrap_or_else(|| Path::new(name));
        let chunks = self.image()?.contents(name)?;

        let file = File::create(dest).map_err(|e| FsError::io(dest, e))?;
        let mut out = BufWriter::new(file);
        let mut written = 0u64;
        for chunk in chunks {
            out.write_all(chunk).map_err(|e| FsError::io(dest, e))?;
            written += chunk.len() as u64;
        }
        out.flush().map_err(|e| FsError::io(dest, e))?;

        debug!("retrieved {name} to {:?}: {written} bytes", dest);
        Ok(written)
    }

    pub fn delete(&mut self, name: &str) -> Result<()> {
        self.image_mut()?.delete(name)
    }

    pub fn undelete(&mut self, name: &str) -> Result<()> {
        self.image_mut()?.undelete(name)
    }

    /// Permanently frees soft-deleted copies of `name`.
    pub fn erase(&mut self, name: &str) -> Result<usize> {
        self.image_mut()?.erase(name)
    }

    pub fn attrib(&mut self, op: AttribOp, name: &str) -> Result<Attributes> {
        self.image_mut()?.attrib(op, name)
    }

    /// Also serves as decrypt.
    pub fn encrypt(&mut self, name: &str, key: u8) -> Result<()> {
        self.image_mut()?.encrypt(name, key)
    }

    pub fn read(&self, name: &str, start: u64, len: u64) -> Result<HexDump> {
        self.image()?.read(name, start, len).map(HexDump)
    }

    pub fn list(&self, filter: ListFilter) -> Result<Listing> {
        Ok(self.image()?.list(filter))
    }

    pub fn df(&self) -> Result<u64> {
        Ok(self.image()?.df())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{pattern, small_geometry, TempPath};

    struct Fixture {
        fs: MfsFilesystem,
        image: TempPath,
    }

    fn fixture() -> Fixture {
        let image = TempPath::new("fs.img");
        let mut fs = MfsFilesystem::new();
        fs.create_with(image.path(), small_geometry()).unwrap();
        Fixture { fs, image }
    }

    /// Snapshot of the metadata state used to prove an operation had no effect.
    fn state(fs: &MfsFilesystem) -> DiskImage {
        fs.image().unwrap().clone()
    }

    #[test]
    fn operations_need_an_open_image() {
        let mut fs = MfsFilesystem::new();
        assert!(matches!(fs.save(), Err(FsError::NotOpen)));
        assert!(matches!(fs.close(), Err(FsError::NotOpen)));
        assert!(matches!(fs.df(), Err(FsError::NotOpen)));
        assert!(matches!(fs.list(ListFilter::default()), Err(FsError::NotOpen)));
        assert!(matches!(fs.delete("x"), Err(FsError::NotOpen)));
        assert!(matches!(
            fs.insert(Path::new("/definitely/missing")),
            Err(FsError::NotOpen)
        ));
    }

    #[test]
    fn scenario_2500_bytes() {
        let mut f = fixture();
        let src = TempPath::with_content("scenario.bin", &pattern(2500));
        let before = f.fs.df().unwrap();

        let ino = f.fs.insert(src.path()).unwrap();
        let inode = &f.fs.image().unwrap().inodes()[ino as usize];
        assert_eq!(inode.size, 2500);
        assert_eq!(inode.blocks().count(), 3);
        assert_eq!(before - f.fs.df().unwrap(), 3072);

        let out = TempPath::new("scenario.out");
        let written = f.fs.retrieve(&src.file_name(), Some(out.path())).unwrap();
        assert_eq!(written, 2500);
        assert_eq!(fs::read(out.path()).unwrap(), pattern(2500));
    }

    #[test]
    fn round_trip_various_sizes() {
        let mut f = fixture();
        for (i, size) in [1usize, 1023, 1024, 1025, 6 * 1024].into_iter().enumerate() {
            let name = format!("f{i}");
            let src = TempPath::with_content("rt.bin", &pattern(size));
            let before = f.fs.df().unwrap();
            f.fs.insert_as(src.path(), &name).unwrap();
            assert_eq!(before - f.fs.df().unwrap(), (size as u64).div_ceil(1024) * 1024);

            let out = TempPath::new("rt.out");
            f.fs.retrieve(&name, Some(out.path())).unwrap();
            assert_eq!(fs::read(out.path()).unwrap(), pattern(size), "size {size}");
        }
    }

    #[test]
    fn larger_than_max_file_size_changes_nothing() {
        let mut f = fixture();
        let too_big = TempPath::with_content("big.bin", &pattern(6 * 1024 + 1));
        let before = state(&f.fs);
        assert!(matches!(f.fs.insert(too_big.path()), Err(FsError::TooLarge(_))));
        assert_eq!(state(&f.fs), before);
    }

    #[test]
    fn larger_than_free_space_changes_nothing() {
        let image = TempPath::new("tight.img");
        let mut fs = MfsFilesystem::new();
        // 7 data blocks.
        let geometry = Geometry {
            num_blocks: 12,
            ..small_geometry()
        };
        fs.create_with(image.path(), geometry).unwrap();

        let first = TempPath::with_content("first.bin", &pattern(6 * 1024));
        fs.insert_as(first.path(), "first").unwrap();
        assert_eq!(fs.df().unwrap(), 1024);

        let second = TempPath::with_content("second.bin", &pattern(1025));
        let before = state(&fs);
        assert!(matches!(
            fs.insert_as(second.path(), "second"),
            Err(FsError::TooLarge(_))
        ));
        assert_eq!(state(&fs), before);
    }

    #[test]
    fn full_directory_changes_nothing() {
        let mut f = fixture();
        let small = TempPath::with_content("small.bin", b"x");
        for i in 0..8 {
            f.fs.insert_as(small.path(), &format!("f{i}")).unwrap();
        }
        let before = state(&f.fs);
        assert!(matches!(
            f.fs.insert_as(small.path(), "ninth"),
            Err(FsError::ResourceExhausted(_))
        ));
        assert_eq!(state(&f.fs), before);

        // Soft-deleted files still hold their slot until erased.
        f.fs.delete("f3").unwrap();
        assert!(f.fs.insert_as(small.path(), "ninth").is_err());
        f.fs.erase("f3").unwrap();
        f.fs.insert_as(small.path(), "ninth").unwrap();
    }

    #[test]
    fn missing_host_file() {
        let mut f = fixture();
        assert!(matches!(
            f.fs.insert(Path::new("/no/such/file.txt")),
            Err(FsError::NotFound(_))
        ));
    }

    #[test]
    fn long_names_are_rejected() {
        let mut f = fixture();
        let src = TempPath::with_content("n.bin", b"abc");
        let before = state(&f.fs);
        assert!(matches!(
            f.fs.insert_as(src.path(), &"n".repeat(65)),
            Err(FsError::InvalidArgument(_))
        ));
        assert_eq!(state(&f.fs), before);
    }

    #[test]
    fn encrypt_twice_is_identity() {
        let mut f = fixture();
        let src = TempPath::with_content("secret.txt", &pattern(3000));
        f.fs.insert_as(src.path(), "secret").unwrap();

        f.fs.encrypt("secret", b'k').unwrap();
        let out = TempPath::new("secret.out");
        f.fs.retrieve("secret", Some(out.path())).unwrap();
        assert_ne!(fs::read(out.path()).unwrap(), pattern(3000));

        f.fs.encrypt("secret", b'k').unwrap();
        f.fs.retrieve("secret", Some(out.path())).unwrap();
        assert_eq!(fs::read(out.path()).unwrap(), pattern(3000));
    }

    #[test]
    fn delete_then_undelete_restores_content() {
        let mut f = fixture();
        let src = TempPath::with_content("doc.txt", &pattern(4000));
        f.fs.insert_as(src.path(), "doc").unwrap();
        f.fs.delete("doc").unwrap();

        assert!(matches!(
            f.fs.retrieve("doc", None),
            Err(FsError::NotFound(_))
        ));
        assert!(f.fs.list(ListFilter::default()).unwrap().is_empty());

        f.fs.undelete("doc").unwrap();
        let out = TempPath::new("doc.out");
        f.fs.retrieve("doc", Some(out.path())).unwrap();
        assert_eq!(fs::read(out.path()).unwrap(), pattern(4000));
    }

    #[test]
    fn read_only_blocks_delete() {
        let mut f = fixture();
        let src = TempPath::with_content("ro.txt", b"locked");
        f.fs.insert_as(src.path(), "ro").unwrap();

        f.fs.attrib(AttribOp::SetReadOnly, "ro").unwrap();
        let before = state(&f.fs);
        assert!(matches!(
            f.fs.delete("ro"),
            Err(FsError::PermissionDenied(_))
        ));
        assert_eq!(state(&f.fs), before);
        assert!(f.fs.image().unwrap().stat("ro").unwrap().in_use);

        f.fs.attrib(AttribOp::ClearReadOnly, "ro").unwrap();
        f.fs.delete("ro").unwrap();
        assert!(matches!(
            f.fs.attrib(AttribOp::SetHidden, "ro"),
            Err(FsError::NotFound(_))
        ));
    }

    #[test]
    fn list_filters() {
        let mut f = fixture();
        let src = TempPath::with_content("l.txt", b"x");
        for name in ["one", "two", "three"] {
            f.fs.insert_as(src.path(), name).unwrap();
        }
        f.fs.attrib(AttribOp::SetHidden, "two").unwrap();
        f.fs.attrib(AttribOp::SetReadOnly, "three").unwrap();

        let plain = f.fs.list(ListFilter::default()).unwrap();
        assert_eq!(plain.to_string(), "one\nthree");

        let hidden = f
            .fs
            .list(ListFilter {
                show_hidden: true,
                show_attributes: false,
            })
            .unwrap();
        assert_eq!(hidden.names(), vec!["one", "two", "three"]);

        let attrs = f
            .fs
            .list(ListFilter {
                show_hidden: false,
                show_attributes: true,
            })
            .unwrap();
        assert_eq!(attrs.to_string(), "one 00000000\nthree 00000010");
    }

    #[test]
    fn read_returns_hex() {
        let mut f = fixture();
        let src = TempPath::with_content("h.txt", b"ABC");
        f.fs.insert_as(src.path(), "h").unwrap();
        assert_eq!(f.fs.read("h", 1, 10).unwrap().to_string(), "42 43");
    }

    #[test]
    fn save_close_open_keeps_state() {
        let mut f = fixture();
        let src = TempPath::with_content("p.txt", &pattern(1500));
        f.fs.insert_as(src.path(), "p").unwrap();
        f.fs.save().unwrap();

        let unsaved = TempPath::with_content("u.txt", b"lost");
        f.fs.insert_as(unsaved.path(), "unsaved").unwrap();
        f.fs.close().unwrap();
        assert!(!f.fs.is_open());

        f.fs.open(f.image.path()).unwrap();
        let names = f
            .fs
            .list(ListFilter {
                show_hidden: true,
                show_attributes: false,
            })
            .unwrap();
        assert_eq!(names.names(), vec!["p"]);
        assert_eq!(f.fs.image().unwrap().read_all("p").unwrap(), pattern(1500));
    }

    #[test]
    fn open_rejects_bad_images_and_keeps_current() {
        let mut f = fixture();
        let junk = TempPath::with_content("junk.img", &[0u8; 1000]);
        assert!(matches!(
            f.fs.open(junk.path()),
            Err(FsError::InvalidFormat(_))
        ));
        assert!(matches!(
            f.fs.open(Path::new("/no/such/image.img")),
            Err(FsError::NotFound(_))
        ));
        assert_eq!(f.fs.path(), Some(f.image.path()));
    }

    #[test]
    fn opening_another_image_closes_the_first() {
        let mut f = fixture();
        let src = TempPath::with_content("a.txt", b"a");
        f.fs.insert_as(src.path(), "a").unwrap();

        let other = TempPath::new("other.img");
        f.fs.create_with(other.path(), small_geometry()).unwrap();
        assert_eq!(f.fs.path(), Some(other.path()));
        assert!(f.fs.list(ListFilter::default()).unwrap().is_empty());

        assert!(matches!(
            f.fs.create_with(other.path(), small_geometry()),
            Err(FsError::AlreadyOpen(_))
        ));
    }

    #[test]
    fn create_over_the_open_image_under_another_spelling() {
        let mut f = fixture();
        let src = TempPath::with_content("kept.txt", b"kept");
        f.fs.insert_as(src.path(), "kept").unwrap();
        let before = state(&f.fs);

        let dir = f.image.path().parent().unwrap();
        let respelled = dir
            .join("..")
            .join(dir.file_name().unwrap())
            .join(f.image.file_name());
        assert_ne!(respelled.as_path(), f.image.path());

        assert!(matches!(
            f.fs.create_with(&respelled, small_geometry()),
            Err(FsError::AlreadyOpen(_))
        ));
        assert_eq!(f.fs.path(), Some(f.image.path()));
        assert_eq!(state(&f.fs), before);
    }

    #[test]
    fn create_in_missing_directory_is_io_error() {
        let mut fs = MfsFilesystem::new();
        let err = fs
            .create_with(Path::new("/no/such/dir/x.img"), small_geometry())
            .unwrap_err();
        assert!(matches!(err, FsError::Io { .. }));
        assert!(!fs.is_open());
    }

    #[test]
    fn key_must_be_one_byte() {
        assert_eq!(parse_key("k").unwrap(), b'k');
        assert!(matches!(parse_key("ab"), Err(FsError::InvalidArgument(_))));
        assert!(parse_key("").is_err());
        assert!(parse_key("é").is_err());
    }
}
