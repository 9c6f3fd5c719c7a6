use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use mfs::{DiskImage, Geometry};

const USAGE: &str = "usage: mkfs.mfs <image> [blocks] [block_size]";

fn main() -> Result<()> {
    mfs::logger::init();

    // 1. Image path and optional geometry from the arguments
    let mut args = env::args().skip(1);
    let image_path = args.next().map(PathBuf::from).context(USAGE)?;

    let mut geometry = Geometry::default();
    if let Some(blocks) = args.next() {
        geometry.num_blocks = blocks
            .parse()
            .with_context(|| format!("invalid block count {blocks:?}"))?;
    }
    if let Some(size) = args.next() {
        geometry.block_size = size
            .parse()
            .with_context(|| format!("invalid block size {size:?}"))?;
    }
    if args.next().is_some() {
        return Err(anyhow!(USAGE));
    }

    // 2. Lay out the metadata regions and build the empty image
    let mut image = DiskImage::new(geometry)
        .with_context(|| format!("cannot lay out an image with {geometry:?}"))?;
    let layout = *image.layout();

    // 3. Write it out
    image
        .save_to(&image_path)
        .with_context(|| format!("cannot write {}", image_path.display()))?;

    println!(
        "mkfs.mfs: created {} with {} blocks of {} bytes, {} file slots, {} data blocks",
        image_path.display(),
        geometry.num_blocks,
        geometry.block_size,
        geometry.num_files,
        geometry.num_blocks - layout.data_start
    );

    Ok(())
}
