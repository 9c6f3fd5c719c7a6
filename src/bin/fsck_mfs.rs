use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use colored::*;
use mfs::fsck::run_fsck;
use mfs::DiskImage;

fn main() -> Result<ExitCode> {
    mfs::logger::init();

    let image_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: fsck.mfs <image>")?;

    let image = DiskImage::load(&image_path)
        .with_context(|| format!("cannot load {}", image_path.display()))?;
    let rep = run_fsck(&image);

    println!("\n{}", " MFS FILESYSTEM CHECK ".on_blue().bold());
    println!("{}\n", image_path.display().to_string().blue());
    println!("{rep}\n");

    Ok(if rep.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
