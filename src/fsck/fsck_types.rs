/* Result of a consistency check. `blocks_ok` covers the block bitmap and block
references, `inodes_ok` covers inodes, the inode bitmap and the directory. */

use std::fmt;

use colored::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsckReport {
    pub blocks_ok: bool,
    pub inodes_ok: bool,
    pub errors: Vec<String>,
}

impl FsckReport {
    pub fn new() -> Self {
        Self {
            blocks_ok: true,
            inodes_ok: true,
            errors: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub(crate) fn block_error(&mut self, msg: String) {
        self.errors.push(msg);
        self.blocks_ok = false;
    }

    pub(crate) fn inode_error(&mut self, msg: String) {
        self.errors.push(msg);
        self.inodes_ok = false;
    }
}

impl Default for FsckReport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FsckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ----- blocks -----
        writeln!(f, "{}", "Blocks".bold().underline())?;
        if self.blocks_ok {
            writeln!(f, "  {} blocks OK", "✓".green())?;
        } else {
            writeln!(f, "  {} block errors", "✗".red())?;
        }

        // ----- inodes -----
        writeln!(f, "\n{}", "Inodes".bold().underline())?;
        if self.inodes_ok {
            writeln!(f, "  {} inodes OK", "✓".green())?;
        } else {
            writeln!(f, "  {} inode errors", "✗".red())?;
        }

        // ----- details -----
        writeln!(f, "\n{}", "Problems".bold().underline())?;
        if self.errors.is_empty() {
            writeln!(f, "  {} none found", "✓".green())?;
        } else {
            for err in &self.errors {
                writeln!(f, "  {} {}", "•".red(), err.red())?;
            }
        }

        writeln!(f, "\n{}", "Summary".bold().underline())?;
        if self.is_clean() {
            write!(f, "{} filesystem is clean.", "✓ OK".green().bold())
        } else {
            write!(
                f,
                "{} {} problems.",
                "✗ fsck finished with".red().bold(),
                self.errors.len().to_string().yellow()
            )
        }
    }
}
