// src/command.rs
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{FsError, Result};
use crate::fs::parse_key;
use crate::inode::AttribOp;
use crate::listing::ListFilter;

/// One line of the `mfs` shell, already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    CreateFs(PathBuf),
    SaveFs,
    Open(PathBuf),
    Close,
    List(ListFilter),
    Df,
    Insert(PathBuf),
    /// `encrypt` and `decrypt` are the same XOR pass.
    Encrypt { name: String, key: u8 },
    Retrieve { name: String, dest: Option<PathBuf> },
    Delete(String),
    Undelete(String),
    Erase(String),
    Attrib { op: AttribOp, name: String },
    Read { name: String, start: u64, len: u64 },
    Fsck,
    Quit,
}

fn usage(text: &str) -> FsError {
    FsError::InvalidArgument(format!("usage: {text}"))
}

fn number(token: &str, what: &str) -> Result<u64> {
    token
        .parse()
        .map_err(|_| FsError::InvalidArgument(format!("{what} {token:?} is not a number")))
}

impl Command {
    /// Parses a shell line. A blank line gives `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Command>> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((&verb, args)) = tokens.split_first() else {
            return Ok(None);
        };

        let cmd = match (verb, args) {
            ("createfs", [path]) => Command::CreateFs(PathBuf::from(path)),
            ("createfs", _) => return Err(usage("createfs <path>")),
            ("savefs", []) => Command::SaveFs,
            ("open", [path]) => Command::Open(PathBuf::from(path)),
            ("open", _) => return Err(usage("open <path>")),
            ("close", []) => Command::Close,
            ("list", flags) => {
                let mut filter = ListFilter::default();
                for flag in flags {
                    match *flag {
                        "-h" => filter.show_hidden = true,
                        "-a" => filter.show_attributes = true,
                        other => {
                            return Err(FsError::InvalidArgument(format!(
                                "unknown list flag {other:?}"
                            )))
                        }
                    }
                }
                Command::List(filter)
            }
            ("df", []) => Command::Df,
            ("insert", [path]) => Command::Insert(PathBuf::from(path)),
            ("insert", _) => return Err(usage("insert <path>")),
            ("encrypt" | "decrypt", [name, key]) => Command::Encrypt {
                name: name.to_string(),
                key: parse_key(key)?,
            },
            ("encrypt" | "decrypt", _) => return Err(usage("encrypt|decrypt <name> <key>")),
            ("retrieve", [name]) => Command::Retrieve {
                name: name.to_string(),
                dest: None,
            },
            ("retrieve", [name, dest]) => Command::Retrieve {
                name: name.to_string(),
                dest: Some(PathBuf::from(dest)),
            },
            ("retrieve", _) => return Err(usage("retrieve <name> [newname]")),
            ("delete", [name]) => Command::Delete(name.to_string()),
            ("undelete", [name]) => Command::Undelete(name.to_string()),
            ("erase", [name]) => Command::Erase(name.to_string()),
            ("delete" | "undelete" | "erase", _) => return Err(usage(&format!("{verb} <name>"))),
            ("attrib", [op, name]) => Command::Attrib {
                op: AttribOp::from_str(op)?,
                name: name.to_string(),
            },
            ("attrib", _) => return Err(usage("attrib <+h|-h|+r|-r> <name>")),
            ("read", [name, start, len]) => Command::Read {
                name: name.to_string(),
                start: number(start, "start")?,
                len: number(len, "length")?,
            },
            ("read", _) => return Err(usage("read <name> <start> <len>")),
            ("fsck", []) => Command::Fsck,
            ("quit" | "exit", []) => Command::Quit,
            ("savefs" | "close" | "df" | "fsck" | "quit" | "exit", _) => {
                return Err(FsError::InvalidArgument(format!("{verb} takes no arguments")))
            }
            (other, _) => {
                return Err(FsError::InvalidArgument(format!("unknown command {other:?}")))
            }
        };
        Ok(Some(cmd))
    }
}
