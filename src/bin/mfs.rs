use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use colored::*;
use mfs::command::Command;
use mfs::fsck::run_fsck;
use mfs::MfsFilesystem;

const PROMPT: &str = "mfs> ";

enum Flow {
    Continue,
    Quit,
}

fn main() -> Result<()> {
    mfs::logger::init();

    let mut fs = MfsFilesystem::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut lines = stdin.lock().lines();

    loop {
        print!("{PROMPT}");
        stdout.flush().context("cannot write the prompt")?;

        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line.context("cannot read from stdin")?;

        let outcome = Command::parse(&line).and_then(|cmd| match cmd {
            Some(cmd) => execute(&mut fs, cmd),
            None => Ok(Flow::Continue),
        });

        match outcome {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(e) => eprintln!("{} {}", format!("[{}]", e.kind_tag()).red().bold(), e),
        }
    }

    Ok(())
}

fn ok(msg: impl AsRef<str>) {
    println!("{} {}", "✓".green(), msg.as_ref());
}

fn execute(fs: &mut MfsFilesystem, cmd: Command) -> mfs::Result<Flow> {
    match cmd {
        Command::CreateFs(path) => {
            fs.create(&path)?;
            ok(format!("created {}", path.display()));
        }
        Command::SaveFs => {
            fs.save()?;
            ok("saved");
        }
        Command::Open(path) => {
            fs.open(&path)?;
            ok(format!("opened {}", path.display()));
        }
        Command::Close => {
            fs.close()?;
            ok("closed");
        }
        Command::List(filter) => {
            let listing = fs.list(filter)?;
            println!("{listing}");
        }
        Command::Df => println!("{} bytes free", fs.df()?),
        Command::Insert(path) => {
            fs.insert(&path)?;
            ok(format!("inserted {}", path.display()));
        }
        Command::Encrypt { name, key } => {
            fs.encrypt(&name, key)?;
            ok(format!("{name} transformed"));
        }
        Command::Retrieve { name, dest } => {
            let written = fs.retrieve(&name, dest.as_deref())?;
            ok(format!("retrieved {name} ({written} bytes)"));
        }
        Command::Delete(name) => {
            fs.delete(&name)?;
            ok(format!("deleted {name}"));
        }
        Command::Undelete(name) => {
            fs.undelete(&name)?;
            ok(format!("restored {name}"));
        }
        Command::Erase(name) => {
            let erased = fs.erase(&name)?;
            ok(format!("erased {name} ({erased} deleted entries)"));
        }
        Command::Attrib { op, name } => {
            let attrs = fs.attrib(op, &name)?;
            ok(format!("{name}: {:08b}", attrs.bits()));
        }
        Command::Read { name, start, len } => println!("{}", fs.read(&name, start, len)?),
        Command::Fsck => println!("{}", run_fsck(fs.image()?)),
        Command::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}
