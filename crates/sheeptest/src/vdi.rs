//! VDI subcommands: create, delete, list, read, write, snapshot, clone.

use std::io::{Read, Write};
use std::path::PathBuf;

use clap::{Args, Subcommand};
use sheepdog_harness::{Harness, ReadRange, VdiInfo};
use tabled::{Table, Tabled};

use crate::common::{check, exit_error, format_size, parse_size};

#[derive(Args)]
pub struct VdiArgs {
    #[command(subcommand)]
    pub command: VdiCommands,
}

#[derive(Subcommand)]
pub enum VdiCommands {
    /// Create a new VDI
    Create {
        /// VDI name
        name: String,
        /// Size (e.g. 10G, 4M); one data object when omitted
        size: Option<String>,
        /// Preallocate all data objects
        #[arg(short = 'P', long)]
        prealloc: bool,
    },
    /// Delete a VDI or one of its snapshots
    Delete {
        /// VDI name
        name: String,
        /// Snapshot tag to delete instead of the VDI
        #[arg(short = 's', long)]
        snapshot: Option<String>,
    },
    /// List VDIs
    List {
        /// Only rows with this name
        name: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Read VDI data to stdout
    Read {
        /// VDI name
        name: String,
        /// Read from a snapshot instead of the live VDI
        #[arg(short = 's', long)]
        snapshot: Option<String>,
        /// Byte offset
        #[arg(long)]
        offset: Option<String>,
        /// Number of bytes
        #[arg(long)]
        length: Option<String>,
    },
    /// Write data to the start of a VDI
    Write {
        /// VDI name
        name: String,
        /// Input file (stdin when omitted)
        #[arg(short = 'f', long)]
        file: Option<PathBuf>,
    },
    /// Take a snapshot of a VDI
    Snapshot {
        /// VDI name
        name: String,
        /// Snapshot tag
        #[arg(short = 's', long)]
        tag: String,
    },
    /// Clone a VDI snapshot into a new VDI
    Clone {
        /// Source VDI name
        src: String,
        /// Source snapshot tag
        #[arg(short = 's', long)]
        tag: String,
        /// Destination VDI name
        dst: String,
    },
}

// ---------------------------------------------------------------------------
// Table display types
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct VdiRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Copies")]
    copies: u32,
    #[tabled(rename = "Tag")]
    tag: String,
    #[tabled(rename = "Snapshot")]
    snapshot: String,
    #[tabled(rename = "Block")]
    block: String,
}

impl From<&VdiInfo> for VdiRow {
    fn from(v: &VdiInfo) -> Self {
        Self {
            name: v.name.clone(),
            id: format!("{:#x}", v.vdi_id),
            size: format_size(v.size_bytes),
            copies: v.copies,
            tag: v.tag.clone(),
            snapshot: if v.snapshot { "yes" } else { "no" }.to_string(),
            block: format_size(v.block_size()),
        }
    }
}

fn size_arg(what: &str, s: &str) -> u64 {
    match parse_size(s) {
        Ok(n) => n,
        Err(e) => exit_error(&format!("Invalid {}: {}", what, e)),
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

pub fn run(harness: &Harness, port: Option<u16>, args: VdiArgs) {
    let vdi = harness.vdi();
    match args.command {
        VdiCommands::Create {
            name,
            size,
            prealloc,
        } => {
            match size {
                Some(s) => {
                    let size_bytes = size_arg("size", &s);
                    check("create vdi", vdi.create(&name, size_bytes, prealloc, port));
                }
                None if prealloc => exit_error("--prealloc needs an explicit size"),
                None => check("create vdi", vdi.create_default(&name, port)),
            }
            println!("VDI '{}' created", name);
        }
        VdiCommands::Delete { name, snapshot } => {
            check("delete vdi", vdi.delete(&name, snapshot.as_deref(), port));
            println!("VDI '{}' deleted", name);
        }
        VdiCommands::List { name, json } => {
            let mut vdis = check("list vdis", vdi.list(port));
            if let Some(n) = &name {
                vdis.retain(|v| &v.name == n);
            }
            if json {
                match serde_json::to_string_pretty(&vdis) {
                    Ok(s) => println!("{}", s),
                    Err(e) => exit_error(&format!("Failed to encode VDI list: {}", e)),
                }
            } else if vdis.is_empty() {
                match name {
                    Some(n) => println!("VDI '{}' not found.", n),
                    None => println!("No VDIs found."),
                }
            } else {
                let rows: Vec<VdiRow> = vdis.iter().map(VdiRow::from).collect();
                println!("{}", Table::new(&rows));
            }
        }
        VdiCommands::Read {
            name,
            snapshot,
            offset,
            length,
        } => {
            let range = ReadRange {
                offset: offset.map(|s| size_arg("offset", &s)),
                length: length.map(|s| size_arg("length", &s)),
            };
            let data = check("read vdi", vdi.read(&name, snapshot.as_deref(), range, port));
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = stdout.write_all(&data).and_then(|_| stdout.flush()) {
                exit_error(&format!("Failed to write output: {}", e));
            }
        }
        VdiCommands::Write { name, file } => {
            let content = match file {
                Some(path) => std::fs::read(&path).unwrap_or_else(|e| {
                    exit_error(&format!("Failed to read {}: {}", path.display(), e))
                }),
                None => {
                    let mut buf = Vec::new();
                    if let Err(e) = std::io::stdin().read_to_end(&mut buf) {
                        exit_error(&format!("Failed to read stdin: {}", e));
                    }
                    buf
                }
            };
            check("write vdi", vdi.write(&name, &content, port));
            println!("Wrote {} to VDI '{}'", format_size(content.len() as u64), name);
        }
        VdiCommands::Snapshot { name, tag } => {
            check("snapshot vdi", vdi.snapshot(&name, &tag, port));
            println!("Snapshot '{}' of VDI '{}' created", tag, name);
        }
        VdiCommands::Clone { src, tag, dst } => {
            check("clone vdi", vdi.clone(&src, &tag, &dst, port));
            println!("VDI '{}' cloned from '{}'@'{}'", dst, src, tag);
        }
    }
}
