//! Object subcommands: inspect the object files sheep stores on its disks.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use sheepdog_harness::{DiskImage, Harness, ObjectId};

use crate::common::{check, exit_error};

#[derive(Args)]
pub struct ObjArgs {
    #[command(subcommand)]
    pub command: ObjCommands,
}

#[derive(Subcommand)]
pub enum ObjCommands {
    /// List the objects stored on one disk
    Ls {
        /// Disk mount point
        dir: PathBuf,
    },
    /// Find every copy of an object across disks, with its checksum
    Find {
        /// Object ID in hex (e.g. 007c2b2500000000)
        #[arg(long, conflicts_with_all = ["vid", "index"])]
        oid: Option<String>,
        /// VDI id in hex; with --index names a data object
        #[arg(long)]
        vid: Option<String>,
        /// Data object index (inode object when omitted)
        #[arg(long, requires = "vid")]
        index: Option<u32>,
        /// Disk mount points to search
        #[arg(required = true)]
        disks: Vec<PathBuf>,
    },
    /// Checksum one object file
    Hash {
        path: PathBuf,
    },
}

fn parse_hex<T, F>(what: &str, s: &str, parse: F) -> T
where
    F: FnOnce(&str, u32) -> Result<T, std::num::ParseIntError>,
{
    let digits = s.trim_start_matches("0x");
    match parse(digits, 16) {
        Ok(v) => v,
        Err(e) => exit_error(&format!("Invalid {} '{}': {}", what, s, e)),
    }
}

fn target_oid(oid: Option<String>, vid: Option<String>, index: Option<u32>) -> ObjectId {
    match (oid, vid) {
        (Some(o), _) => ObjectId::new(parse_hex("object id", &o, u64::from_str_radix)),
        (None, Some(v)) => {
            let vid = parse_hex("vdi id", &v, u32::from_str_radix);
            match index {
                Some(idx) => ObjectId::data(vid, idx),
                None => ObjectId::from_vid(vid),
            }
        }
        (None, None) => exit_error("either --oid or --vid is required"),
    }
}

pub fn run(harness: &Harness, args: ObjArgs) {
    let objects = harness.objects();
    match args.command {
        ObjCommands::Ls { dir } => {
            let objs = check("list objects", objects.list_objects(&dir));
            if objs.is_empty() {
                println!("No objects found.");
            }
            for (oid, ec_index) in objs {
                let kind = if oid.is_vdi_obj() { "inode" } else { "data" };
                println!(
                    "{}  vid={:#x} idx={} ec={} {}",
                    oid,
                    oid.to_vid(),
                    oid.data_index(),
                    ec_index,
                    kind
                );
            }
        }
        ObjCommands::Find {
            oid,
            vid,
            index,
            disks,
        } => {
            let oid = target_oid(oid, vid, index);
            let images: Vec<DiskImage> = disks
                .into_iter()
                .map(|mnt| DiskImage {
                    path: PathBuf::new(),
                    size_bytes: 0,
                    mount_point: Some(mnt),
                })
                .collect();
            let paths = check("find object", objects.find_object(&images, oid));
            if paths.is_empty() {
                println!("Object {} not found.", oid);
            }
            for path in paths {
                let file = check("checksum object", objects.object_file(&path));
                println!("{}  {}", file.content_hash, file.path.display());
            }
        }
        ObjCommands::Hash { path } => {
            let file = check("checksum object", objects.object_file(&path));
            println!("{}  {}", file.content_hash, file.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_oid() {
        assert_eq!(
            target_oid(Some("0x007c2b2500000001".into()), None, None),
            ObjectId::data(0x7c2b25, 1)
        );
        assert_eq!(
            target_oid(None, Some("7c2b25".into()), Some(2)),
            ObjectId::data(0x7c2b25, 2)
        );
        assert_eq!(
            target_oid(None, Some("7c2b25".into()), None),
            ObjectId::from_vid(0x7c2b25)
        );
    }
}
