//! Disk subcommands: create, mount and destroy loopback backing disks.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use sheepdog_harness::{DiskImage, Harness};

use crate::common::{check, exit_error, format_size, parse_size};

#[derive(Args)]
pub struct DiskArgs {
    #[command(subcommand)]
    pub command: DiskCommands,
}

#[derive(Subcommand)]
pub enum DiskCommands {
    /// Create, format and mount a backing disk
    Create {
        /// Size (e.g. 1G, 512M)
        #[arg(default_value = "1G")]
        size: String,
        /// Leave the image unmounted
        #[arg(long)]
        no_mount: bool,
    },
    /// Unmount and delete a backing disk
    Destroy {
        /// Backing image file
        image: PathBuf,
        /// Mount point (omit for an unmounted image)
        mount_point: Option<PathBuf>,
    },
}

pub fn run(harness: &Harness, args: DiskArgs) {
    let disks = harness.disks();
    match args.command {
        DiskCommands::Create { size, no_mount } => {
            let size_bytes = match parse_size(&size) {
                Ok(s) if s > 0 => s,
                Ok(_) => exit_error("disk size must be greater than 0"),
                Err(e) => exit_error(&format!("Invalid size: {}", e)),
            };
            let image = if no_mount {
                check("create disk", disks.create_backing_disk(size_bytes))
            } else {
                check("provision disk", disks.provision(size_bytes))
            };
            // image path and mount point on one line, for shell scripts
            match &image.mount_point {
                Some(mnt) => println!("{} {}", image.path.display(), mnt.display()),
                None => println!("{}", image.path.display()),
            }
            tracing::info!("disk of {} ready", format_size(size_bytes));
        }
        DiskCommands::Destroy { image, mount_point } => {
            let size_bytes = std::fs::metadata(&image).map(|m| m.len()).unwrap_or(0);
            let disk = DiskImage {
                path: image,
                size_bytes,
                mount_point,
            };
            let path = disk.path.display().to_string();
            check("destroy disk", disks.destroy(disk));
            println!("Disk {} destroyed", path);
        }
    }
}
