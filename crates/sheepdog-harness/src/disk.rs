//! Loopback backing disks for sheep nodes.
//!
//! A disk is a sparse image file formatted with XFS and loop-mounted on a
//! fresh directory. Sheep is pointed at the mount point; the image file
//! itself is only touched again at teardown.
//!
//! Setup is all-or-nothing: a failed format removes the image, a failed
//! mount removes the mount directory and the image. Teardown is strict:
//! unmount, remove the mount directory, remove the image, stopping at the
//! first failure so a stuck mount is never papered over.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::command::{CommandRunner, CommandSpec};
use crate::config::HarnessConfig;
use crate::constants::LOOP_MOUNT_OPTIONS;
use crate::error::{HarnessError, HarnessResult};
use crate::rollback::Rollback;

/// A filesystem image backing one sheep disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskImage {
    /// Backing image file.
    pub path: PathBuf,
    /// Logical size of the image in bytes.
    pub size_bytes: u64,
    /// Where the image is mounted, if it is.
    pub mount_point: Option<PathBuf>,
}

impl DiskImage {
    pub fn is_mounted(&self) -> bool {
        self.mount_point.is_some()
    }
}

/// Creates, mounts and destroys backing disks.
pub struct DiskProvisioner<'a> {
    runner: &'a dyn CommandRunner,
    config: &'a HarnessConfig,
}

impl<'a> DiskProvisioner<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: &'a HarnessConfig) -> Self {
        Self { runner, config }
    }

    /// Allocate a zero-filled image of `size_bytes` and format it.
    ///
    /// The image is created under the configured work directory. If the
    /// format step fails the image is removed again.
    pub fn create_backing_disk(&self, size_bytes: u64) -> HarnessResult<DiskImage> {
        let (file, path) = tempfile::Builder::new()
            .prefix("sheepdog-disk-")
            .suffix(".img")
            .tempfile_in(&self.config.work_dir)?
            .keep()
            .map_err(|e| e.error)?;

        let mut rollback = Rollback::new();
        let undo_path = path.clone();
        rollback.push(format!("remove image {}", path.display()), move || {
            remove_file(&undo_path)
        });

        let provisioning = |source: HarnessError| HarnessError::Provisioning {
            path: path.clone(),
            source: Box::new(source),
        };

        file.set_len(size_bytes)
            .map_err(|e| provisioning(e.into()))?;
        drop(file);

        let mkfs = CommandSpec::new(&self.config.mkfs)
            .arg(format!("-ssize={}", self.config.sector_size))
            .arg("-f")
            .arg(&path);
        self.runner.run_checked(&mkfs).map_err(provisioning)?;

        rollback.commit();
        info!("disk: created {} ({} bytes)", path.display(), size_bytes);
        Ok(DiskImage {
            path,
            size_bytes,
            mount_point: None,
        })
    }

    /// Loop-mount `image` on a fresh directory.
    ///
    /// Consumes the image: on failure both the mount directory and the
    /// backing file are removed.
    pub fn mount(&self, image: DiskImage) -> HarnessResult<DiskImage> {
        if let Some(mnt) = &image.mount_point {
            return Err(HarnessError::InvalidArgument(format!(
                "{} is already mounted on {}",
                image.path.display(),
                mnt.display()
            )));
        }

        let mut rollback = Rollback::new();
        let undo_path = image.path.clone();
        rollback.push(format!("remove image {}", image.path.display()), move || {
            remove_file(&undo_path)
        });

        let mnt = tempfile::Builder::new()
            .prefix("sheepdog-mnt-")
            .tempdir_in(&self.config.work_dir)
            .map_err(|e| HarnessError::Mount {
                image: image.path.clone(),
                mount_point: self.config.work_dir.clone(),
                source: Box::new(e.into()),
            })?
            .keep();
        let undo_mnt = mnt.clone();
        rollback.push(format!("remove mount dir {}", mnt.display()), move || {
            remove_dir(&undo_mnt)
        });

        let mount = CommandSpec::new(&self.config.mount)
            .arg(format!("-o{}", LOOP_MOUNT_OPTIONS))
            .arg("-t")
            .arg(&self.config.fs_type)
            .arg(&image.path)
            .arg(&mnt)
            .privileged(&self.config.privilege);
        self.runner
            .run_checked(&mount)
            .map_err(|source| HarnessError::Mount {
                image: image.path.clone(),
                mount_point: mnt.clone(),
                source: Box::new(source),
            })?;

        rollback.commit();
        info!("disk: mounted {} on {}", image.path.display(), mnt.display());
        Ok(DiskImage {
            mount_point: Some(mnt),
            ..image
        })
    }

    /// Create and mount a disk in one step.
    pub fn provision(&self, size_bytes: u64) -> HarnessResult<DiskImage> {
        let image = self.create_backing_disk(size_bytes)?;
        self.mount(image)
    }

    /// Unmount, remove the mount directory, remove the image.
    ///
    /// Steps run in that order and the first failure is returned; nothing
    /// after it is attempted.
    pub fn destroy(&self, image: DiskImage) -> HarnessResult<()> {
        if let Some(mnt) = &image.mount_point {
            let umount = CommandSpec::new(&self.config.umount)
                .arg(mnt)
                .privileged(&self.config.privilege);
            self.runner.run_checked(&umount)?;
            remove_dir(mnt)?;
        }
        remove_file(&image.path)?;
        info!("disk: destroyed {}", image.path.display());
        Ok(())
    }
}

fn remove_file(path: &Path) -> HarnessResult<()> {
    debug!("disk: unlink {}", path.display());
    fs::remove_file(path)?;
    Ok(())
}

fn remove_dir(path: &Path) -> HarnessResult<()> {
    debug!("disk: rmdir {}", path.display());
    fs::remove_dir(path)?;
    Ok(())
}
