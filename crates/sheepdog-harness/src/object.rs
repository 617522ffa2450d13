//! On-disk object inspection.
//!
//! Sheep keeps every object as a plain file under `{disk}/obj/`. Tests use
//! this module to check where replicas landed and that copies agree, by
//! listing those directories, searching all mounted disks for an object
//! file and hashing what they find. Results are only meaningful while the
//! disks stay mounted.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::command::{CommandRunner, CommandSpec};
use crate::config::HarnessConfig;
use crate::constants::OBJ_DIR;
use crate::disk::DiskImage;
use crate::error::{HarnessError, HarnessResult};
use crate::oid::ObjectId;

/// An object file found on a disk, with the hash of its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectFile {
    pub path: PathBuf,
    pub content_hash: String,
}

/// Lists, finds and hashes object files on mounted disks.
pub struct ObjectLocator<'a> {
    runner: &'a dyn CommandRunner,
    config: &'a HarnessConfig,
}

impl<'a> ObjectLocator<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: &'a HarnessConfig) -> Self {
        Self { runner, config }
    }

    /// Names of the entries in `{directory}/obj`.
    pub fn list_object_files(&self, directory: &Path) -> HarnessResult<Vec<String>> {
        let cmd = CommandSpec::new(&self.config.ls).arg(directory.join(OBJ_DIR));
        let out = self.runner.run_checked(&cmd)?;
        Ok(non_empty_lines(&out.stdout_str())
            .map(str::to_string)
            .collect())
    }

    /// Object IDs stored in `{directory}/obj`; other entries are skipped.
    pub fn list_objects(&self, directory: &Path) -> HarnessResult<Vec<(ObjectId, u8)>> {
        Ok(self
            .list_object_files(directory)?
            .iter()
            .filter_map(|name| ObjectId::from_file_name(name))
            .collect())
    }

    /// Every regular file named exactly `file_name` on any mounted disk.
    ///
    /// All disks are searched with a single `find`; matches come back in
    /// the order it reports them. Unmounted disks are skipped.
    pub fn find_object_file(
        &self,
        disks: &[DiskImage],
        file_name: &str,
    ) -> HarnessResult<Vec<PathBuf>> {
        let roots: Vec<&PathBuf> = disks
            .iter()
            .filter_map(|d| d.mount_point.as_ref())
            .collect();
        if roots.is_empty() {
            debug!("object: no mounted disks to search for {}", file_name);
            return Ok(Vec::new());
        }

        let cmd = CommandSpec::new(&self.config.find)
            .args(roots)
            .args(["-type", "f", "-name", file_name]);
        let out = self.runner.run_checked(&cmd)?;
        let paths: Vec<PathBuf> = non_empty_lines(&out.stdout_str())
            .map(PathBuf::from)
            .collect();
        debug!("object: {} copies of {}", paths.len(), file_name);
        Ok(paths)
    }

    /// Every on-disk copy of `oid`.
    pub fn find_object(&self, disks: &[DiskImage], oid: ObjectId) -> HarnessResult<Vec<PathBuf>> {
        self.find_object_file(disks, &oid.file_name(0))
    }

    /// Content hash of `path`: the first token the checksum tool prints.
    pub fn checksum(&self, path: &Path) -> HarnessResult<String> {
        let cmd = CommandSpec::new(&self.config.checksum).arg(path);
        let out = self.runner.run_checked(&cmd)?;
        let stdout = out.stdout_str();
        stdout
            .split_whitespace()
            .next()
            .map(str::to_string)
            .ok_or_else(|| HarnessError::Parse {
                what: "checksum output",
                line: stdout.clone(),
            })
    }

    pub fn object_file(&self, path: &Path) -> HarnessResult<ObjectFile> {
        Ok(ObjectFile {
            path: path.to_path_buf(),
            content_hash: self.checksum(path)?,
        })
    }
}

fn non_empty_lines(s: &str) -> impl Iterator<Item = &str> {
    s.lines().filter(|l| !l.is_empty())
}
