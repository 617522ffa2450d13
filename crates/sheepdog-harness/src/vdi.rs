//! VDI (Virtual Disk Image) operations through `dog vdi`.
//!
//! Each operation is one `dog` invocation. The only output the harness
//! interprets is `dog vdi list --raw`, parsed by [`parse_vdi_list`]; reads
//! return stdout verbatim and everything else is judged by exit status.

use serde::Serialize;
use tracing::{debug, info};

use crate::command::{CommandRunner, CommandSpec};
use crate::config::HarnessConfig;
use crate::constants::{DEFAULT_VDI_SIZE, VDI_LIST_COLUMNS};
use crate::error::{HarnessError, HarnessResult};
use crate::oid::ObjectId;

/// One row of `dog vdi list --raw`.
///
/// A name can appear several times: once live and once per snapshot, told
/// apart by `tag`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VdiInfo {
    pub name: String,
    /// Logical size in bytes.
    pub size_bytes: u64,
    pub vdi_id: u32,
    pub copies: u32,
    /// Snapshot tag; empty for a VDI without one.
    pub tag: String,
    /// log2 of the VDI's block (object) size.
    pub block_size_shift: u8,
    pub snapshot: bool,
    pub cloned: bool,
}

impl VdiInfo {
    /// Writable VDI that is neither a snapshot nor a clone.
    pub fn is_live(&self) -> bool {
        !self.snapshot && !self.cloned
    }

    /// Block (object) size in bytes.
    pub fn block_size(&self) -> u64 {
        1u64 << self.block_size_shift
    }

    /// The inode object of this VDI.
    pub fn inode_oid(&self) -> ObjectId {
        ObjectId::from_vid(self.vdi_id)
    }

    /// The `idx`-th data object of this VDI.
    pub fn data_oid(&self, idx: u32) -> ObjectId {
        ObjectId::data(self.vdi_id, idx)
    }
}

/// Parse the output of `dog vdi list --raw`.
///
/// Rows are split on single spaces so that an empty tag keeps its column.
/// Column layout: 0 flag (`s` snapshot, `c` clone), 1 name, 3 size,
/// 7 hex id, 8 copies, 9 tag, 10 block size shift. Blank lines are skipped,
/// so empty output is an empty list.
pub fn parse_vdi_list(output: &str) -> HarnessResult<Vec<VdiInfo>> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_vdi_row)
        .collect()
}

fn parse_vdi_row(line: &str) -> HarnessResult<VdiInfo> {
    let bad = || HarnessError::Parse {
        what: "vdi list row",
        line: line.to_string(),
    };

    let cols: Vec<&str> = line.split(' ').collect();
    if cols.len() < VDI_LIST_COLUMNS {
        return Err(bad());
    }

    let hex = cols[7].trim_start_matches("0x");
    let block_size_shift: u8 = cols[10].parse().map_err(|_| bad())?;
    if u32::from(block_size_shift) >= u64::BITS {
        return Err(bad());
    }
    Ok(VdiInfo {
        snapshot: cols[0] == "s",
        cloned: cols[0] == "c",
        name: cols[1].to_string(),
        size_bytes: cols[3].parse().map_err(|_| bad())?,
        vdi_id: u32::from_str_radix(hex, 16).map_err(|_| bad())?,
        copies: cols[8].parse().map_err(|_| bad())?,
        tag: cols[9].to_string(),
        block_size_shift,
    })
}

/// Options for [`VdiManager::read`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadRange {
    /// Start of the range; the whole VDI when `None`.
    pub offset: Option<u64>,
    /// Bytes to read; to the end when `None`. A length without an offset
    /// reads from the start of the VDI.
    pub length: Option<u64>,
}

impl ReadRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn starting_at(offset: u64) -> Self {
        Self {
            offset: Some(offset),
            length: None,
        }
    }

    pub fn span(offset: u64, length: u64) -> Self {
        Self {
            offset: Some(offset),
            length: Some(length),
        }
    }
}

/// Creates, reads, writes, snapshots and clones VDIs.
pub struct VdiManager<'a> {
    runner: &'a dyn CommandRunner,
    config: &'a HarnessConfig,
}

impl<'a> VdiManager<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: &'a HarnessConfig) -> Self {
        Self { runner, config }
    }

    /// Create `name` with `size_bytes` of logical space.
    pub fn create(
        &self,
        name: &str,
        size_bytes: u64,
        prealloc: bool,
        port: Option<u16>,
    ) -> HarnessResult<()> {
        check_name(name)?;
        let mut cmd = self.vdi("create").opt_port(port);
        if prealloc {
            cmd = cmd.arg("--prealloc");
        }
        let cmd = cmd.arg(name).arg(size_bytes.to_string());
        self.runner.run_checked(&cmd)?;
        info!("vdi: created '{}' ({} bytes)", name, size_bytes);
        Ok(())
    }

    /// Create `name` with the default size (one data object).
    pub fn create_default(&self, name: &str, port: Option<u16>) -> HarnessResult<()> {
        self.create(name, DEFAULT_VDI_SIZE, false, port)
    }

    /// Delete `name`, or only its snapshot `tag`.
    pub fn delete(&self, name: &str, tag: Option<&str>, port: Option<u16>) -> HarnessResult<()> {
        let mut cmd = self.vdi("delete").opt_port(port);
        if let Some(tag) = tag {
            cmd = cmd.arg("--snapshot").arg(tag);
        }
        self.runner.run_checked(&cmd.arg(name))?;
        info!("vdi: deleted '{}' tag={:?}", name, tag);
        Ok(())
    }

    /// Every VDI row the cluster reports.
    pub fn list(&self, port: Option<u16>) -> HarnessResult<Vec<VdiInfo>> {
        let cmd = self.vdi("list").arg("--raw").opt_port(port);
        let out = self.runner.run_checked(&cmd)?;
        let vdis = parse_vdi_list(&out.stdout_str())?;
        debug!("vdi: listed {} rows", vdis.len());
        Ok(vdis)
    }

    /// The row identified by (`name`, `tag`); use `""` for an untagged VDI.
    pub fn find(&self, name: &str, tag: &str, port: Option<u16>) -> HarnessResult<Option<VdiInfo>> {
        Ok(self
            .list(port)?
            .into_iter()
            .find(|v| v.name == name && v.tag == tag))
    }

    /// Replace the start of `name` with `content`, streamed on stdin.
    pub fn write(&self, name: &str, content: &[u8], port: Option<u16>) -> HarnessResult<()> {
        let cmd = self.vdi("write").opt_port(port).arg(name).stdin(content);
        let out = self.runner.run(&cmd)?;
        if !out.success() {
            return Err(HarnessError::WriteFailed {
                name: name.to_string(),
                code: out.status,
                stderr: out.stderr_str(),
            });
        }
        info!("vdi: wrote {} bytes to '{}'", content.len(), name);
        Ok(())
    }

    /// Read `range` of `name` (or of its snapshot `tag`).
    pub fn read(
        &self,
        name: &str,
        tag: Option<&str>,
        range: ReadRange,
        port: Option<u16>,
    ) -> HarnessResult<Vec<u8>> {
        let mut cmd = self.vdi("read").opt_port(port);
        if let Some(tag) = tag {
            cmd = cmd.arg("--snapshot").arg(tag);
        }
        cmd = cmd.arg(name);
        match (range.offset, range.length) {
            (Some(offset), None) => cmd = cmd.arg(offset.to_string()),
            (offset, Some(length)) => {
                cmd = cmd
                    .arg(offset.unwrap_or(0).to_string())
                    .arg(length.to_string());
            }
            (None, None) => {}
        }
        let out = self.runner.run_checked(&cmd)?;
        debug!("vdi: read {} bytes from '{}'", out.stdout.len(), name);
        Ok(out.stdout)
    }

    /// Take a snapshot of `name` tagged `tag`.
    pub fn snapshot(&self, name: &str, tag: &str, port: Option<u16>) -> HarnessResult<()> {
        check_tag(tag)?;
        let cmd = self
            .vdi("snapshot")
            .opt_port(port)
            .args(["--snapshot", tag, name]);
        self.runner.run_checked(&cmd)?;
        info!("vdi: snapshot of '{}' tagged '{}'", name, tag);
        Ok(())
    }

    /// Create writable VDI `dst` from snapshot `tag` of `src`.
    pub fn clone(&self, src: &str, tag: &str, dst: &str, port: Option<u16>) -> HarnessResult<()> {
        check_tag(tag)?;
        check_name(dst)?;
        let cmd = self
            .vdi("clone")
            .opt_port(port)
            .args(["--snapshot", tag, src, dst]);
        self.runner.run_checked(&cmd)?;
        info!("vdi: cloned '{}'@'{}' to '{}'", src, tag, dst);
        Ok(())
    }

    fn vdi(&self, sub: &str) -> CommandSpec {
        CommandSpec::new(&self.config.dog).args(["vdi", sub])
    }
}

fn check_name(name: &str) -> HarnessResult<()> {
    if name.is_empty() {
        return Err(HarnessError::InvalidArgument(
            "VDI name cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn check_tag(tag: &str) -> HarnessResult<()> {
    if tag.is_empty() {
        return Err(HarnessError::InvalidArgument(
            "snapshot tag cannot be empty".to_string(),
        ));
    }
    Ok(())
}
