//! Harness configuration.
//!
//! Names the external tools the harness invokes and where scratch files go.
//! Every field can be overridden from the environment so a CI job can point
//! the suite at a freshly built `sheep`/`dog` without touching test code.

use std::path::PathBuf;

use tracing::debug;

use crate::constants::{DEFAULT_FS_TYPE, DEFAULT_SECTOR_SIZE};

/// Prefix of every environment override, e.g. `SHEEPDOG_HARNESS_DOG`.
pub const ENV_PREFIX: &str = "SHEEPDOG_HARNESS_";

/// Locations of external tools and scratch space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Control client.
    pub dog: PathBuf,
    /// Storage daemon.
    pub sheep: PathBuf,
    /// Filesystem formatter for backing images.
    pub mkfs: PathBuf,
    /// Filesystem type passed to `mount -t`.
    pub fs_type: String,
    pub mount: PathBuf,
    pub umount: PathBuf,
    pub ls: PathBuf,
    pub find: PathBuf,
    /// Content hash tool; the digest must be the first output token.
    pub checksum: PathBuf,
    /// Argv prefix for privileged commands (mount, umount, sheep).
    /// Empty when the harness already runs as root.
    pub privilege: Vec<String>,
    /// Directory for backing images and mount points.
    pub work_dir: PathBuf,
    /// Sector size passed to mkfs.
    pub sector_size: u32,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            dog: PathBuf::from("dog"),
            sheep: PathBuf::from("sheep"),
            mkfs: PathBuf::from("mkfs.xfs"),
            fs_type: DEFAULT_FS_TYPE.to_string(),
            mount: PathBuf::from("mount"),
            umount: PathBuf::from("umount"),
            ls: PathBuf::from("ls"),
            find: PathBuf::from("find"),
            checksum: PathBuf::from("md5sum"),
            privilege: vec!["sudo".to_string()],
            work_dir: std::env::temp_dir(),
            sector_size: DEFAULT_SECTOR_SIZE,
        }
    }
}

impl HarnessConfig {
    /// Build a config from the defaults and `SHEEPDOG_HARNESS_*` variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from the defaults and an arbitrary variable source.
    ///
    /// `lookup` receives the full variable name. An unparsable
    /// `SECTOR_SIZE` is ignored and the default kept.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            let key = format!("{}{}", ENV_PREFIX, name);
            let value = lookup(&key);
            if let Some(v) = &value {
                debug!("config override {}={}", key, v);
            }
            value
        };

        let mut cfg = Self::default();
        let paths: [(&str, &mut PathBuf); 9] = [
            ("DOG", &mut cfg.dog),
            ("SHEEP", &mut cfg.sheep),
            ("MKFS", &mut cfg.mkfs),
            ("MOUNT", &mut cfg.mount),
            ("UMOUNT", &mut cfg.umount),
            ("LS", &mut cfg.ls),
            ("FIND", &mut cfg.find),
            ("CHECKSUM", &mut cfg.checksum),
            ("WORK_DIR", &mut cfg.work_dir),
        ];
        for (name, slot) in paths {
            if let Some(v) = var(name) {
                *slot = PathBuf::from(v);
            }
        }
        if let Some(v) = var("FS_TYPE") {
            cfg.fs_type = v;
        }
        if let Some(v) = var("PRIVILEGE") {
            cfg.privilege = v.split_whitespace().map(str::to_string).collect();
        }
        if let Some(size) = var("SECTOR_SIZE").and_then(|v| v.trim().parse().ok()) {
            cfg.sector_size = size;
        }
        cfg
    }
}
