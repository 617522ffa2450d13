//! Fixed values of the sheepdog tooling the harness drives.
//!
//! Tool locations and other per-run settings live in
//! [`crate::config::HarnessConfig`]; this module only holds values that
//! are part of the on-disk or command-line contract.

// ─── Cluster ────────────────────────────────────────────────────────────────

/// Default listen port of a sheep daemon.
pub const SD_LISTEN_PORT: u16 = 7000;

/// Cluster driver used when a node spec does not name one.
pub const DEFAULT_CLUSTER_DRIVER: &str = "local";

/// Separator between disk paths on the sheep command line.
pub const DISK_SEPARATOR: &str = ",";

/// Data object size (4 MB).
pub const SD_DATA_OBJ_SIZE: u64 = 1 << 22;

/// Size of a VDI created without an explicit size: exactly one data object.
pub const DEFAULT_VDI_SIZE: u64 = SD_DATA_OBJ_SIZE;

// ─── Disks ──────────────────────────────────────────────────────────────────

/// Sector size passed to mkfs for every backing image.
pub const DEFAULT_SECTOR_SIZE: u32 = 4096;

/// Filesystem type of the backing images.
pub const DEFAULT_FS_TYPE: &str = "xfs";

/// Mount options for the loopback mounts.
pub const LOOP_MOUNT_OPTIONS: &str = "loop,noatime";

/// Name of the object directory sheep creates at the root of each disk.
pub const OBJ_DIR: &str = "obj";

// ─── Listing ────────────────────────────────────────────────────────────────

/// Minimum number of columns in a `dog vdi list --raw` row.
pub const VDI_LIST_COLUMNS: usize = 11;
