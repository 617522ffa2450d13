//! Sheep daemon and cluster-wide control.
//!
//! Starting a node launches `sheep` on one or more mounted disks. Everything
//! else (format, shutdown, kill) goes through `dog` against a node's port.

use std::ffi::OsString;
use std::path::PathBuf;

use tracing::info;

use crate::command::{CommandRunner, CommandSpec};
use crate::config::HarnessConfig;
use crate::constants::{DEFAULT_CLUSTER_DRIVER, DISK_SEPARATOR};
use crate::disk::DiskImage;
use crate::error::{HarnessError, HarnessResult};

/// The disk argument of a sheep node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiskSet {
    Single(PathBuf),
    /// Ordered; sheep receives them comma-joined.
    Multiple(Vec<PathBuf>),
}

impl DiskSet {
    /// Disk set made of the mount points of `images`.
    ///
    /// Every image must be mounted.
    pub fn from_images(images: &[DiskImage]) -> HarnessResult<Self> {
        let mut paths = Vec::with_capacity(images.len());
        for image in images {
            let mnt = image.mount_point.clone().ok_or_else(|| {
                HarnessError::InvalidArgument(format!(
                    "disk {} is not mounted",
                    image.path.display()
                ))
            })?;
            paths.push(mnt);
        }
        Ok(Self::Multiple(paths))
    }

    /// Render the sheep command-line argument.
    pub fn to_arg(&self) -> HarnessResult<OsString> {
        match self {
            Self::Single(path) => Ok(path.clone().into_os_string()),
            Self::Multiple(paths) if paths.is_empty() => Err(HarnessError::InvalidArgument(
                "disk set must name at least one disk".to_string(),
            )),
            Self::Multiple(paths) => {
                let mut arg = OsString::new();
                for (i, path) in paths.iter().enumerate() {
                    if i > 0 {
                        arg.push(DISK_SEPARATOR);
                    }
                    arg.push(path);
                }
                Ok(arg)
            }
        }
    }
}

impl From<PathBuf> for DiskSet {
    fn from(path: PathBuf) -> Self {
        Self::Single(path)
    }
}

impl From<Vec<PathBuf>> for DiskSet {
    fn from(paths: Vec<PathBuf>) -> Self {
        Self::Multiple(paths)
    }
}

/// How to start one sheep daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    pub disks: DiskSet,
    /// Listen port; sheep's default when `None`.
    pub port: Option<u16>,
    /// Fault zone used for replica placement.
    pub zone: Option<u32>,
    /// Cluster driver name; `local` when `None`.
    pub cluster_driver: Option<String>,
}

impl NodeSpec {
    pub fn new(disks: impl Into<DiskSet>) -> Self {
        Self {
            disks: disks.into(),
            port: None,
            zone: None,
            cluster_driver: None,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn zone(mut self, zone: u32) -> Self {
        self.zone = Some(zone);
        self
    }

    pub fn cluster_driver(mut self, driver: impl Into<String>) -> Self {
        self.cluster_driver = Some(driver.into());
        self
    }

    pub fn driver_name(&self) -> &str {
        self.cluster_driver
            .as_deref()
            .unwrap_or(DEFAULT_CLUSTER_DRIVER)
    }
}

/// Starts nodes and runs cluster-wide `dog` commands.
pub struct ClusterController<'a> {
    runner: &'a dyn CommandRunner,
    config: &'a HarnessConfig,
}

impl<'a> ClusterController<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: &'a HarnessConfig) -> Self {
        Self { runner, config }
    }

    /// Launch `sheep` for `node`. Returns once the launcher exits.
    pub fn start_node(&self, node: &NodeSpec) -> HarnessResult<()> {
        let disks = node.disks.to_arg()?;

        let mut cmd = CommandSpec::new(&self.config.sheep).opt_port(node.port);
        if let Some(zone) = node.zone {
            cmd = cmd.arg("--zone").arg(zone.to_string());
        }
        let cmd = cmd
            .arg("--cluster")
            .arg(node.driver_name())
            .arg(disks)
            .privileged(&self.config.privilege);

        self.runner.run_checked(&cmd)?;
        info!(
            "cluster: started sheep port={:?} zone={:?} driver={}",
            node.port,
            node.zone,
            node.driver_name()
        );
        Ok(())
    }

    /// Force-terminate the node listening on `port`.
    pub fn kill_local_node(&self, port: u16) -> HarnessResult<()> {
        let cmd = self.dog(["node", "kill", "--local"]).opt_port(Some(port));
        self.runner.run_checked(&cmd)?;
        info!("cluster: killed node on port {}", port);
        Ok(())
    }

    /// Format the cluster with `copies` replicas, overwriting any old format.
    pub fn format_cluster(&self, copies: u32, port: Option<u16>) -> HarnessResult<()> {
        if copies == 0 {
            return Err(HarnessError::InvalidArgument(
                "number of copies must be at least 1".to_string(),
            ));
        }
        let cmd = self
            .dog(["cluster", "format", "--force"])
            .opt_port(port)
            .arg("--copies")
            .arg(copies.to_string());
        self.runner.run_checked(&cmd)?;
        info!("cluster: formatted with {} copies", copies);
        Ok(())
    }

    /// Stop every node of the cluster reachable through `port`.
    pub fn shutdown_cluster(&self, port: Option<u16>) -> HarnessResult<()> {
        let cmd = self.dog(["cluster", "shutdown"]).opt_port(port);
        self.runner.run_checked(&cmd)?;
        info!("cluster: shut down");
        Ok(())
    }

    fn dog<const N: usize>(&self, args: [&str; N]) -> CommandSpec {
        CommandSpec::new(&self.config.dog).args(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutput;
    use crate::fake::{argv, ScriptedRunner};

    #[test]
    fn test_disk_set_arg() {
        let single = DiskSet::from(PathBuf::from("/mnt/a"));
        assert_eq!(single.to_arg().unwrap(), OsString::from("/mnt/a"));

        let multi = DiskSet::from(vec![PathBuf::from("/mnt/a"), PathBuf::from("/mnt/b")]);
        assert_eq!(multi.to_arg().unwrap(), OsString::from("/mnt/a,/mnt/b"));

        let empty = DiskSet::Multiple(Vec::new());
        assert!(matches!(
            empty.to_arg(),
            Err(HarnessError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_disk_set_requires_mounted_images() {
        let mounted = DiskImage {
            path: PathBuf::from("/tmp/a.img"),
            size_bytes: 1,
            mount_point: Some(PathBuf::from("/tmp/a")),
        };
        let unmounted = DiskImage {
            path: PathBuf::from("/tmp/b.img"),
            size_bytes: 1,
            mount_point: None,
        };
        assert_eq!(
            DiskSet::from_images(std::slice::from_ref(&mounted)).unwrap(),
            DiskSet::Multiple(vec![PathBuf::from("/tmp/a")])
        );
        assert!(DiskSet::from_images(&[mounted, unmounted]).is_err());
    }

    #[test]
    fn test_start_node_full_args() {
        let cfg = HarnessConfig::default();
        let runner = ScriptedRunner::new();
        let node = NodeSpec::new(vec![PathBuf::from("/mnt/a"), PathBuf::from("/mnt/b")])
            .port(7001)
            .zone(2);

        ClusterController::new(&runner, &cfg).start_node(&node).unwrap();

        assert_eq!(
            runner.argvs(),
            vec![argv(&[
                "sudo", "sheep", "--port", "7001", "--zone", "2", "--cluster", "local",
                "/mnt/a,/mnt/b",
            ])]
        );
    }

    #[test]
    fn test_start_node_defaults() {
        let cfg = HarnessConfig {
            privilege: Vec::new(),
            ..HarnessConfig::default()
        };
        let runner = ScriptedRunner::new();
        let node = NodeSpec::new(PathBuf::from("/mnt/a")).cluster_driver("zookeeper:host");

        ClusterController::new(&runner, &cfg).start_node(&node).unwrap();

        assert_eq!(
            runner.argvs(),
            vec![argv(&["sheep", "--cluster", "zookeeper:host", "/mnt/a"])]
        );
    }

    #[test]
    fn test_start_node_empty_disks_runs_nothing() {
        let cfg = HarnessConfig::default();
        let runner = ScriptedRunner::new();
        let node = NodeSpec::new(Vec::<PathBuf>::new());

        let err = ClusterController::new(&runner, &cfg)
            .start_node(&node)
            .unwrap_err();
        assert!(matches!(err, HarnessError::InvalidArgument(_)));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_dog_commands() {
        let cfg = HarnessConfig::default();
        let runner = ScriptedRunner::new();
        let cluster = ClusterController::new(&runner, &cfg);

        cluster.kill_local_node(7002).unwrap();
        cluster.format_cluster(3, Some(7000)).unwrap();
        cluster.format_cluster(2, None).unwrap();
        cluster.shutdown_cluster(None).unwrap();
        cluster.shutdown_cluster(Some(7000)).unwrap();

        assert_eq!(
            runner.argvs(),
            vec![
                argv(&["dog", "node", "kill", "--local", "--port", "7002"]),
                argv(&["dog", "cluster", "format", "--force", "--port", "7000", "--copies", "3"]),
                argv(&["dog", "cluster", "format", "--force", "--copies", "2"]),
                argv(&["dog", "cluster", "shutdown"]),
                argv(&["dog", "cluster", "shutdown", "--port", "7000"]),
            ]
        );
    }

    #[test]
    fn test_format_zero_copies_rejected() {
        let cfg = HarnessConfig::default();
        let runner = ScriptedRunner::new();
        let err = ClusterController::new(&runner, &cfg)
            .format_cluster(0, None)
            .unwrap_err();
        assert!(matches!(err, HarnessError::InvalidArgument(_)));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_failure_carries_exit_code() {
        let cfg = HarnessConfig::default();
        let runner = ScriptedRunner::new();
        runner.reply(CommandOutput::failed(1, "Failed to connect to 127.0.0.1:7000"));

        let err = ClusterController::new(&runner, &cfg)
            .shutdown_cluster(None)
            .unwrap_err();
        assert_eq!(err.exit_code(), Some(1));
    }
}
