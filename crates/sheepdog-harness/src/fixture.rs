//! Whole-cluster bring-up and teardown.
//!
//! [`ClusterFixture::bring_up`] provisions the disks of every node, starts
//! the nodes and formats the cluster once. Each acquired disk and node is
//! registered on a [`Rollback`], so a failure half way leaves nothing behind
//! except what a failing undo step could not release (those are logged).
//! [`ClusterFixture::teardown`] is the explicit counterpart.

use tracing::{info, warn};

use crate::cluster::{DiskSet, NodeSpec};
use crate::command::CommandRunner;
use crate::disk::DiskImage;
use crate::error::{HarnessError, HarnessResult};
use crate::rollback::Rollback;
use crate::Harness;

/// One node of a fixture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureNode {
    pub port: u16,
    pub zone: Option<u32>,
    /// Number of backing disks; must be at least one.
    pub nr_disks: usize,
}

/// Shape of a test cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureSpec {
    /// Size of every backing disk in bytes.
    pub disk_size: u64,
    /// Replication factor passed to `cluster format`.
    pub copies: u32,
    pub cluster_driver: Option<String>,
    pub nodes: Vec<FixtureNode>,
}

impl FixtureSpec {
    /// Default size of a fixture disk (1 GB).
    pub const DEFAULT_DISK_SIZE: u64 = 1 << 30;

    /// One node on `port` with `nr_disks` disks and a single copy.
    pub fn single(port: u16, nr_disks: usize) -> Self {
        Self {
            disk_size: Self::DEFAULT_DISK_SIZE,
            copies: 1,
            cluster_driver: None,
            nodes: vec![FixtureNode {
                port,
                zone: None,
                nr_disks,
            }],
        }
    }

    /// `nr_nodes` nodes on consecutive ports from `base_port`, one zone each.
    pub fn multi(base_port: u16, nr_nodes: u16, nr_disks: usize, copies: u32) -> Self {
        Self {
            disk_size: Self::DEFAULT_DISK_SIZE,
            copies,
            cluster_driver: None,
            nodes: (0..nr_nodes)
                .map(|i| FixtureNode {
                    port: base_port + i,
                    zone: Some(u32::from(i)),
                    nr_disks,
                })
                .collect(),
        }
    }

    fn validate(&self) -> HarnessResult<()> {
        if self.nodes.is_empty() {
            return Err(HarnessError::InvalidArgument(
                "fixture needs at least one node".to_string(),
            ));
        }
        if let Some(node) = self.nodes.iter().find(|n| n.nr_disks == 0) {
            return Err(HarnessError::InvalidArgument(format!(
                "node on port {} has no disks",
                node.port
            )));
        }
        Ok(())
    }
}

/// A started node and the disks it runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningNode {
    pub port: u16,
    pub zone: Option<u32>,
    pub disks: Vec<DiskImage>,
}

/// A running, formatted cluster.
///
/// Dropping the fixture without [`ClusterFixture::teardown`] leaves the
/// nodes running and the disks mounted; a warning is logged.
pub struct ClusterFixture<'h, R: CommandRunner> {
    harness: &'h Harness<R>,
    nodes: Vec<RunningNode>,
    port: u16,
}

impl<'h, R: CommandRunner> ClusterFixture<'h, R> {
    /// Provision, start and format the cluster described by `spec`.
    pub fn bring_up(harness: &'h Harness<R>, spec: &FixtureSpec) -> HarnessResult<Self> {
        spec.validate()?;

        let mut rollback = Rollback::new();
        let mut nodes = Vec::with_capacity(spec.nodes.len());

        for node in &spec.nodes {
            let mut disks = Vec::with_capacity(node.nr_disks);
            for _ in 0..node.nr_disks {
                let disk = harness.disks().provision(spec.disk_size)?;
                let undo = disk.clone();
                rollback.push(format!("destroy disk {}", disk.path.display()), move || {
                    harness.disks().destroy(undo)
                });
                disks.push(disk);
            }

            let mut node_spec = NodeSpec::new(DiskSet::from_images(&disks)?).port(node.port);
            if let Some(zone) = node.zone {
                node_spec = node_spec.zone(zone);
            }
            if let Some(driver) = &spec.cluster_driver {
                node_spec = node_spec.cluster_driver(driver.clone());
            }
            harness.cluster().start_node(&node_spec)?;
            let port = node.port;
            rollback.push(format!("kill node on port {}", port), move || {
                harness.cluster().kill_local_node(port)
            });

            nodes.push(RunningNode {
                port,
                zone: node.zone,
                disks,
            });
        }

        let port = spec.nodes[0].port;
        harness.cluster().format_cluster(spec.copies, Some(port))?;

        rollback.commit();
        info!(
            "fixture: {} nodes up, {} copies, control port {}",
            nodes.len(),
            spec.copies,
            port
        );
        Ok(Self {
            harness,
            nodes,
            port,
        })
    }

    /// Control port used for cluster-wide commands.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn nodes(&self) -> &[RunningNode] {
        &self.nodes
    }

    /// Every disk of every node, in bring-up order.
    pub fn disks(&self) -> Vec<DiskImage> {
        self.nodes
            .iter()
            .flat_map(|n| n.disks.iter().cloned())
            .collect()
    }

    /// Kill one node; its disks stay mounted until teardown.
    pub fn kill_node(&self, port: u16) -> HarnessResult<()> {
        self.harness.cluster().kill_local_node(port)
    }

    /// Shut the cluster down and destroy every disk, newest first.
    ///
    /// Every step is attempted. The first failure is returned, later ones
    /// are logged.
    pub fn teardown(mut self) -> HarnessResult<()> {
        let nodes = std::mem::take(&mut self.nodes);
        let mut first: Option<HarnessError> = None;
        let mut record = |step: String, result: HarnessResult<()>| {
            if let Err(e) = result {
                if first.is_none() {
                    first = Some(e);
                } else {
                    warn!("fixture teardown: {} failed: {}", step, e);
                }
            }
        };

        record(
            "cluster shutdown".to_string(),
            self.harness.cluster().shutdown_cluster(Some(self.port)),
        );
        for node in nodes.into_iter().rev() {
            for disk in node.disks.into_iter().rev() {
                let step = format!("destroy disk {}", disk.path.display());
                record(step, self.harness.disks().destroy(disk));
            }
        }

        match first {
            Some(e) => Err(e),
            None => {
                info!("fixture: torn down");
                Ok(())
            }
        }
    }
}

impl<R: CommandRunner> Drop for ClusterFixture<'_, R> {
    fn drop(&mut self) {
        if !self.nodes.is_empty() {
            warn!(
                "fixture dropped without teardown: {} nodes still running on port {}",
                self.nodes.len(),
                self.port
            );
        }
    }
}
