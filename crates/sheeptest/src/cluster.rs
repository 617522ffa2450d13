//! Node and cluster subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use sheepdog_harness::constants::SD_LISTEN_PORT;
use sheepdog_harness::{DiskSet, Harness, NodeSpec};

use crate::common::check;

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct NodeArgs {
    #[command(subcommand)]
    pub command: NodeCommands,
}

#[derive(Subcommand)]
pub enum NodeCommands {
    /// Start a sheep daemon on mounted disks
    Start {
        /// Disk mount points, in order
        #[arg(required = true)]
        disks: Vec<PathBuf>,
        /// Listen port (defaults to --port)
        #[arg(long)]
        listen: Option<u16>,
        /// Fault zone ID
        #[arg(short = 'z', long)]
        zone: Option<u32>,
        /// Cluster driver
        #[arg(short = 'c', long, default_value = "local")]
        cluster: String,
    },
    /// Force-kill the node listening on a port
    Kill {
        /// Node port (defaults to --port, then 7000)
        node_port: Option<u16>,
    },
}

pub fn run_node(harness: &Harness, port: Option<u16>, args: NodeArgs) {
    let cluster = harness.cluster();
    match args.command {
        NodeCommands::Start {
            mut disks,
            listen,
            zone,
            cluster: driver,
        } => {
            let disk_set = if disks.len() == 1 {
                DiskSet::Single(disks.remove(0))
            } else {
                DiskSet::Multiple(disks)
            };
            let mut node = NodeSpec::new(disk_set).cluster_driver(driver);
            if let Some(p) = listen.or(port) {
                node = node.port(p);
            }
            if let Some(z) = zone {
                node = node.zone(z);
            }
            check("start node", cluster.start_node(&node));
            println!("sheep started");
        }
        NodeCommands::Kill { node_port } => {
            let node_port = node_port.or(port).unwrap_or(SD_LISTEN_PORT);
            check("kill node", cluster.kill_local_node(node_port));
            println!("Node on port {} killed", node_port);
        }
    }
}

// ---------------------------------------------------------------------------
// Cluster
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ClusterArgs {
    #[command(subcommand)]
    pub command: ClusterCommands,
}

#[derive(Subcommand)]
pub enum ClusterCommands {
    /// Force-format the cluster
    Format {
        /// Number of data copies (replicas)
        #[arg(short = 'c', long, default_value_t = 1)]
        copies: u32,
    },
    /// Shutdown the entire cluster
    Shutdown,
}

pub fn run(harness: &Harness, port: Option<u16>, args: ClusterArgs) {
    let cluster = harness.cluster();
    match args.command {
        ClusterCommands::Format { copies } => {
            check("format cluster", cluster.format_cluster(copies, port));
            println!("Cluster formatted with {} copies", copies);
        }
        ClusterCommands::Shutdown => {
            check("shutdown cluster", cluster.shutdown_cluster(port));
            println!("Cluster shut down");
        }
    }
}
