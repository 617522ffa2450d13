//! Sheepdog test harness CLI (sheeptest).
//!
//! Runs single harness operations by hand, which is handy when a test left
//! a cluster in a strange state or when reproducing a failure step by step.
//!
//! # Usage
//!
//! ```text
//! sheeptest [OPTIONS] <COMMAND>
//!
//! Commands:
//!   disk      Backing disk provisioning
//!   node      Start and kill sheep daemons
//!   cluster   Cluster-wide operations
//!   vdi       VDI (Virtual Disk Image) operations
//!   obj       On-disk object inspection
//!
//! Options:
//!   -p, --port <PORT>  Sheep port for dog commands [env: SHEEPDOG_PORT]
//!   -v, --verbose      Enable debug logging
//! ```
//!
//! Tool locations come from `SHEEPDOG_HARNESS_*` environment variables.

mod cluster;
mod common;
mod disk;
mod obj;
mod vdi;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Sheepdog test harness.
#[derive(Parser)]
#[command(name = "sheeptest", version, about = "Sheepdog test harness")]
struct Cli {
    /// Sheep port for dog commands (dog's default when omitted)
    #[arg(short = 'p', long, env = "SHEEPDOG_PORT", global = true)]
    port: Option<u16>,

    /// Enable verbose/debug logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backing disk provisioning
    Disk(disk::DiskArgs),
    /// Start and kill sheep daemons
    Node(cluster::NodeArgs),
    /// Cluster-wide operations
    Cluster(cluster::ClusterArgs),
    /// VDI (Virtual Disk Image) operations
    Vdi(vdi::VdiArgs),
    /// On-disk object inspection
    Obj(obj::ObjArgs),
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let harness = common::harness();
    let port = cli.port;

    match cli.command {
        Commands::Disk(args) => disk::run(&harness, args),
        Commands::Node(args) => cluster::run_node(&harness, port, args),
        Commands::Cluster(args) => cluster::run(&harness, port, args),
        Commands::Vdi(args) => vdi::run(&harness, port, args),
        Commands::Obj(args) => obj::run(&harness, args),
    }
}
