//! # sheepdog-harness
//!
//! Drives an external sheepdog cluster from integration tests.
//!
//! The harness provisions loopback XFS disks, starts `sheep` daemons on
//! them, formats and shuts down the cluster, manipulates VDIs through `dog`
//! and inspects the object files sheep leaves on disk. Every operation is a
//! single blocking invocation of an external tool through a
//! [`CommandRunner`], so tests can swap in a fake runner.
//!
//! ```ignore
//! let harness = Harness::from_env();
//! let fixture = ClusterFixture::bring_up(&harness, &FixtureSpec::single(7000, 2))?;
//! let vdi = harness.vdi();
//! vdi.create_default("v1", Some(7000))?;
//! vdi.write("v1", b"hello", Some(7000))?;
//! assert_eq!(vdi.read("v1", None, ReadRange::span(0, 5), Some(7000))?, b"hello");
//! fixture.teardown()?;
//! ```

pub mod cluster;
pub mod command;
pub mod config;
pub mod constants;
pub mod disk;
pub mod error;
pub mod fixture;
pub mod object;
pub mod oid;
pub mod rollback;
pub mod vdi;

#[cfg(test)]
mod fake;

// Re-export commonly used types at the crate root
pub use cluster::{ClusterController, DiskSet, NodeSpec};
pub use command::{CommandOutput, CommandRunner, CommandSpec, SystemRunner};
pub use config::HarnessConfig;
pub use disk::{DiskImage, DiskProvisioner};
pub use error::{HarnessError, HarnessResult};
pub use fixture::{ClusterFixture, FixtureNode, FixtureSpec, RunningNode};
pub use object::{ObjectFile, ObjectLocator};
pub use oid::ObjectId;
pub use rollback::Rollback;
pub use vdi::{parse_vdi_list, ReadRange, VdiInfo, VdiManager};

/// A command runner plus a config, handing out the harness components.
pub struct Harness<R = SystemRunner> {
    runner: R,
    config: HarnessConfig,
}

impl Harness<SystemRunner> {
    /// Real processes, configured from `SHEEPDOG_HARNESS_*`.
    pub fn from_env() -> Self {
        Self::new(SystemRunner, HarnessConfig::from_env())
    }
}

impl<R: CommandRunner> Harness<R> {
    pub fn new(runner: R, config: HarnessConfig) -> Self {
        Self { runner, config }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn disks(&self) -> DiskProvisioner<'_> {
        DiskProvisioner::new(&self.runner, &self.config)
    }

    pub fn cluster(&self) -> ClusterController<'_> {
        ClusterController::new(&self.runner, &self.config)
    }

    pub fn vdi(&self) -> VdiManager<'_> {
        VdiManager::new(&self.runner, &self.config)
    }

    pub fn objects(&self) -> ObjectLocator<'_> {
        ObjectLocator::new(&self.runner, &self.config)
    }
}
