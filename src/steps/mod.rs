//! Concrete provisioning step bodies.
//!
//! Each body is thin glue between the configuration snapshot and the
//! command runner: it validates the keys it needs, runs its commands, and
//! reports `{success, cause}`. Bodies never touch the durable stores and
//! never prompt; confirmation and persistence belong to the orchestrator.

pub mod deploy;
pub mod image;
pub mod network;
pub mod storage;

use crate::config_store::Configuration;
use crate::step::{Step, StepId, StepRegistry};

/// The published step sequence. IDs are stable: positions never change,
/// new steps append at the end.
pub fn registry() -> StepRegistry {
    StepRegistry::new(vec![
        Step {
            id: StepId(1),
            name: "configure-network",
            body: Box::new(network::ConfigureNetwork),
        },
        Step {
            id: StepId(2),
            name: "provision-storage",
            body: Box::new(storage::ProvisionStorage),
        },
        Step {
            id: StepId(3),
            name: "fetch-image",
            body: Box::new(image::FetchImage),
        },
        Step {
            id: StepId(4),
            name: "deploy-guest",
            body: Box::new(deploy::DeployGuest),
        },
    ])
}

/// On-disk location of the guest image inside the storage pool.
pub(crate) fn image_path(config: &Configuration) -> String {
    format!(
        "{}/{}.qcow2",
        config.storage_pool.trim_end_matches('/'),
        config.deployment_name
    )
}
