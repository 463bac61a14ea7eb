//! Step 04: define and start the guest.

use crate::config_store::Configuration;
use crate::runner::CommandRunner;
use crate::step::{StepBody, StepReport};

/// Imports the fetched image as a new guest and marks it for autostart.
/// If a guest with the configured name already exists, the import is
/// skipped and only autostart is reasserted, keeping re-runs safe.
pub struct DeployGuest;

impl StepBody for DeployGuest {
    fn run(&self, config: &Configuration, runner: &mut CommandRunner<'_>) -> StepReport {
        let name = config.deployment_name.trim();
        if name.is_empty() || config.storage_pool.trim().is_empty() {
            return StepReport::failed("deployment_name and storage_pool must be configured");
        }

        let disk = super::image_path(config);
        let disk_arg = format!("path={},format=qcow2", disk);
        let out = match runner.run(
            "virt-install",
            &[
                "--import",
                "--name",
                name,
                "--disk",
                &disk_arg,
                "--noautoconsole",
            ],
        ) {
            Ok(out) => out,
            Err(e) => return StepReport::failed(e.to_string()),
        };
        if !out.success && !out.stderr.contains("already exists") {
            return StepReport::failed(out.cause("guest import"));
        }

        let out = match runner.run("virsh", &["autostart", name]) {
            Ok(out) => out,
            Err(e) => return StepReport::failed(e.to_string()),
        };
        if !out.success {
            return StepReport::failed(out.cause("guest autostart"));
        }

        StepReport::ok()
    }
}
