//! Step 02: provision the storage pool backing guest images.

use crate::config_store::Configuration;
use crate::runner::CommandRunner;
use crate::step::{StepBody, StepReport};

/// Creates the pool directory and registers it with libvirt. Both commands
/// tolerate re-runs: `mkdir -p` is idempotent and an already-defined pool
/// only fails the define, which is treated as success when the pool is
/// already active.
pub struct ProvisionStorage;

impl StepBody for ProvisionStorage {
    fn run(&self, config: &Configuration, runner: &mut CommandRunner<'_>) -> StepReport {
        let pool = config.storage_pool.trim();
        if pool.is_empty() {
            return StepReport::failed("storage_pool must be configured");
        }

        let out = match runner.run("mkdir", &["-p", pool]) {
            Ok(out) => out,
            Err(e) => return StepReport::failed(e.to_string()),
        };
        if !out.success {
            return StepReport::failed(out.cause("pool directory creation"));
        }

        let out = match runner.run(
            "virsh",
            &[
                "pool-define-as",
                "hostprep",
                "dir",
                "--target",
                pool,
            ],
        ) {
            Ok(out) => out,
            Err(e) => return StepReport::failed(e.to_string()),
        };
        // an existing pool definition is fine on re-run
        if !out.success && !out.stderr.contains("already exists") {
            return StepReport::failed(out.cause("pool definition"));
        }

        let out = match runner.run("virsh", &["pool-start", "--build", "hostprep"]) {
            Ok(out) => out,
            Err(e) => return StepReport::failed(e.to_string()),
        };
        if !out.success && !out.stderr.contains("already active") {
            return StepReport::failed(out.cause("pool start"));
        }

        StepReport::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, MemoryEventLog};
    use crate::step::{RunMode, StepId};

    #[test]
    fn test_dry_run_command_sequence() {
        let log = MemoryEventLog::new();
        let mut sink = log.clone();
        let mut runner = CommandRunner::new(StepId(2), RunMode::DryRun, &mut sink);

        let mut config = Configuration::default();
        config.set("storage_pool", "/var/lib/hostprep/pool");

        let report = ProvisionStorage.run(&config, &mut runner);
        assert!(report.success);

        let commands: Vec<String> = log
            .snapshot()
            .into_iter()
            .filter_map(|e| match e.kind {
                EventKind::Run { command } => Some(command),
                _ => None,
            })
            .collect();
        assert_eq!(
            commands,
            vec![
                "mkdir -p /var/lib/hostprep/pool",
                "virsh pool-define-as hostprep dir --target /var/lib/hostprep/pool",
                "virsh pool-start --build hostprep",
            ]
        );
    }

    #[test]
    fn test_unset_pool_fails() {
        let log = MemoryEventLog::new();
        let mut sink = log.clone();
        let mut runner = CommandRunner::new(StepId(2), RunMode::DryRun, &mut sink);

        let report = ProvisionStorage.run(&Configuration::default(), &mut runner);
        assert!(!report.success);
        assert!(log.snapshot().is_empty());
    }
}
