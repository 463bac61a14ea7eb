//! Step 03: fetch the guest image into the storage pool.

use crate::config_store::Configuration;
use crate::runner::CommandRunner;
use crate::step::{StepBody, StepReport};

/// Downloads the configured image into the pool. `curl -C -` resumes a
/// partial transfer, so an interrupted download picks up where it left off
/// on re-run instead of starting over.
pub struct FetchImage;

impl StepBody for FetchImage {
    fn run(&self, config: &Configuration, runner: &mut CommandRunner<'_>) -> StepReport {
        let url = config.image_url.trim();
        if url.is_empty() {
            return StepReport::failed("image_url must be configured");
        }
        if config.storage_pool.trim().is_empty() || config.deployment_name.trim().is_empty() {
            return StepReport::failed("storage_pool and deployment_name must be configured");
        }

        let target = super::image_path(config);
        let out = match runner.run("curl", &["-fSL", "-C", "-", "-o", &target, url]) {
            Ok(out) => out,
            Err(e) => return StepReport::failed(e.to_string()),
        };
        if !out.success {
            return StepReport::failed(out.cause("image download"));
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
    fn test_dry_run_command() {
        let log = MemoryEventLog::new();
        let mut sink = log.clone();
        let mut runner = CommandRunner::new(StepId(3), RunMode::DryRun, &mut sink);

        let mut config = Configuration::default();
        config.set("image_url", "https://images.example.net/base.qcow2");
        config.set("storage_pool", "/pool");
        config.set("deployment_name", "guest01");

        let report = FetchImage.run(&config, &mut runner);
        assert!(report.success);

        let events = log.snapshot();
        match &events[0].kind {
            EventKind::Run { command } => assert_eq!(
                command,
                "curl -fSL -C - -o /pool/guest01.qcow2 https://images.example.net/base.qcow2"
            ),
            other => panic!("expected Run, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_url_fails() {
        let log = MemoryEventLog::new();
        let mut sink = log.clone();
        let mut runner = CommandRunner::new(StepId(3), RunMode::DryRun, &mut sink);

        let report = FetchImage.run(&Configuration::default(), &mut runner);
        assert!(!report.success);
        assert_eq!(report.cause.unwrap(), "image_url must be configured");
    }
}
