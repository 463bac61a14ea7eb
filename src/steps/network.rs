//! Step 01: configure the host network interface.

use crate::config_store::Configuration;
use crate::runner::CommandRunner;
use crate::step::{StepBody, StepReport};

/// Brings the configured interface up with its static address and default
/// gateway. Address assignment uses `replace` semantics so re-running the
/// step on an already-configured host is a no-op rather than an error.
pub struct ConfigureNetwork;

impl StepBody for ConfigureNetwork {
    fn run(&self, config: &Configuration, runner: &mut CommandRunner<'_>) -> StepReport {
        let iface = config.network_interface.trim();
        let address = config.network_address.trim();
        let gateway = config.network_gateway.trim();
        if iface.is_empty() || address.is_empty() || gateway.is_empty() {
            return StepReport::failed(
                "network_interface, network_address, and network_gateway must be configured",
            );
        }

        let out = match runner.run("ip", &["addr", "replace", address, "dev", iface]) {
            Ok(out) => out,
            Err(e) => return StepReport::failed(e.to_string()),
        };
        if !out.success {
            return StepReport::failed(out.cause("address assignment"));
        }

        let out = match runner.run("ip", &["link", "set", iface, "up"]) {
            Ok(out) => out,
            Err(e) => return StepReport::failed(e.to_string()),
        };
        if !out.success {
            return StepReport::failed(out.cause("link activation"));
        }

        let out = match runner.run("ip", &["route", "replace", "default", "via", gateway]) {
            Ok(out) => out,
            Err(e) => return StepReport::failed(e.to_string()),
        };
        if !out.success {
            return StepReport::failed(out.cause("default route"));
        }

        StepReport::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, MemoryEventLog};
    use crate::step::{RunMode, StepId};

    fn config() -> Configuration {
        let mut config = Configuration::default();
        config.set("network_interface", "eth0");
        config.set("network_address", "192.168.10.2/24");
        config.set("network_gateway", "192.168.10.1");
        config
    }

    #[test]
    fn test_dry_run_command_sequence() {
        let log = MemoryEventLog::new();
        let mut sink = log.clone();
        let mut runner = CommandRunner::new(StepId(1), RunMode::DryRun, &mut sink);

        let report = ConfigureNetwork.run(&config(), &mut runner);
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
                "ip addr replace 192.168.10.2/24 dev eth0",
                "ip link set eth0 up",
                "ip route replace default via 192.168.10.1",
            ]
        );
    }

    #[test]
    fn test_missing_keys_fail_before_any_command() {
        let log = MemoryEventLog::new();
        let mut sink = log.clone();
        let mut runner = CommandRunner::new(StepId(1), RunMode::DryRun, &mut sink);

        let report = ConfigureNetwork.run(&Configuration::default(), &mut runner);
        assert!(!report.success);
        assert!(log.snapshot().is_empty());
    }
}
