//! Read-only environment validation.
//!
//! Checks inspect system and configuration state without changing anything
//! and without prompting. Each check is independent: no shared mutable
//! state, no ordering requirements. A check that cannot determine its
//! status reports FAIL rather than understating risk. The aggregate verdict
//! is mechanical: any FAIL blocks, WARN never does.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::process::Command;

use serde::Serialize;
use strum::Display;

use crate::config_store::Configuration;

/// Severity of one check result. Fixed in meaning regardless of which check
/// produced it: WARN is advisory, FAIL blocks deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Ok,
    Warn,
    Fail,
}

/// Outcome of one check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub check_id: String,
    pub severity: Severity,
    pub message: String,
}

/// Aggregate counts plus the blocking verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub ok: usize,
    pub warn: usize,
    pub fail: usize,
    pub blocking: bool,
}

/// Ordered check results plus their summary.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub results: Vec<CheckResult>,
    pub summary: Summary,
}

impl ValidationReport {
    fn from_results(results: Vec<CheckResult>) -> Self {
        let ok = results
            .iter()
            .filter(|r| r.severity == Severity::Ok)
            .count();
        let warn = results
            .iter()
            .filter(|r| r.severity == Severity::Warn)
            .count();
        let fail = results
            .iter()
            .filter(|r| r.severity == Severity::Fail)
            .count();
        Self {
            results,
            summary: Summary {
                ok,
                warn,
                fail,
                blocking: fail > 0,
            },
        }
    }
}

/// Read-only inputs available to checks. Checks never see the stores, so
/// they cannot read or write persistent state even by accident.
pub struct CheckContext {
    pub config: Configuration,
    /// Directory holding the durable stores. Checks may probe its metadata
    /// but must never write into it.
    pub state_dir: PathBuf,
}

/// One independent, deterministic, read-only check.
pub trait Check {
    fn id(&self) -> &'static str;
    fn run(&self, ctx: &CheckContext) -> (Severity, String);
}

/// Runs registered checks in order and aggregates severities.
pub struct ValidationEngine {
    checks: Vec<Box<dyn Check>>,
}

impl ValidationEngine {
    pub fn new(checks: Vec<Box<dyn Check>>) -> Self {
        Self { checks }
    }

    /// Engine with the built-in host checks.
    pub fn with_builtin_checks() -> Self {
        Self::new(vec![
            Box::new(RequiredBinariesCheck),
            Box::new(StateDirCheck),
            Box::new(ConfigCompleteCheck),
            Box::new(NetworkInterfaceCheck),
            Box::new(StoragePoolCheck),
            Box::new(StoragePoolSpaceCheck),
        ])
    }

    /// Run every check and aggregate. A panicking check is reported as FAIL
    /// under its own ID; it never takes down the report.
    pub fn run_all(&self, ctx: &CheckContext) -> ValidationReport {
        let results = self
            .checks
            .iter()
            .map(|check| {
                let id = check.id();
                match catch_unwind(AssertUnwindSafe(|| check.run(ctx))) {
                    Ok((severity, message)) => CheckResult {
                        check_id: id.to_string(),
                        severity,
                        message,
                    },
                    Err(_) => CheckResult {
                        check_id: id.to_string(),
                        severity: Severity::Fail,
                        message: "check could not determine status".to_string(),
                    },
                }
            })
            .collect();
        ValidationReport::from_results(results)
    }
}

fn binary_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Host commands the step bodies shell out to.
const REQUIRED_BINARIES: &[&str] = &["ip", "curl", "virsh", "virt-install"];

/// All step-body commands must be present on the host.
struct RequiredBinariesCheck;

impl Check for RequiredBinariesCheck {
    fn id(&self) -> &'static str {
        "binaries"
    }

    fn run(&self, _ctx: &CheckContext) -> (Severity, String) {
        let missing: Vec<&str> = REQUIRED_BINARIES
            .iter()
            .copied()
            .filter(|name| !binary_exists(name))
            .collect();
        if missing.is_empty() {
            (Severity::Ok, "all required binaries present".to_string())
        } else {
            (
                Severity::Fail,
                format!("missing binaries: {}", missing.join(", ")),
            )
        }
    }
}

/// All required configuration keys must be set before deployment.
struct ConfigCompleteCheck;

impl Check for ConfigCompleteCheck {
    fn id(&self) -> &'static str {
        "config"
    }

    fn run(&self, ctx: &CheckContext) -> (Severity, String) {
        let missing = ctx.config.missing_required();
        if missing.is_empty() {
            (Severity::Ok, "configuration complete".to_string())
        } else {
            (
                Severity::Fail,
                format!("unset configuration keys: {}", missing.join(", ")),
            )
        }
    }
}

/// The state directory must be usable for atomic commits. The probe is
/// dry: existence and metadata only, nothing is written.
struct StateDirCheck;

impl Check for StateDirCheck {
    fn id(&self) -> &'static str {
        "state-dir"
    }

    fn run(&self, ctx: &CheckContext) -> (Severity, String) {
        let dir = &ctx.state_dir;
        match std::fs::metadata(dir) {
            Ok(meta) if meta.is_dir() => {
                if meta.permissions().readonly() {
                    (
                        Severity::Fail,
                        format!("state directory {} is not writable", dir.display()),
                    )
                } else {
                    (
                        Severity::Ok,
                        format!("state directory {} present", dir.display()),
                    )
                }
            }
            Ok(_) => (
                Severity::Fail,
                format!("state directory {} is not a directory", dir.display()),
            ),
            Err(_) => (
                Severity::Warn,
                format!(
                    "state directory {} does not exist yet, it is created on first commit",
                    dir.display()
                ),
            ),
        }
    }
}

/// The configured network interface should exist on this host. Advisory
/// only: validation may legitimately run on a different machine than the
/// deployment target.
struct NetworkInterfaceCheck;

impl Check for NetworkInterfaceCheck {
    fn id(&self) -> &'static str {
        "network"
    }

    fn run(&self, ctx: &CheckContext) -> (Severity, String) {
        let iface = ctx.config.network_interface.trim();
        if iface.is_empty() {
            return (
                Severity::Warn,
                "no network interface configured yet".to_string(),
            );
        }
        if std::path::Path::new("/sys/class/net").join(iface).exists() {
            (Severity::Ok, format!("interface {} present", iface))
        } else {
            (Severity::Warn, format!("interface {} not found", iface))
        }
    }
}

/// The storage pool path should exist and be a directory.
struct StoragePoolCheck;

impl Check for StoragePoolCheck {
    fn id(&self) -> &'static str {
        "storage"
    }

    fn run(&self, ctx: &CheckContext) -> (Severity, String) {
        let pool = ctx.config.storage_pool.trim();
        if pool.is_empty() {
            return (Severity::Warn, "no storage pool configured yet".to_string());
        }
        match std::fs::metadata(pool) {
            Ok(meta) if meta.is_dir() => (Severity::Ok, format!("storage pool {} present", pool)),
            Ok(_) => (
                Severity::Fail,
                format!("storage pool {} is not a directory", pool),
            ),
            Err(_) => (
                Severity::Warn,
                format!("storage pool {} does not exist yet", pool),
            ),
        }
    }
}

/// Free space floor below which a guest image is unlikely to fit.
const LOW_SPACE_KIB: u64 = 10 * 1024 * 1024;

/// Free disk space at the storage pool path should cover a guest image.
/// An indeterminate measurement is FAIL, never understated.
struct StoragePoolSpaceCheck;

impl Check for StoragePoolSpaceCheck {
    fn id(&self) -> &'static str {
        "pool-space"
    }

    fn run(&self, ctx: &CheckContext) -> (Severity, String) {
        let pool = ctx.config.storage_pool.trim();
        if pool.is_empty() {
            return (Severity::Warn, "no storage pool configured yet".to_string());
        }
        if !std::path::Path::new(pool).exists() {
            return (
                Severity::Warn,
                format!("storage pool {} does not exist yet, free space unknown", pool),
            );
        }

        let output = match Command::new("df").args(["-Pk", pool]).output() {
            Ok(output) if output.status.success() => output,
            _ => {
                return (
                    Severity::Fail,
                    format!("cannot determine free space at {}", pool),
                )
            }
        };
        match parse_df_available(&String::from_utf8_lossy(&output.stdout)) {
            Some(kib) if kib < LOW_SPACE_KIB => (
                Severity::Warn,
                format!("only {} MiB free at {}, images may not fit", kib / 1024, pool),
            ),
            Some(kib) => (Severity::Ok, format!("{} MiB free at {}", kib / 1024, pool)),
            None => (
                Severity::Fail,
                format!("cannot determine free space at {}", pool),
            ),
        }
    }
}

/// Available column (KiB) from POSIX `df -Pk` output.
fn parse_df_available(output: &str) -> Option<u64> {
    output.lines().nth(1)?.split_whitespace().nth(3)?.parse().ok()
}
