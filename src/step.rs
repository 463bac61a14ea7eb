//! Step registry and outcome types.
//!
//! A provisioning run is a fixed, ordered sequence of steps. Each step has a
//! stable numeric ID that never changes meaning or position once published;
//! new steps may only be appended. The registry is a single ordered
//! collection of step records so the ID, display name, and body can never
//! fall out of alignment.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::config_store::Configuration;
use crate::runner::CommandRunner;

/// Stable identifier of a step. Displayed in two-digit form (`01`, `02`, ...)
/// to match the persisted state and log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub u32);

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl FromStr for StepId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse::<u32>().map(StepId)
    }
}

/// Execution mode for a step invocation.
///
/// Dry-run is a first-class, state-advancing mode: the confirmation gate is
/// shown, every lifecycle event is emitted, and a simulated success still
/// commits progress. Only the underlying destructive commands are suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum RunMode {
    Real,
    DryRun,
}

impl RunMode {
    #[inline]
    pub fn is_dry_run(self) -> bool {
        matches!(self, Self::DryRun)
    }
}

/// Terminal outcome of one step invocation.
///
/// Exactly one outcome per invocation. `Canceled` is an explicit non-failure
/// and must never be counted as an error anywhere in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum StepOutcome {
    Done,
    Failed,
    Canceled,
}

impl StepOutcome {
    #[inline]
    pub fn is_done(self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Per-invocation lifecycle state.
///
/// `Done`, `Failed`, and `Canceled` are terminal for one invocation, but a
/// step may re-enter `Running` at any later invocation (re-runnability).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    NotStarted,
    Running,
    Done,
    Failed,
    Canceled,
}

impl StepState {
    /// Returns true if this state ends the current invocation.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Canceled)
    }
}

impl From<StepOutcome> for StepState {
    fn from(outcome: StepOutcome) -> Self {
        match outcome {
            StepOutcome::Done => Self::Done,
            StepOutcome::Failed => Self::Failed,
            StepOutcome::Canceled => Self::Canceled,
        }
    }
}

/// Result reported by a step body.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub success: bool,
    /// Short cause summary for failures, surfaced to the user alongside a
    /// pointer to the detailed log.
    pub cause: Option<String>,
}

impl StepReport {
    pub fn ok() -> Self {
        Self {
            success: true,
            cause: None,
        }
    }

    pub fn failed(cause: impl Into<String>) -> Self {
        Self {
            success: false,
            cause: Some(cause.into()),
        }
    }
}

/// A unit of provisioning work.
///
/// Bodies receive a configuration snapshot and a command runner; the runner
/// carries the run mode and the event sink, so a body never needs to know
/// whether it is simulating. Bodies must never touch the durable stores.
pub trait StepBody {
    fn run(&self, config: &Configuration, runner: &mut CommandRunner<'_>) -> StepReport;
}

/// One registered step: stable ID, display name, and body.
pub struct Step {
    pub id: StepId,
    pub name: &'static str,
    pub body: Box<dyn StepBody>,
}

/// Ordered, append-only collection of steps.
pub struct StepRegistry {
    steps: Vec<Step>,
}

impl StepRegistry {
    /// Build a registry from an ordered list of steps.
    ///
    /// # Panics
    ///
    /// Panics if step IDs are not strictly ascending. This is a programming
    /// error in step registration, not a runtime condition.
    pub fn new(steps: Vec<Step>) -> Self {
        for pair in steps.windows(2) {
            assert!(
                pair[0].id < pair[1].id,
                "step IDs must be strictly ascending: {} then {}",
                pair[0].id,
                pair[1].id
            );
        }
        Self { steps }
    }

    /// Steps in registration order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Look up a step by ID.
    pub fn get(&self, id: StepId) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Number of registered steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// First step whose ID is strictly greater than `after`, in order.
    /// `None` for `after` means "start from the beginning".
    pub fn first_after(&self, after: Option<StepId>) -> Option<&Step> {
        match after {
            None => self.steps.first(),
            Some(last) => self.steps.iter().find(|s| s.id > last),
        }
    }
}
