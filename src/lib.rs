//! hostprep library
//!
//! Core of the resumable host provisioning orchestrator: the step engine,
//! the durable stores, the execution event contract, and the validation
//! engine. The binary in `main.rs` is a thin interaction layer over these.

pub mod cli;
pub mod config_store;
pub mod error;
pub mod events;
pub mod menu;
pub mod orchestrator;
mod persist;
pub mod runner;
pub mod state_store;
pub mod step;
pub mod steps;
pub mod validate;

pub use config_store::{ConfigStore, Configuration};
pub use error::{HostPrepError, Result};
pub use events::{EventKind, EventSink, ExecutionEvent, FileEventLog, MemoryEventLog};
pub use orchestrator::{
    AlwaysConfirm, Confirmation, ConfirmationGate, Orchestrator, ResumePoint,
};
pub use runner::{CommandOutput, CommandRunner};
pub use state_store::{PersistentState, StateStore};
pub use step::{RunMode, Step, StepBody, StepId, StepOutcome, StepRegistry, StepReport, StepState};
pub use validate::{Check, CheckContext, CheckResult, Severity, Summary, ValidationEngine, ValidationReport};
