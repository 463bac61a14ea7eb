//! Step orchestration engine.
//!
//! The orchestrator owns the resume logic and the per-invocation state
//! machine. It guarantees:
//!
//! - progress is committed only when a step's outcome is DONE, atomically,
//!   before `run_step` returns;
//! - FAILED and CANCELED never mutate durable state and never escalate
//!   beyond halting the current auto-continue pass;
//! - re-running an already-completed step is always legal and never
//!   regresses the resume point;
//! - dry-run follows the exact same control path (gate, events, commit)
//!   with only the destructive commands suppressed.

use crate::config_store::Configuration;
use crate::error::{HostPrepError, Result};
use crate::events::{now_unix, EventKind, EventSink, ExecutionEvent};
use crate::runner::CommandRunner;
use crate::state_store::StateStore;
use crate::step::{RunMode, Step, StepId, StepOutcome, StepRegistry, StepState};

/// Decision returned by the confirmation gate.
///
/// `Declined` and `Canceled` are equivalent here: both resolve the step to
/// `StepOutcome::Canceled` without running the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
    Canceled,
}

/// External interaction layer consulted before each step body runs.
///
/// The gate is the only legitimate blocking point in the system; it may
/// wait indefinitely for a human decision. It is consulted in dry-run mode
/// too, so the interaction trace matches a real run.
pub trait ConfirmationGate {
    fn confirm_step(&mut self, step: &Step, mode: RunMode) -> Confirmation;
}

/// Gate that confirms everything. Used by `--yes` runs and tests.
pub struct AlwaysConfirm;

impl ConfirmationGate for AlwaysConfirm {
    fn confirm_step(&mut self, _step: &Step, _mode: RunMode) -> Confirmation {
        Confirmation::Confirmed
    }
}

/// Where execution would resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePoint {
    Step(StepId),
    AllComplete,
}

/// Central state machine driving step execution.
pub struct Orchestrator {
    registry: StepRegistry,
    config: Configuration,
    state: StateStore,
    sink: Box<dyn EventSink>,
    gate: Box<dyn ConfirmationGate>,
}

impl Orchestrator {
    pub fn new(
        registry: StepRegistry,
        config: Configuration,
        state: StateStore,
        sink: Box<dyn EventSink>,
        gate: Box<dyn ConfirmationGate>,
    ) -> Self {
        Self {
            registry,
            config,
            state,
            sink,
            gate,
        }
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn state_store(&self) -> &StateStore {
        &self.state
    }

    /// First step not yet completed, in registration order.
    ///
    /// Pure function of persistent state: no side effects, no events.
    pub fn resume_point(&self) -> Result<ResumePoint> {
        let state = self.state.load()?;
        Ok(match self.registry.first_after(state.last_completed_step) {
            Some(step) => ResumePoint::Step(step.id),
            None => ResumePoint::AllComplete,
        })
    }

    /// Run one step through the full lifecycle: START event, confirmation
    /// gate, body, then exactly one terminal event.
    ///
    /// On DONE the commit lands on disk before this returns; a crash after
    /// the body succeeds but before the commit re-runs the step next
    /// session, which is safe because steps are idempotent by contract.
    pub fn run_step(&mut self, id: StepId, mode: RunMode) -> Result<StepOutcome> {
        let step = self
            .registry
            .get(id)
            .ok_or_else(|| HostPrepError::UnknownStep(id.to_string()))?;

        log::info!("step {} ({}) starting in {} mode", id, step.name, mode);
        self.sink
            .emit(&ExecutionEvent::new(Some(id), EventKind::Start))?;

        match self.gate.confirm_step(step, mode) {
            Confirmation::Confirmed => {}
            Confirmation::Declined | Confirmation::Canceled => {
                log::info!("step {} canceled at confirmation gate", id);
                self.sink
                    .emit(&ExecutionEvent::new(Some(id), EventKind::Canceled))?;
                return Ok(StepOutcome::Canceled);
            }
        }

        let report = {
            let mut runner = CommandRunner::new(id, mode, self.sink.as_mut());
            step.body.run(&self.config, &mut runner)
        };

        if report.success {
            // Commit before the DONE event and before returning: the event
            // stream must never claim completion that is not yet durable.
            self.state.commit(id, now_unix())?;
            log::info!("step {} done", id);
            self.sink
                .emit(&ExecutionEvent::new(Some(id), EventKind::Done))?;
            Ok(StepOutcome::Done)
        } else {
            let cause = report
                .cause
                .unwrap_or_else(|| "step reported failure".to_string());
            log::warn!("step {} failed: {}", id, cause);
            self.sink
                .emit(&ExecutionEvent::new(Some(id), EventKind::Failed { cause }))?;
            Ok(StepOutcome::Failed)
        }
    }

    /// Per-step view for status display: completed steps show `Done`, the
    /// rest `NotStarted`. Only the current invocation ever observes
    /// `Running`/`Failed`/`Canceled`; those are not persisted.
    pub fn step_states(&self) -> Result<Vec<(StepId, &'static str, StepState)>> {
        let state = self.state.load()?;
        Ok(self
            .registry
            .steps()
            .iter()
            .map(|step| {
                let step_state = match state.last_completed_step {
                    Some(last) if step.id <= last => StepState::Done,
                    _ => StepState::NotStarted,
                };
                (step.id, step.name, step_state)
            })
            .collect())
    }

    /// Drive steps sequentially from the resume point, halting at the first
    /// outcome that is not DONE. The returned iterator yields each
    /// `(StepId, StepOutcome)` as it is produced, so callers can report
    /// partial progress. Nothing is ever rolled back on halt.
    pub fn auto_continue(&mut self, mode: RunMode) -> AutoContinue<'_> {
        AutoContinue {
            orchestrator: self,
            mode,
            halted: false,
        }
    }
}

/// Lazy sequence of step results produced by `Orchestrator::auto_continue`.
pub struct AutoContinue<'o> {
    orchestrator: &'o mut Orchestrator,
    mode: RunMode,
    halted: bool,
}

impl Iterator for AutoContinue<'_> {
    type Item = Result<(StepId, StepOutcome)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.halted {
            return None;
        }

        let id = match self.orchestrator.resume_point() {
            Ok(ResumePoint::Step(id)) => id,
            Ok(ResumePoint::AllComplete) => return None,
            Err(e) => {
                self.halted = true;
                return Some(Err(e));
            }
        };

        match self.orchestrator.run_step(id, self.mode) {
            Ok(outcome) => {
                if !outcome.is_done() {
                    self.halted = true;
                }
                Some(Ok((id, outcome)))
            }
            Err(e) => {
                self.halted = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemoryEventLog;
    use crate::step::{StepBody, StepReport};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct FixedBody {
        report: fn() -> StepReport,
        invocations: Rc<RefCell<u32>>,
    }

    impl StepBody for FixedBody {
        fn run(&self, _config: &Configuration, _runner: &mut CommandRunner<'_>) -> StepReport {
            *self.invocations.borrow_mut() += 1;
            (self.report)()
        }
    }

    struct Harness {
        dir: tempfile::TempDir,
        log: MemoryEventLog,
        counters: Vec<Rc<RefCell<u32>>>,
    }

    fn build(reports: Vec<fn() -> StepReport>) -> (Orchestrator, Harness) {
        let dir = tempfile::tempdir().unwrap();
        let log = MemoryEventLog::new();
        let mut counters = Vec::new();
        let steps = reports
            .into_iter()
            .enumerate()
            .map(|(i, report)| {
                let invocations = Rc::new(RefCell::new(0));
                counters.push(invocations.clone());
                Step {
                    id: StepId(i as u32 + 1),
                    name: "test step",
                    body: Box::new(FixedBody {
                        report,
                        invocations,
                    }),
                }
            })
            .collect();

        let orchestrator = Orchestrator::new(
            StepRegistry::new(steps),
            Configuration::default(),
            StateStore::new(dir.path().join("state.json")),
            Box::new(log.clone()),
            Box::new(AlwaysConfirm),
        );
        (
            orchestrator,
            Harness {
                dir,
                log,
                counters,
            },
        )
    }

    #[test]
    fn test_resume_point_fresh_install() {
        let (orch, _h) = build(vec![StepReport::ok, StepReport::ok]);
        assert_eq!(orch.resume_point().unwrap(), ResumePoint::Step(StepId(1)));
    }

    #[test]
    fn test_run_step_done_commits_and_advances_resume_point() {
        let (mut orch, h) = build(vec![StepReport::ok, StepReport::ok]);

        let outcome = orch.run_step(StepId(1), RunMode::Real).unwrap();
        assert_eq!(outcome, StepOutcome::Done);
        assert_eq!(orch.resume_point().unwrap(), ResumePoint::Step(StepId(2)));

        let events = h.log.snapshot();
        assert_eq!(events[0].kind, EventKind::Start);
        assert_eq!(events[1].kind, EventKind::Done);
    }

    #[test]
    fn test_failed_step_does_not_commit() {
        let (mut orch, h) = build(vec![|| StepReport::failed("boom")]);

        let outcome = orch.run_step(StepId(1), RunMode::Real).unwrap();
        assert_eq!(outcome, StepOutcome::Failed);
        assert_eq!(orch.resume_point().unwrap(), ResumePoint::Step(StepId(1)));

        let events = h.log.snapshot();
        assert_eq!(
            events[1].kind,
            EventKind::Failed {
                cause: "boom".to_string()
            }
        );
    }

    #[test]
    fn test_canceled_at_gate_skips_body_and_state() {
        struct DeclineAll;
        impl ConfirmationGate for DeclineAll {
            fn confirm_step(&mut self, _step: &Step, _mode: RunMode) -> Confirmation {
                Confirmation::Declined
            }
        }

        let (orch, h) = build(vec![StepReport::ok]);
        let mut orch = Orchestrator::new(
            orch.registry,
            orch.config,
            orch.state,
            Box::new(h.log.clone()),
            Box::new(DeclineAll),
        );

        let outcome = orch.run_step(StepId(1), RunMode::Real).unwrap();
        assert_eq!(outcome, StepOutcome::Canceled);
        assert_eq!(*h.counters[0].borrow(), 0, "body must not run");
        assert_eq!(orch.resume_point().unwrap(), ResumePoint::Step(StepId(1)));

        let events = h.log.snapshot();
        assert_eq!(events[0].kind, EventKind::Start);
        assert_eq!(events[1].kind, EventKind::Canceled);
    }

    #[test]
    fn test_rerun_of_completed_step_never_regresses() {
        let (mut orch, _h) = build(vec![StepReport::ok, StepReport::ok, StepReport::ok]);

        orch.run_step(StepId(1), RunMode::Real).unwrap();
        orch.run_step(StepId(2), RunMode::Real).unwrap();
        orch.run_step(StepId(3), RunMode::Real).unwrap();

        // re-run step 1; resume point must stay at AllComplete
        orch.run_step(StepId(1), RunMode::Real).unwrap();
        assert_eq!(orch.resume_point().unwrap(), ResumePoint::AllComplete);
    }

    #[test]
    fn test_auto_continue_halts_on_first_failure() {
        let (mut orch, h) = build(vec![
            StepReport::ok,
            || StepReport::failed("step 2 broke"),
            StepReport::ok,
        ]);

        let results: Vec<_> = orch
            .auto_continue(RunMode::Real)
            .collect::<Result<Vec<_>>>()
            .unwrap();

        assert_eq!(
            results,
            vec![
                (StepId(1), StepOutcome::Done),
                (StepId(2), StepOutcome::Failed)
            ]
        );
        assert_eq!(*h.counters[2].borrow(), 0, "step 3 must never run");
        assert_eq!(orch.resume_point().unwrap(), ResumePoint::Step(StepId(2)));
    }

    #[test]
    fn test_auto_continue_completes_all() {
        let (mut orch, _h) = build(vec![StepReport::ok, StepReport::ok, StepReport::ok]);

        let results: Vec<_> = orch
            .auto_continue(RunMode::Real)
            .collect::<Result<Vec<_>>>()
            .unwrap();

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|(_, o)| o.is_done()));
        assert_eq!(orch.resume_point().unwrap(), ResumePoint::AllComplete);

        let state = orch.state_store().load().unwrap();
        assert_eq!(state.last_completed_step, Some(StepId(3)));
    }

    #[test]
    fn test_auto_continue_on_complete_state_yields_nothing() {
        let (mut orch, _h) = build(vec![StepReport::ok]);
        orch.run_step(StepId(1), RunMode::Real).unwrap();

        assert_eq!(orch.auto_continue(RunMode::Real).count(), 0);
    }

    #[test]
    fn test_dry_run_commits_and_matches_event_shape() {
        let (mut orch, h) = build(vec![StepReport::ok]);
        let outcome = orch.run_step(StepId(1), RunMode::DryRun).unwrap();
        assert_eq!(outcome, StepOutcome::Done);
        assert_eq!(orch.resume_point().unwrap(), ResumePoint::AllComplete);

        let dry_kinds: Vec<_> = h.log.snapshot().into_iter().map(|e| e.kind).collect();

        // a fresh real run of the same step produces the same event shapes
        let (mut orch2, h2) = build(vec![StepReport::ok]);
        orch2.run_step(StepId(1), RunMode::Real).unwrap();
        let real_kinds: Vec<_> = h2.log.snapshot().into_iter().map(|e| e.kind).collect();

        assert_eq!(dry_kinds, real_kinds);
        drop(h.dir);
    }

    #[test]
    fn test_gate_consulted_once_per_step_in_both_modes() {
        struct RecordingGate {
            calls: Rc<RefCell<Vec<(StepId, RunMode)>>>,
        }
        impl ConfirmationGate for RecordingGate {
            fn confirm_step(&mut self, step: &Step, mode: RunMode) -> Confirmation {
                self.calls.borrow_mut().push((step.id, mode));
                Confirmation::Confirmed
            }
        }

        let run = |mode: RunMode| -> Vec<(StepId, RunMode)> {
            let (orch, h) = build(vec![StepReport::ok, StepReport::ok]);
            let calls = Rc::new(RefCell::new(Vec::new()));
            let mut orch = Orchestrator::new(
                orch.registry,
                orch.config,
                orch.state,
                Box::new(h.log.clone()),
                Box::new(RecordingGate {
                    calls: calls.clone(),
                }),
            );
            orch.auto_continue(mode)
                .collect::<Result<Vec<_>>>()
                .unwrap();
            let recorded = calls.borrow().clone();
            recorded
        };

        // the gate sees exactly one consultation per step, in order, with
        // the active mode; dry-run and real traces are shape-identical
        assert_eq!(
            run(RunMode::DryRun),
            vec![
                (StepId(1), RunMode::DryRun),
                (StepId(2), RunMode::DryRun),
            ]
        );
        assert_eq!(
            run(RunMode::Real),
            vec![(StepId(1), RunMode::Real), (StepId(2), RunMode::Real)]
        );
    }

    #[test]
    fn test_step_states_reflect_progress() {
        let (mut orch, _h) = build(vec![StepReport::ok, StepReport::ok]);
        orch.run_step(StepId(1), RunMode::Real).unwrap();

        let states = orch.step_states().unwrap();
        assert_eq!(states[0].2, StepState::Done);
        assert_eq!(states[1].2, StepState::NotStarted);
    }

    #[test]
    fn test_unknown_step_is_an_error() {
        let (mut orch, _h) = build(vec![StepReport::ok]);
        let err = orch.run_step(StepId(42), RunMode::Real).unwrap_err();
        assert!(matches!(err, HostPrepError::UnknownStep(_)));
    }
}
