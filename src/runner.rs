//! Command execution for step bodies.
//!
//! This is the only sanctioned way for a step body to run host commands.
//! Every invocation emits a `Run` event, then exactly one of `RunOk` or
//! `RunFail`, interleaved with the step lifecycle events in true execution
//! order. In dry-run mode the command is not spawned; the same event pair
//! is emitted so the log and UI trace are shape-identical to a real run.

use std::process::{Command, Stdio};

use crate::error::Result;
use crate::events::{EventKind, EventSink, ExecutionEvent};
use crate::step::{RunMode, StepId};

/// Output of one command invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    /// Exit code (None if terminated by signal or simulated).
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    fn simulated() -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Short cause summary for a failed command.
    pub fn cause(&self, context: &str) -> String {
        let code = self.exit_code.unwrap_or(-1);
        let detail = self.stderr.trim();
        if detail.is_empty() {
            format!("{} failed (exit code {})", context, code)
        } else {
            format!("{} failed (exit code {}): {}", context, code, detail)
        }
    }
}

/// Executes commands on behalf of one step invocation.
pub struct CommandRunner<'a> {
    step: StepId,
    mode: RunMode,
    sink: &'a mut dyn EventSink,
}

impl<'a> CommandRunner<'a> {
    pub fn new(step: StepId, mode: RunMode, sink: &'a mut dyn EventSink) -> Self {
        Self { step, mode, sink }
    }

    #[inline]
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Run `program` with `args`, capturing output.
    ///
    /// A non-zero exit is NOT an `Err`: it comes back as `success == false`
    /// so the body can decide how to report it. `Err` is reserved for event
    /// sink failures, which must halt the run.
    pub fn run(&mut self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let display = render_command(program, args);
        self.sink.emit(&ExecutionEvent::new(
            Some(self.step),
            EventKind::Run {
                command: display.clone(),
            },
        ))?;

        if self.mode.is_dry_run() {
            log::info!("dry-run: would execute: {}", display);
            self.sink.emit(&ExecutionEvent::new(
                Some(self.step),
                EventKind::RunOk { command: display },
            ))?;
            return Ok(CommandOutput::simulated());
        }

        log::info!("executing: {}", display);
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();

        let result = match output {
            Ok(output) => CommandOutput {
                success: output.status.success(),
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            },
            Err(e) => CommandOutput {
                success: false,
                exit_code: None,
                stdout: String::new(),
                stderr: format!("failed to spawn {}: {}", program, e),
            },
        };

        if result.success {
            self.sink.emit(&ExecutionEvent::new(
                Some(self.step),
                EventKind::RunOk { command: display },
            ))?;
        } else {
            let rc = result.exit_code.unwrap_or(-1);
            log::warn!("command failed (rc {}): {}", rc, display);
            self.sink.emit(&ExecutionEvent::new(
                Some(self.step),
                EventKind::RunFail {
                    command: display,
                    rc,
                },
            ))?;
        }

        Ok(result)
    }
}

fn render_command(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemoryEventLog;

    #[test]
    fn test_dry_run_emits_run_ok_without_spawning() {
        let log = MemoryEventLog::new();
        let mut sink = log.clone();
        let mut runner = CommandRunner::new(StepId(1), RunMode::DryRun, &mut sink);

        // program does not exist; dry-run must still report simulated success
        let out = runner
            .run("definitely_not_a_real_binary_xyz", &["--flag"])
            .unwrap();
        assert!(out.success);

        let events = log.snapshot();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].kind, EventKind::Run { .. }));
        assert!(matches!(events[1].kind, EventKind::RunOk { .. }));
    }

    #[test]
    fn test_real_run_success() {
        let log = MemoryEventLog::new();
        let mut sink = log.clone();
        let mut runner = CommandRunner::new(StepId(1), RunMode::Real, &mut sink);

        let out = runner.run("true", &[]).unwrap();
        assert!(out.success);
        assert_eq!(out.exit_code, Some(0));

        let events = log.snapshot();
        assert!(matches!(events[1].kind, EventKind::RunOk { .. }));
    }

    #[test]
    fn test_real_run_failure_emits_run_fail_with_rc() {
        let log = MemoryEventLog::new();
        let mut sink = log.clone();
        let mut runner = CommandRunner::new(StepId(2), RunMode::Real, &mut sink);

        let out = runner.run("false", &[]).unwrap();
        assert!(!out.success);

        let events = log.snapshot();
        match &events[1].kind {
            EventKind::RunFail { rc, .. } => assert_eq!(*rc, 1),
            other => panic!("expected RunFail, got {:?}", other),
        }
    }

    #[test]
    fn test_spawn_failure_is_a_command_failure_not_err() {
        let log = MemoryEventLog::new();
        let mut sink = log.clone();
        let mut runner = CommandRunner::new(StepId(3), RunMode::Real, &mut sink);

        let out = runner
            .run("definitely_not_a_real_binary_xyz", &[])
            .unwrap();
        assert!(!out.success);
        assert!(out.stderr.contains("failed to spawn"));

        let events = log.snapshot();
        assert!(matches!(events[1].kind, EventKind::RunFail { rc: -1, .. }));
    }

    #[test]
    fn test_cause_summary() {
        let out = CommandOutput {
            success: false,
            exit_code: Some(2),
            stdout: String::new(),
            stderr: "no such interface\n".to_string(),
        };
        assert_eq!(
            out.cause("configure-network"),
            "configure-network failed (exit code 2): no such interface"
        );
    }
}
