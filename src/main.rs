//! hostprep - main entry point
//!
//! Thin interaction layer over the orchestration core: CLI dispatch, the
//! stdin confirmation gate, and the interactive menu session driving the
//! pure FSM in `menu.rs`.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::{debug, info};

use hostprep::cli::{Cli, Commands, ConfigCommands};
use hostprep::menu::{self, MenuEffect, MenuInput, MenuState};
use hostprep::orchestrator::{
    AlwaysConfirm, Confirmation, ConfirmationGate, Orchestrator, ResumePoint,
};
use hostprep::step::{RunMode, Step, StepId, StepOutcome, StepState};
use hostprep::validate::{CheckContext, ValidationEngine, ValidationReport};
use hostprep::{ConfigStore, Configuration, FileEventLog, StateStore};

const DEFAULT_STATE_DIR: &str = "/var/lib/hostprep";

/// Initialize the logger with appropriate settings
fn init_logger() {
    use env_logger::Builder;

    Builder::from_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}:{}] {}",
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env() // RUST_LOG overrides
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logger();
    info!("hostprep starting up");

    let cli = Cli::parse_args();
    let state_dir = resolve_state_dir(&cli.state_dir);
    let mode = if cli.dry_run {
        RunMode::DryRun
    } else {
        RunMode::Real
    };
    debug!("state dir: {}, mode: {}", state_dir.display(), mode);

    match cli.command {
        Some(Commands::Run { step, yes }) => {
            let mut orch = build_orchestrator(&state_dir, yes)?;
            let outcome = orch.run_step(step, mode)?;
            report_outcome(&orch, step, outcome, &state_dir);
            if outcome == StepOutcome::Failed {
                std::process::exit(1);
            }
        }
        Some(Commands::Continue { yes }) => {
            let mut orch = build_orchestrator(&state_dir, yes)?;
            let halted_on_failure = run_auto_continue(&mut orch, mode, &state_dir)?;
            if halted_on_failure {
                std::process::exit(1);
            }
        }
        Some(Commands::Status) => {
            let orch = build_orchestrator(&state_dir, true)?;
            print_status(&orch)?;
        }
        Some(Commands::Validate) => {
            let report = run_validation(&state_dir)?;
            if report.summary.blocking {
                std::process::exit(1);
            }
        }
        Some(Commands::Config { action }) => {
            run_config_command(&state_dir, action)?;
        }
        None => {
            interactive_session(&state_dir, mode)?;
        }
    }

    Ok(())
}

fn resolve_state_dir(flag: &Option<PathBuf>) -> PathBuf {
    if let Some(dir) = flag {
        return dir.clone();
    }
    if let Ok(dir) = std::env::var("HOSTPREP_STATE_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    PathBuf::from(DEFAULT_STATE_DIR)
}

fn event_log_path(state_dir: &Path) -> PathBuf {
    state_dir.join("events.log")
}

/// Assemble the orchestrator for one session: configuration snapshot loaded
/// once, file-backed state store, append-only event log, and either the
/// stdin gate or an auto-confirming one for `--yes`.
fn build_orchestrator(state_dir: &Path, assume_yes: bool) -> anyhow::Result<Orchestrator> {
    let config = ConfigStore::new(state_dir.join("config.json"))
        .load()
        .context("loading configuration")?;
    let state = StateStore::new(state_dir.join("state.json"));
    let sink = Box::new(FileEventLog::new(event_log_path(state_dir)));
    let gate: Box<dyn ConfirmationGate> = if assume_yes {
        Box::new(AlwaysConfirm)
    } else {
        Box::new(StdinGate)
    };
    Ok(Orchestrator::new(
        hostprep::steps::registry(),
        config,
        state,
        sink,
        gate,
    ))
}

/// Confirmation gate that prompts on stdout and reads one line from stdin.
/// Blocks indefinitely; these are human-operated provisioning flows.
struct StdinGate;

impl ConfirmationGate for StdinGate {
    fn confirm_step(&mut self, step: &Step, mode: RunMode) -> Confirmation {
        let mode_note = match mode {
            RunMode::Real => "",
            RunMode::DryRun => " (dry-run)",
        };
        print!(
            "About to run step {} {}{}. Proceed? [y/N/c] ",
            step.id, step.name, mode_note
        );
        let _ = std::io::stdout().flush();

        match read_line().as_deref() {
            Some("y") | Some("yes") => Confirmation::Confirmed,
            Some("c") | Some("cancel") => Confirmation::Canceled,
            _ => Confirmation::Declined,
        }
    }
}

/// Read one trimmed, lowercased line from stdin. None on EOF.
fn read_line() -> Option<String> {
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(0) => None,
        Ok(_) => Some(line.trim().to_lowercase()),
        Err(_) => None,
    }
}

fn report_outcome(orch: &Orchestrator, id: StepId, outcome: StepOutcome, state_dir: &Path) {
    let name = orch.registry().get(id).map(|s| s.name).unwrap_or("?");
    match outcome {
        StepOutcome::Done => println!("step {} {}: DONE", id, name),
        StepOutcome::Canceled => println!("step {} {}: CANCELED (no changes made)", id, name),
        StepOutcome::Failed => println!(
            "step {} {}: FAILED - see {} for details",
            id,
            name,
            event_log_path(state_dir).display()
        ),
    }
}

/// Drive auto-continue, reporting each step as it is produced. Returns
/// true if the pass halted on a failure.
fn run_auto_continue(
    orch: &mut Orchestrator,
    mode: RunMode,
    state_dir: &Path,
) -> anyhow::Result<bool> {
    let names: std::collections::BTreeMap<StepId, &'static str> = orch
        .registry()
        .steps()
        .iter()
        .map(|s| (s.id, s.name))
        .collect();

    let mut last_outcome = None;
    for item in orch.auto_continue(mode) {
        let (id, outcome) = item?;
        let name = names.get(&id).copied().unwrap_or("?");
        match outcome {
            StepOutcome::Done => println!("step {} {}: DONE", id, name),
            StepOutcome::Canceled => println!("step {} {}: CANCELED (no changes made)", id, name),
            StepOutcome::Failed => println!(
                "step {} {}: FAILED - see {} for details",
                id,
                name,
                event_log_path(state_dir).display()
            ),
        }
        last_outcome = Some(outcome);
    }

    match last_outcome {
        None => {
            println!("all steps complete; nothing to do");
            Ok(false)
        }
        Some(outcome) => Ok(outcome == StepOutcome::Failed),
    }
}

fn print_status(orch: &Orchestrator) -> anyhow::Result<()> {
    let state = orch.state_store().load()?;
    match orch.resume_point()? {
        ResumePoint::Step(id) => println!("resume point: step {}", id),
        ResumePoint::AllComplete => println!("resume point: all steps complete"),
    }
    if let Some(ts) = state.last_run_time {
        println!("last run: {} (unix)", ts);
    }
    for (id, name, step_state) in orch.step_states()? {
        let marker = match step_state {
            StepState::Done => "done",
            _ => "pending",
        };
        println!("  {} {:<20} [{}]", id, name, marker);
    }
    Ok(())
}

/// Run all checks against a read-only configuration snapshot and print the
/// report. Validation never touches the stores themselves.
fn run_validation(state_dir: &Path) -> anyhow::Result<ValidationReport> {
    let config = ConfigStore::new(state_dir.join("config.json"))
        .load()
        .context("loading configuration")?;
    let report = ValidationEngine::with_builtin_checks().run_all(&CheckContext {
        config,
        state_dir: state_dir.to_path_buf(),
    });

    for result in &report.results {
        println!(
            "{:<4} {:<10} {}",
            result.severity.to_string(),
            result.check_id,
            result.message
        );
    }
    let s = &report.summary;
    println!(
        "summary: {} ok, {} warn, {} fail{}",
        s.ok,
        s.warn,
        s.fail,
        if s.blocking {
            " - BLOCKING, fix failures before deploying"
        } else {
            ""
        }
    );
    Ok(report)
}

fn run_config_command(state_dir: &Path, action: ConfigCommands) -> anyhow::Result<()> {
    let store = ConfigStore::new(state_dir.join("config.json"));
    match action {
        ConfigCommands::Get { key } => {
            let config = store.load()?;
            match config.get(&key) {
                Some(value) => println!("{}", value),
                None if Configuration::is_known_key(&key) => {
                    eprintln!("{} is not set", key);
                    std::process::exit(1);
                }
                None => {
                    eprintln!("unknown key: {}", key);
                    std::process::exit(1);
                }
            }
        }
        ConfigCommands::Set { key, value, yes } => {
            if !yes {
                print!("Set {} = {:?}? [y/N] ", key, value);
                let _ = std::io::stdout().flush();
                if read_line().as_deref() != Some("y") {
                    println!("not changed");
                    return Ok(());
                }
            }
            store.set(&key, &value)?;
            println!("{} = {}", key, value);
        }
    }
    Ok(())
}

/// Interactive session: render the current FSM state, translate input,
/// apply the transition, perform the effect.
fn interactive_session(state_dir: &Path, mode: RunMode) -> anyhow::Result<()> {
    let mut orch = build_orchestrator(state_dir, false)?;
    let mut state = MenuState::Menu;

    loop {
        let input = match state {
            MenuState::Menu => {
                render_menu(&orch)?;
                match read_line().as_deref() {
                    Some("1") => MenuInput::ChooseStepSelect,
                    Some("2") => MenuInput::ChooseContinue,
                    Some("3") => MenuInput::ChooseValidate,
                    Some("4") | Some("q") => MenuInput::ChooseExit,
                    Some("") | None => MenuInput::Cancel,
                    Some(_) => continue,
                }
            }
            MenuState::StepSelect => {
                render_step_list(&orch)?;
                match read_line() {
                    None => MenuInput::Cancel,
                    Some(line) if line.is_empty() => MenuInput::Cancel,
                    Some(line) => match line.parse::<StepId>() {
                        Ok(id) if orch.registry().get(id).is_some() => MenuInput::PickStep(id),
                        _ => {
                            println!("no such step: {}", line);
                            continue;
                        }
                    },
                }
            }
            MenuState::ConfirmExit => {
                print!("Exit hostprep? [y/N] ");
                let _ = std::io::stdout().flush();
                match read_line().as_deref() {
                    Some("y") | Some("yes") => MenuInput::ConfirmYes,
                    None => MenuInput::ConfirmYes,
                    _ => MenuInput::ConfirmNo,
                }
            }
            // Running/Validating resolve synchronously via their effect, so
            // reaching here means the work already finished.
            MenuState::Running(_) | MenuState::Validating => MenuInput::WorkFinished,
        };

        let (next, effect) = menu::transition(state, input);
        state = next;

        match effect {
            Some(MenuEffect::RunStep(id)) => {
                let outcome = orch.run_step(id, mode)?;
                report_outcome(&orch, id, outcome, state_dir);
            }
            Some(MenuEffect::AutoContinue) => {
                run_auto_continue(&mut orch, mode, state_dir)?;
            }
            Some(MenuEffect::RunValidation) => {
                run_validation(state_dir)?;
            }
            Some(MenuEffect::ExitSession) => {
                info!("session ended by user");
                return Ok(());
            }
            None => {}
        }
    }
}

fn render_menu(orch: &Orchestrator) -> anyhow::Result<()> {
    println!();
    println!("hostprep - host provisioning");
    match orch.resume_point()? {
        ResumePoint::Step(id) => println!("next step: {}", id),
        ResumePoint::AllComplete => println!("all steps complete"),
    }
    println!("  1) run a single step");
    println!("  2) continue from resume point");
    println!("  3) validate environment");
    println!("  4) exit");
    print!("> ");
    let _ = std::io::stdout().flush();
    Ok(())
}

fn render_step_list(orch: &Orchestrator) -> anyhow::Result<()> {
    println!();
    for (id, name, step_state) in orch.step_states()? {
        let marker = match step_state {
            StepState::Done => "done",
            _ => "pending",
        };
        println!("  {} {:<20} [{}]", id, name, marker);
    }
    print!("step to run (empty to go back)> ");
    let _ = std::io::stdout().flush();
    Ok(())
}
