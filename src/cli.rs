use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::step::StepId;

/// hostprep - resumable host provisioning orchestrator
#[derive(Parser)]
#[command(name = "hostprep")]
#[command(about = "Drives an ordered, resumable sequence of provisioning steps against a host")]
#[command(version)]
pub struct Cli {
    /// Dry-run mode: walk the full control path (confirmations, events,
    /// progress commits) but print commands instead of executing them.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Directory holding state, configuration, and the event log
    /// (default: $HOSTPREP_STATE_DIR or /var/lib/hostprep)
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a single step by ID
    Run {
        /// Step ID (e.g. 01)
        step: StepId,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Continue from the resume point, halting on the first non-DONE step
    Continue {
        /// Skip the confirmation prompts
        #[arg(short, long)]
        yes: bool,
    },
    /// Show the resume point and per-step progress
    Status,
    /// Run all validation checks; exits non-zero if any check fails
    Validate,
    /// Read or change configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print one configuration value
    Get {
        /// Configuration key
        key: String,
    },
    /// Change one configuration value (asks for confirmation)
    Set {
        /// Configuration key
        key: String,
        /// New value
        value: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_parses_step_id() {
        let cli = Cli::parse_from(["hostprep", "run", "02", "--yes"]);
        match cli.command {
            Some(Commands::Run { step, yes }) => {
                assert_eq!(step, StepId(2));
                assert!(yes);
            }
            _ => panic!("expected Run"),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["hostprep", "--dry-run", "--state-dir", "/tmp/hp", "continue"]);
        assert!(cli.dry_run);
        assert_eq!(cli.state_dir.unwrap(), PathBuf::from("/tmp/hp"));
    }

    #[test]
    fn test_no_subcommand_is_interactive() {
        let cli = Cli::parse_from(["hostprep"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_config_set() {
        let cli = Cli::parse_from(["hostprep", "config", "set", "target_host", "hv01", "--yes"]);
        match cli.command {
            Some(Commands::Config {
                action: ConfigCommands::Set { key, value, yes },
            }) => {
                assert_eq!(key, "target_host");
                assert_eq!(value, "hv01");
                assert!(yes);
            }
            _ => panic!("expected Config Set"),
        }
    }
}
