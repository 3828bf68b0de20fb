//! CLI command definitions and dispatch.

pub mod caps;
pub mod run;

use clap::{ArgAction, Parser, Subcommand};

/// Drop root privileges down to a capability whitelist, then exec.
#[derive(Parser, Debug)]
#[command(name = lockdown_common::constants::BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Raise log verbosity (`-v` info, `-vv` debug). `RUST_LOG` wins.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Lock the process down and run a command.
    Run(run::RunArgs),
    /// List the capabilities the running kernel supports.
    Caps(caps::CapsArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Run(args) => run::execute(args),
        Command::Caps(args) => caps::execute(&args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn verbose_is_counted_after_subcommand() {
        let cli = Cli::try_parse_from(["lockdown", "caps", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }
}
