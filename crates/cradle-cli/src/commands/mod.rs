//! CLI command definitions and dispatch.

pub mod child;
pub mod run;

use clap::{Parser, Subcommand};

/// cradle — minimal container-launch supervisor.
#[derive(Parser, Debug)]
#[command(name = "cradle", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Launch a command inside an isolated container rootfs.
    Run(run::RunArgs),
    /// Internal re-exec entry: run as the in-namespace init supervisor.
    #[command(hide = true)]
    Child(child::ChildArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// Returns the exit code the process should terminate with — for a
/// completed launch that is the supervised command's own translated
/// status.
///
/// # Errors
///
/// Returns an error if the command execution fails before a status is
/// available.
pub fn execute(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Command::Run(args) => run::execute(args),
        Command::Child(args) => child::execute(&args),
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
    fn run_parses_command_and_trailing_args() {
        let cli = Cli::try_parse_from([
            "cradle", "run", "--rootfs", "/tmp/r", "/bin/sh", "-c", "exit 3",
        ])
        .expect("should parse");
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.command.to_str(), Some("/bin/sh"));
                assert_eq!(args.args, vec!["-c", "exit 3"]);
                assert_eq!(args.rootfs.to_str(), Some("/tmp/r"));
            }
            Command::Child(_) => panic!("parsed wrong subcommand"),
        }
    }

    #[test]
    fn child_entry_is_parseable() {
        let cli = Cli::try_parse_from(["cradle", "child", "/bin/true"]).expect("should parse");
        assert!(matches!(cli.command, Command::Child(_)));
    }
}
