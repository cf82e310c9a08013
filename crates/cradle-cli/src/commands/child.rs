//! `cradle child` — internal re-exec entry for the init supervisor.
//!
//! Invoked by the launch orchestrator via `/proc/self/exe child …` inside
//! the freshly created namespaces; not intended for direct use. Rebuilds
//! the launch request from its arguments and the inherited environment,
//! then runs the in-namespace init.

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::Args;
use cradle_common::constants::ROOTFS_ENV;
use cradle_common::types::LaunchRequest;

/// Arguments for the hidden `child` entry.
#[derive(Args, Debug)]
pub struct ChildArgs {
    /// Command to execute inside the container.
    pub command: PathBuf,

    /// Arguments passed to the command.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Runs the init supervisor and returns the exit code to propagate.
///
/// # Errors
///
/// Returns an error if the rootfs environment variable is missing or if
/// container setup fails.
pub fn execute(args: &ChildArgs) -> anyhow::Result<i32> {
    let rootfs = std::env::var_os(ROOTFS_ENV)
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("{ROOTFS_ENV} is not set"))?;

    let request = LaunchRequest::new(
        args.command.clone(),
        args.args.clone(),
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
        rootfs,
        std::io::stdin().is_terminal(),
    );

    Ok(cradle_core::init::run(&request)?)
}
