//! `cradle run` — launch a command inside an isolated rootfs.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use cradle_common::constants::ROOTFS_ENV;
use cradle_common::types::LaunchRequest;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Command to execute inside the container.
    pub command: PathBuf,

    /// Arguments passed to the command.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Root filesystem directory for the container.
    #[arg(long, env = ROOTFS_ENV)]
    pub rootfs: PathBuf,
}

/// Executes the `run` command: builds the launch request and hands it to
/// the launch orchestrator.
///
/// # Errors
///
/// Returns an error if the rootfs does not resolve to an existing
/// directory or if the launch cannot be set up.
pub fn execute(args: RunArgs) -> anyhow::Result<i32> {
    let rootfs = args
        .rootfs
        .canonicalize()
        .with_context(|| format!("rootfs does not exist: {}", args.rootfs.display()))?;
    if !rootfs.is_dir() {
        anyhow::bail!("rootfs is not a directory: {}", rootfs.display());
    }

    tracing::debug!(rootfs = %rootfs.display(), "rootfs resolved");

    // The child entry re-reads the rootfs from the environment after the
    // namespace re-exec, so a --rootfs flag must land there too.
    // SAFETY: no other threads exist yet; the launch spawns its helper
    // threads only after this point.
    #[allow(unsafe_code)]
    unsafe {
        std::env::set_var(ROOTFS_ENV, &rootfs);
    }

    let request = LaunchRequest::new(
        args.command,
        args.args,
        std::env::current_dir().context("cannot determine working directory")?,
        rootfs,
        cradle_core::pty::stdin_is_terminal(),
    );

    Ok(cradle_core::launcher::launch(&request)?)
}
