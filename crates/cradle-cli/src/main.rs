//! # cradle — container-launch supervisor CLI
//!
//! Launches a command inside fresh PID/mount/UTS/IPC (and, rootless,
//! user) namespaces rooted at a plain directory tree, supervises it as
//! the namespace's init, and exits with the command's own status.

mod commands;

use clap::Parser;

use crate::commands::Cli;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match commands::execute(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}: {err:#}", cradle_common::constants::APP_NAME);
            err.downcast_ref::<cradle_common::error::CradleError>()
                .map_or(cradle_common::constants::EXIT_SETUP_FAILURE, |e| {
                    e.exit_code()
                })
        }
    };
    std::process::exit(code);
}
