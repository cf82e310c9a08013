//! Unified error types for the cradle workspace.
//!
//! Setup faults carry the failing operation and the underlying `Errno` so
//! the diagnostic printed before a fatal exit names the exact syscall that
//! refused. Resolution faults are kept distinct because they map to their
//! own exit status.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum CradleError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// The requested command could not be resolved to an executable.
    #[error("command not found: {command}")]
    CommandNotFound {
        /// Command as given in the launch request.
        command: PathBuf,
    },

    /// A namespace or filesystem setup operation failed.
    ///
    /// Always fatal: these are idempotent infrastructure operations whose
    /// failure indicates a misconfigured host or insufficient privilege.
    #[error("setup failed: {op}: {source}")]
    Setup {
        /// Operation that failed (e.g. `pivot_root`, `mount /proc`).
        op: String,
        /// Errno returned by the kernel.
        source: nix::errno::Errno,
    },
}

impl CradleError {
    /// Builds a setup fault for the named operation.
    pub fn setup(op: impl Into<String>, source: nix::errno::Errno) -> Self {
        Self::Setup {
            op: op.into(),
            source,
        }
    }

    /// Exit status this error maps to at the process boundary.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::CommandNotFound { .. } => crate::constants::EXIT_COMMAND_NOT_FOUND,
            _ => crate::constants::EXIT_SETUP_FAILURE,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, CradleError>;
