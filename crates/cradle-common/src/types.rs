//! Domain primitive types shared by the launcher and the init supervisor.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Everything needed to perform one container launch.
///
/// Immutable once constructed; owned by the launch orchestrator for the
/// lifetime of a single launch. The caller's full environment is passed
/// through to the executed command ambiently and is not captured here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchRequest {
    /// Command to execute inside the container.
    pub command: PathBuf,
    /// Arguments for the command (not including the command itself).
    pub args: Vec<String>,
    /// Working directory of the invoking process.
    pub cwd: PathBuf,
    /// Root filesystem for the container; must be an existing directory.
    pub rootfs: PathBuf,
    /// Whether to attach an interactive terminal to the command.
    pub interactive: bool,
}

impl LaunchRequest {
    /// Builds a launch request for the given command and rootfs.
    #[must_use]
    pub fn new(
        command: impl Into<PathBuf>,
        args: Vec<String>,
        cwd: impl Into<PathBuf>,
        rootfs: impl Into<PathBuf>,
        interactive: bool,
    ) -> Self {
        Self {
            command: command.into(),
            args,
            cwd: cwd.into(),
            rootfs: rootfs.into(),
            interactive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_holds_command_and_rootfs() {
        let req = LaunchRequest::new(
            "/bin/true",
            vec![],
            "/",
            "/tmp/rootfs",
            false,
        );
        assert_eq!(req.command, PathBuf::from("/bin/true"));
        assert_eq!(req.rootfs, PathBuf::from("/tmp/rootfs"));
        assert!(!req.interactive);
    }

    #[test]
    fn request_preserves_argument_order() {
        let req = LaunchRequest::new(
            "/bin/echo",
            vec!["a".into(), "b".into(), "c".into()],
            "/",
            "/tmp/rootfs",
            true,
        );
        assert_eq!(req.args, vec!["a", "b", "c"]);
    }
}
