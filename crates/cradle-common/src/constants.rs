//! System-wide constants shared by the launcher and the init supervisor.

/// Environment variable naming the rootfs directory for a launch.
///
/// Required: a launch is refused when it is absent or does not resolve to
/// an existing directory.
pub const ROOTFS_ENV: &str = "CRADLE_ROOTFS";

/// Hostname assigned inside the new UTS namespace.
pub const CONTAINER_HOSTNAME: &str = "container";

/// Directory created inside the rootfs to receive the old root during
/// `pivot_root(2)`. Detached and removed before the command runs.
pub const OLD_ROOT_DIR: &str = "oldroot";

/// Exit status when the requested command cannot be resolved.
pub const EXIT_COMMAND_NOT_FOUND: i32 = 1;

/// Exit status for fatal namespace or mount setup faults.
pub const EXIT_SETUP_FAILURE: i32 = 125;

/// Base added to a signal number when the primary child dies by signal,
/// following the shell convention (`128 + signo`).
pub const SIGNAL_EXIT_BASE: i32 = 128;

/// Lookup paths used to resolve a non-absolute command when the container
/// environment carries no `PATH` of its own.
pub const DEFAULT_LOOKUP_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Application name used in CLI output.
pub const APP_NAME: &str = "cradle";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "cradle";
