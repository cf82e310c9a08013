//! Filesystem setup for container isolation.
//!
//! [`setup_rootfs`] runs the ordered mount plan that turns a plain
//! directory tree into the container's root. Each step's success is a
//! precondition for the next; any failure aborts the launch — there is no
//! partial-success state that is safe to continue from, and no rollback
//! is attempted (the namespace and its mounts vanish with the process).

pub mod devices;
pub mod mount;
pub mod pivot_root;

use std::path::Path;

use cradle_common::constants::CONTAINER_HOSTNAME;
use cradle_common::error::Result;

use crate::namespace::uts;

/// Executes the full mount plan against `rootfs`.
///
/// Order is load-bearing: propagation must be cut before any re-rooting,
/// the rootfs must be a mount point before `pivot_root(2)`, the
/// pseudo-filesystems must land inside the new root rather than the
/// vanishing old one, and the console bind needs the old root still
/// mounted. `console` is the host-side pseudo-terminal slave path when the
/// launch is interactive.
///
/// # Errors
///
/// Returns a setup fault on the first failing step.
pub fn setup_rootfs(rootfs: &Path, console: Option<&Path>) -> Result<()> {
    tracing::info!(rootfs = %rootfs.display(), "executing mount plan");

    mount::make_mount_tree_private()?;
    mount::bind_rootfs(rootfs)?;
    pivot_root::pivot(rootfs)?;
    mount::mount_pseudo_filesystems()?;
    devices::populate_dev()?;
    if let Some(host_pts) = console {
        devices::bind_console(host_pts);
    }
    pivot_root::detach_old_root()?;
    uts::set_hostname(CONTAINER_HOSTNAME)?;

    tracing::debug!("mount plan complete");
    Ok(())
}
