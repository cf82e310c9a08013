//! Mount operations for container filesystem setup.
//!
//! Covers mount propagation, the rootfs self-bind required by
//! `pivot_root(2)`, and the pseudo-filesystems (`/proc`, `/sys`, `/dev`)
//! mounted inside the new root.

use std::fs;
use std::path::Path;

use cradle_common::constants::OLD_ROOT_DIR;
use cradle_common::error::{CradleError, Result};
use nix::errno::Errno;
use nix::mount::{MsFlags, mount};

const NONE: Option<&str> = None;

/// Makes the entire mount tree private and recursive.
///
/// Must run before any re-rooting so that container mount changes never
/// propagate to the host and vice versa.
///
/// # Errors
///
/// Returns a setup fault if the remount fails.
pub fn make_mount_tree_private() -> Result<()> {
    mount(NONE, "/", NONE, MsFlags::MS_REC | MsFlags::MS_PRIVATE, NONE)
        .map_err(|source| CradleError::setup("mount / MS_REC|MS_PRIVATE", source))
}

/// Bind-mounts the rootfs onto itself, recursively.
///
/// `pivot_root(2)` requires both of its arguments to be mount points, not
/// plain directories; the self-bind turns the rootfs path into one.
///
/// # Errors
///
/// Returns a setup fault if the bind mount fails.
pub fn bind_rootfs(rootfs: &Path) -> Result<()> {
    mount(
        Some(rootfs),
        rootfs,
        NONE,
        MsFlags::MS_BIND | MsFlags::MS_REC,
        NONE,
    )
    .map_err(|source| CradleError::setup(format!("bind mount {}", rootfs.display()), source))
}

/// Mounts the pseudo-filesystems inside the new root.
///
/// `/proc` so the command can observe its own processes, `/sys` read-only,
/// and a restricted tmpfs at `/dev` (no-setuid, no-exec, mode 0755) ready
/// for device population. Mount-point directories are created if the
/// rootfs lacks them.
///
/// When the launch runs rootless, a fresh sysfs mount is refused by the
/// kernel unless the caller also owns a network namespace; in that case
/// the host's `/sys` is recursively bind-mounted through the preserved
/// old root instead.
///
/// # Errors
///
/// Returns a setup fault if any mount fails.
pub fn mount_pseudo_filesystems() -> Result<()> {
    ensure_dir(Path::new("/proc"))?;
    mount(
        Some("proc"),
        "/proc",
        Some("proc"),
        MsFlags::MS_NOSUID | MsFlags::MS_NODEV | MsFlags::MS_NOEXEC,
        NONE,
    )
    .map_err(|source| CradleError::setup("mount /proc", source))?;

    ensure_dir(Path::new("/sys"))?;
    let sysfs = mount(
        Some("sysfs"),
        "/sys",
        Some("sysfs"),
        MsFlags::MS_RDONLY | MsFlags::MS_NOSUID | MsFlags::MS_NODEV | MsFlags::MS_NOEXEC,
        NONE,
    );
    match sysfs {
        Ok(()) => {}
        Err(Errno::EPERM) => {
            tracing::debug!("fresh sysfs refused, bind-mounting host /sys");
            bind_host_sys()?;
        }
        Err(source) => return Err(CradleError::setup("mount /sys", source)),
    }

    ensure_dir(Path::new("/dev"))?;
    mount(
        Some("tmpfs"),
        "/dev",
        Some("tmpfs"),
        MsFlags::MS_NOSUID | MsFlags::MS_NOEXEC,
        Some("mode=0755"),
    )
    .map_err(|source| CradleError::setup("mount /dev", source))?;

    Ok(())
}

fn bind_host_sys() -> Result<()> {
    let host_sys = Path::new("/").join(OLD_ROOT_DIR).join("sys");
    mount(
        Some(&host_sys),
        "/sys",
        NONE,
        MsFlags::MS_BIND | MsFlags::MS_REC,
        NONE,
    )
    .map_err(|source| CradleError::setup("bind mount /sys", source))?;
    // The kernel ignores MS_RDONLY in the bind call itself; read-only
    // takes a second remount. The nosuid/nodev/noexec flags must match
    // the host's sysfs mount, which a user namespace locks in place.
    mount(
        NONE,
        "/sys",
        NONE,
        MsFlags::MS_REMOUNT
            | MsFlags::MS_BIND
            | MsFlags::MS_RDONLY
            | MsFlags::MS_NOSUID
            | MsFlags::MS_NODEV
            | MsFlags::MS_NOEXEC,
        NONE,
    )
    .map_err(|source| CradleError::setup("remount /sys read-only", source))
}

pub(crate) fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|source| CradleError::Io {
        path: path.to_path_buf(),
        source,
    })
}
