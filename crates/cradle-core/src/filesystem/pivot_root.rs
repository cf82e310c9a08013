//! Root filesystem switching via `pivot_root(2)`.
//!
//! More secure than `chroot` because it actually swaps the root mount
//! rather than just the process's view of `/`. The old root stays
//! reachable at `/oldroot` until the device plan no longer needs it, then
//! is lazily detached.

use std::fs;
use std::path::{Path, PathBuf};

use cradle_common::constants::OLD_ROOT_DIR;
use cradle_common::error::{CradleError, Result};
use nix::mount::{MntFlags, umount2};

/// Pivots the process root onto the (already self-bound) rootfs.
///
/// Creates the `oldroot` directory inside the rootfs, swaps roots so the
/// previous root appears there, and chdirs to the new `/`.
///
/// # Errors
///
/// Returns a setup fault if directory creation, `pivot_root(2)`, or the
/// final `chdir` fails.
pub fn pivot(rootfs: &Path) -> Result<()> {
    let old_root = rootfs.join(OLD_ROOT_DIR);
    fs::create_dir_all(&old_root).map_err(|source| CradleError::Io {
        path: old_root.clone(),
        source,
    })?;

    nix::unistd::pivot_root(rootfs, &old_root)
        .map_err(|source| CradleError::setup(format!("pivot_root {}", rootfs.display()), source))?;
    nix::unistd::chdir("/").map_err(|source| CradleError::setup("chdir /", source))?;

    tracing::debug!(rootfs = %rootfs.display(), "pivoted into rootfs");
    Ok(())
}

/// Detaches the old root and removes its mount-point directory.
///
/// Uses lazy `MNT_DETACH` semantics so any in-flight references drain on
/// last use; afterwards no trace of the host tree remains inside the
/// container.
///
/// # Errors
///
/// Returns a setup fault if the unmount or the directory removal fails.
pub fn detach_old_root() -> Result<()> {
    let old_root = PathBuf::from("/").join(OLD_ROOT_DIR);
    umount2(&old_root, MntFlags::MNT_DETACH)
        .map_err(|source| CradleError::setup("umount2 /oldroot", source))?;
    fs::remove_dir(&old_root).map_err(|source| CradleError::Io {
        path: old_root,
        source,
    })?;
    Ok(())
}
