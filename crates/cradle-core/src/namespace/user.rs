//! User namespace identity mapping.
//!
//! Rootless launches map exactly one ID: container-internal 0 to the
//! caller's host ID, for both UID and GID. The mapping is written by the
//! host-side parent into the child's `/proc/<pid>` files before the child
//! is released to run its mount plan.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use cradle_common::error::{CradleError, Result};
use nix::unistd::Pid;

/// One line of a `uid_map`/`gid_map` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdMapping {
    /// First ID inside the namespace.
    pub container_id: u32,
    /// First ID outside the namespace.
    pub host_id: u32,
    /// Number of consecutive IDs mapped.
    pub size: u32,
}

impl IdMapping {
    /// Builds a single-ID mapping (`size == 1`), the only shape cradle
    /// ever writes.
    #[must_use]
    pub const fn single(container_id: u32, host_id: u32) -> Self {
        Self {
            container_id,
            host_id,
            size: 1,
        }
    }
}

impl fmt::Display for IdMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.container_id, self.host_id, self.size)
    }
}

/// Writes the UID and GID mappings for a freshly cloned child.
///
/// Denies `setgroups` first, as required before an unprivileged process
/// may write a `gid_map`.
///
/// # Errors
///
/// Returns an error if writing to `/proc/<pid>/setgroups`, `uid_map`, or
/// `gid_map` fails.
pub fn write_id_maps(pid: Pid, uid: &IdMapping, gid: &IdMapping) -> Result<()> {
    let proc_dir = PathBuf::from(format!("/proc/{pid}"));

    let setgroups = proc_dir.join("setgroups");
    if setgroups.exists() {
        write_proc_file(&setgroups, "deny")?;
    }
    write_proc_file(&proc_dir.join("uid_map"), &uid.to_string())?;
    write_proc_file(&proc_dir.join("gid_map"), &gid.to_string())?;

    tracing::debug!(pid = pid.as_raw(), %uid, %gid, "wrote UID/GID maps");
    Ok(())
}

fn write_proc_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|source| CradleError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_mapping_has_size_one() {
        let map = IdMapping::single(0, 1000);
        assert_eq!(map.container_id, 0);
        assert_eq!(map.host_id, 1000);
        assert_eq!(map.size, 1);
    }

    #[test]
    fn mapping_formats_as_map_file_line() {
        assert_eq!(IdMapping::single(0, 1000).to_string(), "0 1000 1");
        assert_eq!(IdMapping::single(0, 0).to_string(), "0 0 1");
    }
}
