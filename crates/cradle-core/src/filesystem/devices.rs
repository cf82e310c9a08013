//! `/dev` population inside the container.
//!
//! Device nodes must exist before the target command execs — shells probe
//! `/dev/tty`, and many programs open `/dev/null` unconditionally. The
//! node table matches the standard Linux character device classes.

use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use cradle_common::constants::OLD_ROOT_DIR;
use cradle_common::error::{CradleError, Result};
use nix::errno::Errno;
use nix::mount::{MsFlags, mount};
use nix::sys::stat::{Mode, SFlag, makedev, mknod};

use super::mount::ensure_dir;

/// Character devices created under `/dev`: name, major, minor.
pub const DEVICE_NODES: [(&str, u64, u64); 6] = [
    ("console", 5, 1),
    ("null", 1, 3),
    ("zero", 1, 5),
    ("full", 1, 7),
    ("random", 1, 8),
    ("urandom", 1, 9),
];

/// Symlinks created under `/dev`: target, link name.
const DEVICE_SYMLINKS: [(&str, &str); 6] = [
    ("console", "/dev/tty"),
    ("pts/ptmx", "/dev/ptmx"),
    ("/proc/self/fd", "/dev/fd"),
    ("/proc/self/fd/0", "/dev/stdin"),
    ("/proc/self/fd/1", "/dev/stdout"),
    ("/proc/self/fd/2", "/dev/stderr"),
];

/// Populates `/dev` with device nodes, a devpts instance, and symlinks.
///
/// In a rootless user namespace `mknod(2)` of character devices is
/// refused; those nodes fall back to bind mounts of the host devices,
/// reached through the still-mounted old root.
///
/// # Errors
///
/// Returns a setup fault if any node, mount, or symlink cannot be
/// created.
pub fn populate_dev() -> Result<()> {
    let mode = Mode::from_bits_truncate(0o666);
    for (name, major, minor) in DEVICE_NODES {
        let path = PathBuf::from("/dev").join(name);
        match mknod(&path, SFlag::S_IFCHR, mode, makedev(major, minor)) {
            Ok(()) => {}
            Err(Errno::EPERM) => bind_host_device(&path, name)?,
            Err(source) => {
                return Err(CradleError::setup(format!("mknod {}", path.display()), source));
            }
        }
    }

    ensure_dir(Path::new("/dev/pts"))?;
    mount(
        Some("devpts"),
        "/dev/pts",
        Some("devpts"),
        MsFlags::MS_NOSUID | MsFlags::MS_NOEXEC,
        Some("newinstance,mode=0620,ptmxmode=0666"),
    )
    .map_err(|source| CradleError::setup("mount /dev/pts", source))?;

    for (target, link) in DEVICE_SYMLINKS {
        symlink(target, link).map_err(|source| CradleError::Io {
            path: PathBuf::from(link),
            source,
        })?;
    }

    Ok(())
}

/// Binds the host pseudo-terminal slave over `/dev/console`.
///
/// `host_pts` is the slave path as seen on the host (e.g. `/dev/pts/4`),
/// reached through the preserved old root. Falls back to the plain
/// `console` device node on failure — a degraded console must never block
/// the launch.
pub fn bind_console(host_pts: &Path) {
    let relative = host_pts.strip_prefix("/").unwrap_or(host_pts);
    let source = Path::new("/").join(OLD_ROOT_DIR).join(relative);
    let target = Path::new("/dev/console");

    if let Err(err) = mount(
        Some(&source),
        target,
        None::<&str>,
        MsFlags::MS_BIND,
        None::<&str>,
    ) {
        tracing::warn!(
            source = %source.display(),
            error = %err,
            "console bind mount failed, using plain device node"
        );
    }
}

fn bind_host_device(path: &Path, name: &str) -> Result<()> {
    let host = Path::new("/").join(OLD_ROOT_DIR).join("dev").join(name);
    fs::write(path, b"").map_err(|source| CradleError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    mount(
        Some(&host),
        path,
        None::<&str>,
        MsFlags::MS_BIND,
        None::<&str>,
    )
    .map_err(|source| CradleError::setup(format!("bind mount {}", path.display()), source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_table_matches_linux_majors() {
        let lookup = |name: &str| {
            DEVICE_NODES
                .iter()
                .find(|(n, _, _)| *n == name)
                .map(|&(_, major, minor)| (major, minor))
        };
        assert_eq!(lookup("console"), Some((5, 1)));
        assert_eq!(lookup("null"), Some((1, 3)));
        assert_eq!(lookup("zero"), Some((1, 5)));
        assert_eq!(lookup("full"), Some((1, 7)));
        assert_eq!(lookup("random"), Some((1, 8)));
        assert_eq!(lookup("urandom"), Some((1, 9)));
    }

    #[test]
    fn standard_stream_symlinks_point_at_proc_self_fd() {
        for fd in 0..3 {
            let target = format!("/proc/self/fd/{fd}");
            assert!(DEVICE_SYMLINKS.iter().any(|(t, _)| *t == target));
        }
    }
}
