//! Privileged end-to-end launches against a scratch rootfs.
//!
//! Most of these need real namespace privileges and a static busybox to
//! populate the rootfs with, so each test skips itself (with a note on
//! stderr) when a requirement is missing. A trial launch catches
//! environments where namespaces still cannot be created, such as
//! restricted CI sandboxes.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::Duration;

const BIN: &str = env!("CARGO_BIN_EXE_cradle");

const BUSYBOX_CANDIDATES: [&str; 3] = ["/bin/busybox", "/usr/bin/busybox", "/sbin/busybox"];

fn find_busybox() -> Option<PathBuf> {
    BUSYBOX_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn scratch_rootfs(busybox: &Path) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("bin")).unwrap();
    let _ = std::fs::copy(busybox, dir.path().join("bin/busybox")).unwrap();
    dir
}

fn launch(rootfs: &Path, args: &[&str]) -> ExitStatus {
    Command::new(BIN)
        .arg("run")
        .arg("--rootfs")
        .arg(rootfs)
        .arg("--")
        .args(args)
        .stdin(Stdio::null())
        .status()
        .unwrap()
}

/// Host-visible pid of the init supervisor, read from the launcher's
/// children list in procfs.
fn init_pid_of(launcher: u32) -> Option<i32> {
    let children = format!("/proc/{launcher}/task/{launcher}/children");
    for _ in 0..50 {
        if let Ok(text) = std::fs::read_to_string(&children) {
            if let Some(pid) = text.split_whitespace().next() {
                return pid.parse().ok();
            }
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    None
}

#[test]
fn launches_and_exit_codes() {
    let Some(busybox) = find_busybox() else {
        eprintln!("skipping: no busybox binary found");
        return;
    };
    if !nix::unistd::Uid::effective().is_root() {
        eprintln!("skipping: requires root");
        return;
    }
    let rootfs = scratch_rootfs(&busybox);

    let trial = launch(rootfs.path(), &["/bin/busybox", "true"]);
    if !trial.success() {
        eprintln!("skipping: environment cannot create namespaces ({trial})");
        return;
    }

    // The child's exit code is the launch's exit code.
    let status = launch(rootfs.path(), &["/bin/busybox", "sh", "-c", "exit 7"]);
    assert_eq!(status.code(), Some(7));

    // Death by signal translates to 128 + signo.
    let status = launch(rootfs.path(), &["/bin/busybox", "sh", "-c", "kill -9 $$"]);
    assert_eq!(status.code(), Some(137));

    // The container sees its own hostname and a fresh pid namespace.
    let status = launch(
        rootfs.path(),
        &[
            "/bin/busybox",
            "sh",
            "-c",
            "test \"$(/bin/busybox hostname)\" = container && test $$ -le 2",
        ],
    );
    assert_eq!(status.code(), Some(0));

    // Device nodes are usable.
    let status = launch(
        rootfs.path(),
        &["/bin/busybox", "sh", "-c", "echo hi > /dev/null && test -c /dev/zero"],
    );
    assert_eq!(status.code(), Some(0));

    // A command missing from the rootfs exits 1.
    let status = launch(rootfs.path(), &["/bin/nonexistent"]);
    assert_eq!(status.code(), Some(1));

    // The pivot scaffolding dir is removed before the command runs.
    let status = launch(
        rootfs.path(),
        &["/bin/busybox", "sh", "-c", "test ! -e /oldroot"],
    );
    assert_eq!(status.code(), Some(0));
    assert!(!rootfs.path().join("oldroot").exists());
}

// Deliberately not root-gated: run unprivileged, the launch goes through
// the rootless user-namespace path and its host-/sys bind fallback, which
// must be just as read-only as a fresh sysfs mount.
#[test]
fn sys_is_read_only_inside_the_container() {
    let Some(busybox) = find_busybox() else {
        eprintln!("skipping: no busybox binary found");
        return;
    };
    let rootfs = scratch_rootfs(&busybox);
    if !launch(rootfs.path(), &["/bin/busybox", "true"]).success() {
        eprintln!("skipping: environment cannot create namespaces");
        return;
    }

    let status = launch(
        rootfs.path(),
        &[
            "/bin/busybox",
            "sh",
            "-c",
            "/bin/busybox touch /sys/x 2>/dev/null && exit 1; exit 0",
        ],
    );
    assert_eq!(status.code(), Some(0));
}

#[test]
fn forwards_termination_to_the_child() {
    let Some(busybox) = find_busybox() else {
        eprintln!("skipping: no busybox binary found");
        return;
    };
    if !nix::unistd::Uid::effective().is_root() {
        eprintln!("skipping: requires root");
        return;
    }
    let rootfs = scratch_rootfs(&busybox);
    if !launch(rootfs.path(), &["/bin/busybox", "true"]).success() {
        eprintln!("skipping: environment cannot create namespaces");
        return;
    }

    // SIGTERM sent to the init supervisor must reach the child, whose trap
    // turns it into exit 42.
    let mut launcher = Command::new(BIN)
        .arg("run")
        .arg("--rootfs")
        .arg(rootfs.path())
        .arg("--")
        .args([
            "/bin/busybox",
            "sh",
            "-c",
            "trap 'exit 42' TERM; while :; do /bin/busybox sleep 0.1; done",
        ])
        .stdin(Stdio::null())
        .spawn()
        .unwrap();

    let init = init_pid_of(launcher.id()).expect("init supervisor pid not visible");
    std::thread::sleep(Duration::from_millis(500));
    // SAFETY: plain kill(2) on a pid we own.
    #[allow(unsafe_code)]
    let rc = unsafe { libc::kill(init, libc::SIGTERM) };
    assert_eq!(rc, 0);

    let status = launcher.wait().unwrap();
    assert_eq!(status.code(), Some(42));
}
