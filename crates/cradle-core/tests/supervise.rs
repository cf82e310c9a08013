//! Reaper behaviour exercised without namespaces.
//!
//! The supervision loop is the same code the in-container init runs,
//! driven here against plain host children; `PR_SET_CHILD_SUBREAPER`
//! stands in for being PID 1, so orphaned grandchildren reparent to this
//! process exactly as they would inside the namespace.
//!
//! One test function on purpose: the drain loop uses wait-any, which must
//! not race a sibling test's children inside the same process.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;
use std::time::{Duration, Instant};

use cradle_core::init::{block_forwarded_signals, spawn_primary, supervise};
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitPidFlag, waitpid};
use nix::unistd::Pid;

#[allow(clippy::cast_possible_wrap)]
fn pid_of(child: &std::process::Child) -> Pid {
    Pid::from_raw(child.id() as i32)
}

#[test]
fn supervision_reaps_and_translates() {
    // SAFETY: prctl with valid constant arguments.
    #[allow(unsafe_code)]
    let rc = unsafe { libc::prctl(libc::PR_SET_CHILD_SUBREAPER, 1, 0, 0, 0) };
    assert_eq!(rc, 0, "PR_SET_CHILD_SUBREAPER failed");
    block_forwarded_signals().unwrap();

    // Normal exit: the supervisor's code is the child's own.
    let child = spawn_primary(Path::new("/bin/sh"), &["-c".into(), "exit 7".into()]).unwrap();
    assert_eq!(supervise(pid_of(&child)), 7);

    let child = spawn_primary(Path::new("/bin/true"), &[]).unwrap();
    assert_eq!(supervise(pid_of(&child)), 0);

    // Death by signal: 128 + signo.
    let child = spawn_primary(
        Path::new("/bin/sh"),
        &["-c".into(), "exec sleep 30".into()],
    )
    .unwrap();
    let pid = pid_of(&child);
    std::thread::sleep(Duration::from_millis(200));
    kill(pid, Signal::SIGKILL).unwrap();
    assert_eq!(supervise(pid), 137);

    // Orphaned grandchild: the primary exits first, and draining must not
    // end until the reparented grandchild has been reaped too.
    let start = Instant::now();
    let child = spawn_primary(
        Path::new("/bin/sh"),
        &["-c".into(), "sleep 1 & exit 5".into()],
    )
    .unwrap();
    assert_eq!(supervise(pid_of(&child)), 5);
    assert!(
        start.elapsed() >= Duration::from_millis(700),
        "drain ended before the orphan was reaped"
    );

    // Nothing left behind: no zombie children remain.
    assert_eq!(
        waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)),
        Err(Errno::ECHILD)
    );
}
