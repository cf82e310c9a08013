//! In-namespace init supervision.
//!
//! The re-executed `child` entry lands here as PID 1 of the new PID
//! namespace. It runs the mount plan, takes over the terminal, execs the
//! primary command as its own process group, and then becomes the
//! namespace's reaper of last resort: every process whose parent dies
//! reparents to this one and must be drained, or it lingers as a zombie
//! for the namespace's lifetime.
//!
//! Exactly one primary child exists per supervisor instance. Signal
//! forwarding and exit-code translation are defined relative to it; all
//! other reaped descendants are anonymous and only their slot is
//! reclaimed.

use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use cradle_common::constants::{DEFAULT_LOOKUP_PATH, SIGNAL_EXIT_BASE};
use cradle_common::error::{CradleError, Result};
use cradle_common::types::LaunchRequest;
use nix::errno::Errno;
use nix::sys::signal::{SigSet, SigmaskHow, Signal, killpg, pthread_sigmask};
use nix::sys::wait::{WaitStatus, wait};
use nix::unistd::Pid;

use crate::filesystem;
use crate::terminal::ControllingTerminal;

/// Runs the init supervisor for one launch and returns the exit code to
/// propagate to the host.
///
/// # Errors
///
/// Returns a setup fault if the mount plan or terminal setup fails, or a
/// resolution fault if the command cannot be found. Once the primary
/// child is running, supervision errors are handled locally and only the
/// translated exit code surfaces.
pub fn run(request: &LaunchRequest) -> Result<i32> {
    // mounting / devicing — the terminal is acquired first because the
    // host pts path must be resolved while the host /dev is still visible.
    // Dropping it restores the saved foreground group, so the early `?`
    // returns below leave the host terminal consistent too.
    let terminal = ControllingTerminal::acquire()?;
    let console = terminal.as_ref().map(|t| t.host_pts().to_path_buf());
    filesystem::setup_rootfs(&request.rootfs, console.as_deref())?;

    // execing — resolution happens inside the pivoted root, against the
    // container's own view of the lookup paths.
    let resolved = resolve_command(&request.command)?;
    block_forwarded_signals()?;
    let child = spawn_primary(&resolved, &request.args)?;
    #[allow(clippy::cast_possible_wrap)]
    let pgid = Pid::from_raw(child.id() as i32);
    tracing::info!(command = %resolved.display(), pid = pgid.as_raw(), "primary child started");

    // supervising / draining
    if let Some(t) = &terminal {
        t.set_foreground(pgid);
    }
    let code = supervise(pgid);

    // exiting
    drop(terminal);
    Ok(code)
}

/// Resolves the command to an executable path inside the container.
///
/// Absolute paths are used as-is (and merely checked for existence);
/// anything else is searched along `PATH`, falling back to a fixed
/// default list when the environment carries none.
///
/// # Errors
///
/// Returns [`CradleError::CommandNotFound`] when nothing resolves.
pub fn resolve_command(command: &Path) -> Result<PathBuf> {
    let lookup = std::env::var("PATH").unwrap_or_else(|_| DEFAULT_LOOKUP_PATH.to_owned());
    resolve_command_in(command, &lookup)
}

fn resolve_command_in(command: &Path, lookup: &str) -> Result<PathBuf> {
    if command.is_absolute() {
        if command.exists() {
            return Ok(command.to_path_buf());
        }
        return Err(CradleError::CommandNotFound {
            command: command.to_path_buf(),
        });
    }
    which::which_in(command, Some(lookup), "/").map_err(|_| CradleError::CommandNotFound {
        command: command.to_path_buf(),
    })
}

/// Blocks the forwarded signal set in the calling thread.
///
/// Must run before the primary child is spawned so no forwarded signal is
/// lost in the window before the forwarder thread starts; the child's own
/// mask is reset at exec time.
///
/// # Errors
///
/// Returns a setup fault if the signal mask cannot be changed.
pub fn block_forwarded_signals() -> Result<()> {
    pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&forwarded_set()), None)
        .map_err(|source| CradleError::setup("block signal mask", source))
}

/// Spawns the primary child with inherited standard streams and its own
/// process group (group id equals its pid).
///
/// # Errors
///
/// Returns [`CradleError::CommandNotFound`] if exec reports a missing
/// file, or an I/O fault for any other spawn failure.
#[allow(unsafe_code)]
pub fn spawn_primary(command: &Path, args: &[String]) -> Result<Child> {
    use std::os::unix::process::CommandExt;

    let mut cmd = Command::new(command);
    let _ = cmd.args(args).process_group(0);
    // SAFETY: the pre-exec hook only calls the async-signal-safe
    // sigprocmask to undo the inherited forwarding block.
    unsafe {
        let _ = cmd.pre_exec(|| {
            let mut empty: libc::sigset_t = std::mem::zeroed();
            let _ = libc::sigemptyset(&raw mut empty);
            let _ = libc::sigprocmask(libc::SIG_SETMASK, &raw const empty, std::ptr::null_mut());
            Ok(())
        });
    }

    cmd.spawn().map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            CradleError::CommandNotFound {
                command: command.to_path_buf(),
            }
        } else {
            CradleError::Io {
                path: command.to_path_buf(),
                source,
            }
        }
    })
}

/// Forwards termination signals to the primary child's process group and
/// drains every descendant until none remain.
///
/// The forwarder runs concurrently with the drain loop — a signal must be
/// deliverable at any point during draining. Returns the primary child's
/// translated exit code.
pub fn supervise(primary: Pid) -> i32 {
    let forwarder = SignalForwarder::spawn(primary);
    let code = drain(primary);
    forwarder.shutdown();
    code
}

/// Reaps descendants until the kernel reports no children remain.
///
/// The primary child's termination is captured but does not end the loop:
/// reparented orphans may still be alive or mid-exit, and leaving them
/// unreaped would leak zombies for the namespace's lifetime. `ECHILD` is
/// the only exit condition; other wait errors are transient.
fn drain(primary: Pid) -> i32 {
    let mut code = 0;
    loop {
        match wait() {
            Ok(status) => {
                if status.pid() == Some(primary) {
                    if let Some(translated) = translated_exit_code(status) {
                        code = translated;
                    }
                }
            }
            Err(Errno::ECHILD) => break,
            Err(err) => {
                tracing::debug!(error = %err, "transient wait error during drain");
            }
        }
    }
    code
}

/// Translates a wait status into a process exit code.
///
/// Normal exit maps to the child's own code; death by signal maps to
/// `128 + signo`. Statuses that do not terminate the process yield
/// `None`.
#[must_use]
pub fn translated_exit_code(status: WaitStatus) -> Option<i32> {
    match status {
        WaitStatus::Exited(_, code) => Some(code),
        WaitStatus::Signaled(_, signal, _) => Some(SIGNAL_EXIT_BASE + signal as i32),
        _ => None,
    }
}

fn forwarded_set() -> SigSet {
    let mut set = SigSet::empty();
    set.add(Signal::SIGTERM);
    set.add(Signal::SIGINT);
    set.add(Signal::SIGQUIT);
    set
}

/// Background listener that relays termination signals to the primary
/// child's process group.
///
/// The signals are blocked in the spawning thread, so delivery funnels
/// into this thread's `sigwait`, which forwards the identical signal via
/// `killpg`. At-most-once-per-occurrence; no queueing beyond the
/// kernel's.
struct SignalForwarder {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl SignalForwarder {
    fn spawn(target: Pid) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let set = forwarded_set();
        let handle = std::thread::spawn(move || {
            loop {
                let Ok(signal) = set.wait() else { continue };
                if thread_stop.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(err) = killpg(target, signal) {
                    tracing::warn!(signal = %signal, error = %err, "signal forwarding failed");
                }
            }
        });
        Self { stop, handle }
    }

    /// Ends the forwarder after the primary child has been reaped. A
    /// thread-directed SIGTERM wakes the blocked `sigwait`; the stop flag
    /// keeps it from being relayed to the now-dead group.
    #[allow(unsafe_code)]
    fn shutdown(self) {
        use std::os::unix::thread::JoinHandleExt;

        self.stop.store(true, Ordering::SeqCst);
        // SAFETY: the pthread handle stays valid until the join below.
        let rc = unsafe { libc::pthread_kill(self.handle.as_pthread_t(), libc::SIGTERM) };
        if rc != 0 {
            tracing::warn!(rc, "failed to wake signal forwarder");
            return;
        }
        let _ = self.handle.join();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn normal_exit_translates_to_own_code() {
        let status = WaitStatus::Exited(Pid::from_raw(42), 7);
        assert_eq!(translated_exit_code(status), Some(7));
    }

    #[test]
    fn signal_death_translates_to_128_plus_signo() {
        let status = WaitStatus::Signaled(Pid::from_raw(42), Signal::SIGKILL, false);
        assert_eq!(translated_exit_code(status), Some(137));
        let status = WaitStatus::Signaled(Pid::from_raw(42), Signal::SIGTERM, false);
        assert_eq!(translated_exit_code(status), Some(143));
    }

    #[test]
    fn stopped_child_translates_to_nothing() {
        let status = WaitStatus::Stopped(Pid::from_raw(42), Signal::SIGSTOP);
        assert_eq!(translated_exit_code(status), None);
    }

    #[test]
    fn absolute_existing_command_resolves_to_itself() {
        let path = Path::new("/proc/self/exe");
        assert_eq!(resolve_command(path).unwrap(), path);
    }

    #[test]
    fn absolute_missing_command_is_not_found() {
        let err = resolve_command(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, CradleError::CommandNotFound { .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn relative_command_searches_lookup_paths() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("toolbin");
        std::fs::write(&exe, b"#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

        let lookup = dir.path().to_str().unwrap();
        let found = resolve_command_in(Path::new("toolbin"), lookup).unwrap();
        assert_eq!(found, exe);

        let err = resolve_command_in(Path::new("missingbin"), lookup).unwrap_err();
        assert!(matches!(err, CradleError::CommandNotFound { .. }));
    }
}
