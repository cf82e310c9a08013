//! Host-side launch orchestration.
//!
//! One launch is: derive the namespace set from the caller's privilege,
//! `clone(2)` a child carrying those namespaces, re-execute ourselves in
//! it as the init supervisor (`child` entry), write the rootless identity
//! maps if needed, bridge the terminal, and block until the init process
//! exits — its translated status is the launch's result.
//!
//! The cloned child is released through a sync pipe only after the ID
//! maps are in place, because without them a rootless init has no
//! privilege to run its mount plan.

use std::ffi::CString;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use cradle_common::constants::BIN_NAME;
use cradle_common::error::{CradleError, Result};
use cradle_common::types::LaunchRequest;
use nix::errno::Errno;
use nix::sched::clone;
use nix::sys::signal::Signal;
use nix::sys::wait::waitpid;
use nix::unistd::{Pid, geteuid, getegid, pipe, write};

use crate::init::translated_exit_code;
use crate::namespace::NamespaceConfig;
use crate::namespace::user::{IdMapping, write_id_maps};
use crate::pty::TerminalBridge;

/// Stack for the cloned init process; replaced wholesale at exec.
const CLONE_STACK_SIZE: usize = 1024 * 1024;

/// Performs one container launch and returns the exit code to report.
///
/// # Errors
///
/// Returns a setup fault if process creation, identity mapping, or pty
/// allocation fails. Failures inside the container surface only through
/// the returned exit code.
pub fn launch(request: &LaunchRequest) -> Result<i32> {
    let namespaces = NamespaceConfig::for_user(geteuid());
    tracing::info!(
        command = %request.command.display(),
        rootfs = %request.rootfs.display(),
        rootless = namespaces.user,
        interactive = request.interactive,
        "launching container"
    );

    let (sync_read, sync_write) =
        pipe().map_err(|source| CradleError::setup("sync pipe", source))?;

    let mut bridge = None;
    let mut slave = None;
    if request.interactive {
        let (b, s) = TerminalBridge::allocate()?;
        bridge = Some(b);
        slave = Some(s);
    }

    let child = spawn_init(request, &namespaces, &sync_read, slave.as_ref())?;
    drop(sync_read);
    drop(slave);

    if namespaces.user {
        let uid_map = IdMapping::single(0, geteuid().as_raw());
        let gid_map = IdMapping::single(0, getegid().as_raw());
        write_id_maps(child, &uid_map, &gid_map)?;
    }

    // Release the init process: maps (if any) are in place.
    let _ = write(&sync_write, &[0u8])
        .map_err(|source| CradleError::setup("sync pipe write", source))?;
    drop(sync_write);

    let output_pump = bridge.as_mut().map(|b| {
        b.start();
        b.spawn_output_pump()
    });

    let code = wait_for_init(child)?;

    // The init process is gone, so the output pump sees EIO on the master
    // as soon as it has drained the trailing bytes.
    if let Some(Some(pump)) = output_pump {
        let _ = pump.join();
    }
    drop(bridge);

    tracing::info!(code, "launch complete");
    Ok(code)
}

/// Clones the init process into its fresh namespaces.
///
/// The child blocks on the sync pipe, wires the pty slave (if any) onto
/// its standard streams, enters the request's working directory, and
/// re-executes `/proc/self/exe child <command> [args…]`.
#[allow(unsafe_code)]
fn spawn_init(
    request: &LaunchRequest,
    namespaces: &NamespaceConfig,
    sync_read: &OwnedFd,
    slave: Option<&OwnedFd>,
) -> Result<Pid> {
    let exe = cstring(b"/proc/self/exe")?;
    let mut argv = vec![cstring(BIN_NAME.as_bytes())?, cstring(b"child")?];
    argv.push(cstring(request.command.as_os_str().as_encoded_bytes())?);
    for arg in &request.args {
        argv.push(cstring(arg.as_bytes())?);
    }
    let cwd = cstring(request.cwd.as_os_str().as_encoded_bytes())?;

    // Built ahead of the clone so the child allocates nothing before exec.
    let mut argv_ptrs: Vec<*const libc::c_char> =
        argv.iter().map(|arg| arg.as_ptr()).collect();
    argv_ptrs.push(std::ptr::null());

    let sync_fd = sync_read.as_raw_fd();
    let slave_fd = slave.map(AsRawFd::as_raw_fd);

    let mut stack = vec![0u8; CLONE_STACK_SIZE];
    // SAFETY: the callback runs in the cloned child and restricts itself
    // to async-signal-safe libc calls on pre-built data; the stack and the
    // borrowed CStrings outlive the child's short pre-exec window.
    let pid = unsafe {
        clone(
            Box::new(|| init_trampoline(sync_fd, slave_fd, &cwd, &exe, &argv_ptrs)),
            &mut stack,
            namespaces.clone_flags(),
            Some(Signal::SIGCHLD as libc::c_int),
        )
    }
    .map_err(|source| CradleError::setup("clone", source))?;

    tracing::debug!(pid = pid.as_raw(), "init process cloned");
    Ok(pid)
}

/// Runs in the cloned child between `clone(2)` and exec.
///
/// Only async-signal-safe libc calls: the parent may still be mid-map
/// write, and this address-space copy must not touch allocator or lock
/// state. Exit codes from here surface as the launch's status on the
/// rare paths where exec never happens.
#[allow(unsafe_code)]
fn init_trampoline(
    sync_fd: RawFd,
    slave_fd: Option<RawFd>,
    cwd: &CString,
    exe: &CString,
    argv: &[*const libc::c_char],
) -> isize {
    // SAFETY: all fds are inherited and open; pointers come from CStrings
    // and a null-terminated pointer array that outlive this call.
    unsafe {
        let mut byte = 0u8;
        if libc::read(sync_fd, (&raw mut byte).cast(), 1) != 1 {
            return 1;
        }
        let _ = libc::close(sync_fd);

        if let Some(fd) = slave_fd {
            if libc::dup2(fd, 0) < 0 || libc::dup2(fd, 1) < 0 || libc::dup2(fd, 2) < 0 {
                return 1;
            }
            if fd > 2 {
                let _ = libc::close(fd);
            }
        }

        if libc::chdir(cwd.as_ptr()) < 0 {
            return 1;
        }

        let _ = libc::execv(exe.as_ptr(), argv.as_ptr());
        // Exec of our own binary failed; nothing sensible left to do.
        127
    }
}

/// Blocks until the init process exits and translates its status.
fn wait_for_init(child: Pid) -> Result<i32> {
    loop {
        match waitpid(child, None) {
            Ok(status) => {
                if let Some(code) = translated_exit_code(status) {
                    return Ok(code);
                }
            }
            Err(Errno::EINTR) => {}
            Err(source) => return Err(CradleError::setup("waitpid", source)),
        }
    }
}

fn cstring(bytes: &[u8]) -> Result<CString> {
    CString::new(bytes).map_err(|_| CradleError::Config {
        message: "argument contains an interior NUL byte".to_owned(),
    })
}
