//! Controlling-terminal handover on the init side.
//!
//! When standard input is a terminal, the init supervisor records the
//! terminal's current foreground process group, takes the terminal as its
//! controlling terminal, later promotes the primary child's group to
//! foreground, and restores the original group before exiting so the
//! host's job control is left consistent.
//!
//! Every operation here is cosmetic from the launch's point of view:
//! failures are logged and never block command execution or exit-code
//! correctness.

use std::io::IsTerminal;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

use cradle_common::error::Result;
use nix::errno::Errno;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use nix::unistd::{Pid, setsid};

#[allow(unsafe_code)]
mod ioctl {
    use nix::{ioctl_read_bad, ioctl_write_int_bad, ioctl_write_ptr_bad};

    ioctl_read_bad!(tiocgpgrp, libc::TIOCGPGRP, libc::pid_t);
    ioctl_write_ptr_bad!(tiocspgrp, libc::TIOCSPGRP, libc::pid_t);
    ioctl_write_int_bad!(tiocsctty, libc::TIOCSCTTY);
}

/// Terminal state held by the init supervisor for one launch.
///
/// Captures the original foreground process group as a value at
/// acquisition time rather than leaving it as ambient process state. The
/// group is put back when the value drops, so resolution and spawn faults
/// that abort the launch early still leave the host's job control
/// consistent.
#[derive(Debug)]
pub struct ControllingTerminal {
    host_pts: PathBuf,
    original_pgrp: Option<libc::pid_t>,
}

impl ControllingTerminal {
    /// Takes control of the terminal on standard input, if there is one.
    ///
    /// Must run before `pivot_root` so the host-side pseudo-terminal path
    /// can still be resolved for the console bind mount. Returns `None`
    /// when stdin is not a terminal.
    ///
    /// # Errors
    ///
    /// Returns an error only if the terminal path cannot be resolved; all
    /// control-transfer failures degrade to warnings.
    #[allow(unsafe_code)]
    pub fn acquire() -> Result<Option<Self>> {
        let stdin = std::io::stdin();
        if !stdin.is_terminal() {
            return Ok(None);
        }

        let host_pts = nix::unistd::ttyname(&stdin).map_err(|source| {
            cradle_common::error::CradleError::setup("ttyname stdin", source)
        })?;

        // The final foreground restore runs from a background group and
        // would otherwise stop this process with SIGTTOU.
        let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
        // SAFETY: replacing the SIGTTOU disposition with SIG_IGN touches no
        // user-defined handler state.
        if let Err(err) = unsafe { sigaction(Signal::SIGTTOU, &ignore) } {
            tracing::warn!(error = %err, "failed to ignore SIGTTOU");
        }

        let fd = stdin.as_raw_fd();
        let mut pgrp: libc::pid_t = 0;
        // SAFETY: fd refers to the open terminal on stdin and pgrp is a
        // valid out-pointer for the ioctl result.
        let original_pgrp = match unsafe { ioctl::tiocgpgrp(fd, &raw mut pgrp) } {
            Ok(_) => Some(pgrp),
            Err(err) => {
                tracing::warn!(error = %err, "failed to read foreground process group");
                None
            }
        };

        // A fresh session is needed before the terminal can become
        // controlling; EPERM means we already lead one.
        match setsid() {
            Ok(_) | Err(Errno::EPERM) => {}
            Err(err) => tracing::warn!(error = %err, "setsid failed"),
        }
        // SAFETY: fd is the open terminal; argument 0 declines to steal a
        // terminal already controlling another session.
        if let Err(err) = unsafe { ioctl::tiocsctty(fd, 0) } {
            tracing::warn!(error = %err, "failed to acquire controlling terminal");
        }

        Ok(Some(Self {
            host_pts,
            original_pgrp,
        }))
    }

    /// Host-side path of the pseudo-terminal slave (e.g. `/dev/pts/4`).
    #[must_use]
    pub fn host_pts(&self) -> &Path {
        &self.host_pts
    }

    /// Makes `pgid` the terminal's foreground process group.
    pub fn set_foreground(&self, pgid: Pid) {
        self.set_pgrp(pgid.as_raw(), "set foreground process group");
    }

    #[allow(unsafe_code)]
    fn set_pgrp(&self, pgrp: libc::pid_t, what: &str) {
        let fd = std::io::stdin().as_raw_fd();
        // SAFETY: fd refers to the controlling terminal and pgrp is a valid
        // process group id for the duration of the call.
        if let Err(err) = unsafe { ioctl::tiocspgrp(fd, &raw const pgrp) } {
            tracing::warn!(error = %err, "failed to {what}");
        }
    }
}

impl Drop for ControllingTerminal {
    /// Restores the foreground process group recorded at acquisition.
    fn drop(&mut self) {
        if let Some(pgrp) = self.original_pgrp {
            self.set_pgrp(pgrp, "restore foreground process group");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_restores_the_recorded_foreground_group() {
        // Process group 1 is never in this session, and stdin may not even
        // be a terminal under the test harness; either way the restore must
        // degrade to a warning and the drop must complete on early-fault
        // paths.
        let terminal = ControllingTerminal {
            host_pts: PathBuf::from("/dev/pts/0"),
            original_pgrp: Some(1),
        };
        drop(terminal);

        let terminal = ControllingTerminal {
            host_pts: PathBuf::from("/dev/pts/0"),
            original_pgrp: None,
        };
        drop(terminal);
    }
}
