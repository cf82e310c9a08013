//! Host-side pseudo-terminal bridge.
//!
//! When the invoking terminal is interactive the launcher allocates a pty
//! pair, hands the slave to the container as its standard streams, puts
//! the real terminal into raw mode, and pumps bytes and window-resize
//! events between the two until the container exits.
//!
//! All of this is cosmetics around the launch: any failure here degrades
//! the session but never blocks command execution or exit-code fidelity.

use std::fs::File;
use std::io::{IsTerminal, Read, Write};
use std::os::fd::{AsFd, AsRawFd, OwnedFd};
use std::thread::JoinHandle;

use cradle_common::error::{CradleError, Result};
use nix::pty::{OpenptyResult, Winsize, openpty};
use nix::sys::signal::{SigSet, SigmaskHow, Signal, pthread_sigmask};
use nix::sys::termios::{SetArg, Termios, cfmakeraw, tcgetattr, tcsetattr};

#[allow(unsafe_code)]
mod ioctl {
    use nix::{ioctl_read_bad, ioctl_write_ptr_bad};

    ioctl_read_bad!(tiocgwinsz, libc::TIOCGWINSZ, libc::winsize);
    ioctl_write_ptr_bad!(tiocswinsz, libc::TIOCSWINSZ, libc::winsize);
}

/// Restores the real terminal's attributes when dropped, so raw mode
/// cannot outlive the launch even on panic paths.
#[derive(Debug)]
pub struct RawModeGuard {
    saved: Termios,
}

impl RawModeGuard {
    /// Puts the terminal on stdin into raw mode.
    ///
    /// Returns `None` (with a warning) when the attributes cannot be read
    /// or set — a launch without raw mode still works, just with local
    /// echo artifacts.
    #[must_use]
    pub fn enable() -> Option<Self> {
        let stdin = std::io::stdin();
        let saved = match tcgetattr(&stdin) {
            Ok(termios) => termios,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read terminal attributes");
                return None;
            }
        };
        let mut raw = saved.clone();
        cfmakeraw(&mut raw);
        if let Err(err) = tcsetattr(&stdin, SetArg::TCSANOW, &raw) {
            tracing::warn!(error = %err, "failed to enter raw mode");
            return None;
        }
        Some(Self { saved })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let stdin = std::io::stdin();
        if let Err(err) = tcsetattr(&stdin, SetArg::TCSANOW, &self.saved) {
            tracing::warn!(error = %err, "failed to restore terminal attributes");
        }
    }
}

/// Host half of the terminal bridge for one interactive launch.
///
/// Owns the pty master exclusively while the container runs; dropping the
/// bridge closes the master and restores the real terminal.
#[derive(Debug)]
pub struct TerminalBridge {
    master: OwnedFd,
    _raw: Option<RawModeGuard>,
}

impl TerminalBridge {
    /// Allocates the pty pair for an interactive launch.
    ///
    /// Returns the slave (to become the container's standard streams) and
    /// the bridge holding the master.
    ///
    /// # Errors
    ///
    /// Returns a setup fault if no pty can be allocated.
    pub fn allocate() -> Result<(Self, OwnedFd)> {
        let OpenptyResult { master, slave } = openpty(None::<&Winsize>, None::<&Termios>)
            .map_err(|source| CradleError::setup("openpty", source))?;
        Ok((
            Self {
                master,
                _raw: None,
            },
            slave,
        ))
    }

    /// Starts the bridge: raw mode, resize forwarding, and both byte
    /// pumps. Called after the container process exists, before blocking
    /// on its completion.
    pub fn start(&mut self) {
        self._raw = RawModeGuard::enable();
        self.spawn_resize_forwarder();
        self.spawn_input_pump();
    }

    /// Spawns the output pump copying pty master bytes to the real
    /// terminal. The pump ends when the master reports no more slave
    /// references (the container is gone); the returned handle lets the
    /// launcher flush trailing output after the wait completes.
    pub fn spawn_output_pump(&self) -> Option<JoinHandle<()>> {
        let master = match self.master.try_clone() {
            Ok(fd) => fd,
            Err(err) => {
                tracing::warn!(error = %err, "failed to clone pty master for output pump");
                return None;
            }
        };
        Some(std::thread::spawn(move || {
            let mut master = File::from(master);
            let mut stdout = std::io::stdout();
            let mut buf = [0u8; 4096];
            loop {
                match master.read(&mut buf) {
                    // EIO when the last slave closes; either way the
                    // session is over.
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if stdout.write_all(&buf[..n]).is_err() {
                            break;
                        }
                        let _ = stdout.flush();
                    }
                }
            }
        }))
    }

    /// Forwards terminal window sizes onto the pty master: once eagerly
    /// at startup, then on every SIGWINCH.
    fn spawn_resize_forwarder(&self) {
        let master_fd = self.master.as_raw_fd();
        copy_winsize(master_fd);

        let mut set = SigSet::empty();
        set.add(Signal::SIGWINCH);
        // Block in this thread so the forwarder (which inherits the mask)
        // is the one place SIGWINCH is consumed.
        if let Err(err) = pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&set), None) {
            tracing::warn!(error = %err, "failed to block SIGWINCH, resizes will not propagate");
            return;
        }
        let _ = std::thread::spawn(move || {
            loop {
                if set.wait().is_ok() {
                    copy_winsize(master_fd);
                }
            }
        });
    }

    /// Pumps bytes from the real terminal's input to the pty master. The
    /// thread stays blocked in `read` and dies with the process.
    fn spawn_input_pump(&self) {
        let master = match self.master.try_clone() {
            Ok(fd) => fd,
            Err(err) => {
                tracing::warn!(error = %err, "failed to clone pty master for input pump");
                return;
            }
        };
        let _ = std::thread::spawn(move || {
            let mut master = File::from(master);
            let mut stdin = std::io::stdin();
            let mut buf = [0u8; 4096];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if master.write_all(&buf[..n]).is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }
}

/// Whether the invoking process's input is an interactive terminal.
#[must_use]
pub fn stdin_is_terminal() -> bool {
    std::io::stdin().is_terminal()
}

#[allow(unsafe_code)]
fn copy_winsize(master_fd: i32) {
    let stdin = std::io::stdin();
    let mut size = libc::winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    // SAFETY: both fds are open for the duration of the calls and `size`
    // is a valid winsize in/out buffer.
    let result = unsafe {
        ioctl::tiocgwinsz(stdin.as_fd().as_raw_fd(), &raw mut size)
            .and_then(|_| ioctl::tiocswinsz(master_fd, &raw const size))
    };
    if let Err(err) = result {
        tracing::warn!(error = %err, "failed to propagate terminal size");
    }
}
