//! # cradle-core
//!
//! Low-level Linux isolation primitives and the two-stage launch protocol
//! for the cradle container supervisor.
//!
//! This crate provides safe abstractions over:
//! - **Namespaces**: PID, mount, UTS, IPC, and (rootless) user isolation.
//! - **Filesystem**: the ordered mount/`pivot_root`/device-population plan.
//! - **Terminal**: controlling-terminal handover on the init side and the
//!   pseudo-terminal bridge on the host side.
//! - **Init supervision**: the in-namespace PID-1 reaper with signal
//!   forwarding and exit-status translation.
//!
//! All unsafe system calls are encapsulated in safe wrappers with
//! proper error handling and `// SAFETY:` documentation.

pub mod filesystem;
pub mod init;
pub mod launcher;
pub mod namespace;
pub mod pty;
pub mod terminal;
