//! Linux namespace management for container isolation.
//!
//! The namespace set for a launch is derived once from the caller's
//! privilege level and handed to the process-creation primitive; it is
//! never mutated afterwards. Failures surface at `clone(2)` time, not
//! here — deriving the configuration is pure computation.

pub mod user;
pub mod uts;

use nix::sched::CloneFlags;
use nix::unistd::Uid;

/// Configuration for which namespaces to create for a launch.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceConfig {
    /// Isolate PID namespace (reaping and process isolation).
    pub pid: bool,
    /// Isolate mount namespace (required for the `pivot_root` sequence).
    pub mount: bool,
    /// Isolate UTS (hostname) namespace.
    pub uts: bool,
    /// Isolate IPC namespace.
    pub ipc: bool,
    /// Isolate user namespace (rootless operation only).
    pub user: bool,
}

impl NamespaceConfig {
    /// Derives the namespace set for a caller with the given effective UID.
    ///
    /// PID, mount, UTS, and IPC namespaces are always created. The user
    /// namespace is added only for unprivileged callers, paired with a
    /// single-entry identity mapping so the process appears as root inside
    /// the container while carrying no added host privilege.
    #[must_use]
    pub fn for_user(euid: Uid) -> Self {
        Self {
            pid: true,
            mount: true,
            uts: true,
            ipc: true,
            user: !euid.is_root(),
        }
    }

    /// Converts the configuration into `clone(2)` flags.
    #[must_use]
    pub fn clone_flags(&self) -> CloneFlags {
        let mut flags = CloneFlags::empty();
        if self.pid {
            flags |= CloneFlags::CLONE_NEWPID;
        }
        if self.mount {
            flags |= CloneFlags::CLONE_NEWNS;
        }
        if self.uts {
            flags |= CloneFlags::CLONE_NEWUTS;
        }
        if self.ipc {
            flags |= CloneFlags::CLONE_NEWIPC;
        }
        if self.user {
            flags |= CloneFlags::CLONE_NEWUSER;
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privileged_caller_gets_no_user_namespace() {
        let config = NamespaceConfig::for_user(Uid::from_raw(0));
        assert!(config.pid && config.mount && config.uts && config.ipc);
        assert!(!config.user);
    }

    #[test]
    fn unprivileged_caller_gets_user_namespace() {
        let config = NamespaceConfig::for_user(Uid::from_raw(1000));
        assert!(config.user);
    }

    #[test]
    fn clone_flags_match_configuration() {
        let config = NamespaceConfig::for_user(Uid::from_raw(1000));
        let flags = config.clone_flags();
        assert!(flags.contains(CloneFlags::CLONE_NEWPID));
        assert!(flags.contains(CloneFlags::CLONE_NEWNS));
        assert!(flags.contains(CloneFlags::CLONE_NEWUTS));
        assert!(flags.contains(CloneFlags::CLONE_NEWIPC));
        assert!(flags.contains(CloneFlags::CLONE_NEWUSER));
        assert!(!flags.contains(CloneFlags::CLONE_NEWNET));
    }

    #[test]
    fn root_clone_flags_omit_user_namespace() {
        let flags = NamespaceConfig::for_user(Uid::from_raw(0)).clone_flags();
        assert!(!flags.contains(CloneFlags::CLONE_NEWUSER));
    }
}
