//! UTS namespace isolation.
//!
//! The container receives its own hostname; the host's is untouched
//! because the launch always carries a fresh UTS namespace.

use cradle_common::error::{CradleError, Result};

/// Sets the hostname inside the UTS namespace.
///
/// # Errors
///
/// Returns a setup fault if `sethostname(2)` fails.
pub fn set_hostname(hostname: &str) -> Result<()> {
    nix::unistd::sethostname(hostname)
        .map_err(|source| CradleError::setup("sethostname", source))?;
    tracing::debug!(hostname, "container hostname set");
    Ok(())
}
