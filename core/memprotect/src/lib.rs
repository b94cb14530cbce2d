//! OS-level hardening for secret material held in process memory.
//!
//! Protects against inspection by other processes running as the same
//! user. Wiping of individual key buffers is handled separately by the
//! zeroizing wrappers in the crypto crate.

use tracing::warn;
use wslss_common::{Error, Result};

/// Applies process-wide memory protections. Call as early as possible in
/// main, before any secret material is loaded.
///
/// 1. `prctl(PR_SET_DUMPABLE, 0)` disables core dumps, makes
///    `/proc/<pid>/mem` unreadable by non-root processes, and blocks
///    ptrace attachment by unprivileged peers. Failure here is an error.
/// 2. `mlockall(MCL_CURRENT | MCL_FUTURE)` pins all present and future
///    pages in RAM so secrets never reach swap. This can fail in
///    restricted containers or under a small `RLIMIT_MEMLOCK`; the
///    daemon then keeps running with a warning, since the dumpable
///    protection alone is still worth having.
pub fn harden_process() -> Result<()> {
    // SAFETY: both calls take only integer arguments and affect this
    // process alone.
    let rc = unsafe { libc::prctl(libc::PR_SET_DUMPABLE, 0, 0, 0, 0) };
    if rc != 0 {
        return Err(Error::Io(std::io::Error::last_os_error()));
    }

    let rc = unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        warn!("mlockall failed (secrets may reach swap): {err}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harden_is_repeatable() {
        // prctl(PR_SET_DUMPABLE, 0) always succeeds for the calling
        // process; mlockall may fail in constrained environments, which
        // harden_process tolerates.
        harden_process().unwrap();
        harden_process().unwrap();
    }
}
