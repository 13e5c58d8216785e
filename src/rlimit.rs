//! Memlock limit handling.
//!
//! Older kernels charge map and program memory against `RLIMIT_MEMLOCK`, and
//! a probe pass creates many short-lived objects. The limit is lifted for the
//! pass and put back afterwards.

use std::io;

use log::{debug, warn};

use crate::error::RlimitError;

/// Current `RLIMIT_MEMLOCK` as `(soft, hard)`.
pub fn memlock_limit() -> Result<(u64, u64), RlimitError> {
    let limit = get_memlock().map_err(RlimitError::Query)?;
    Ok((limit.rlim_cur as u64, limit.rlim_max as u64))
}

fn get_memlock() -> io::Result<libc::rlimit> {
    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: `limit` is a valid out-pointer for the duration of the call.
    if unsafe { libc::getrlimit(libc::RLIMIT_MEMLOCK, &mut limit) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(limit)
}

fn set_memlock(limit: &libc::rlimit) -> io::Result<()> {
    // SAFETY: `limit` points to an initialised rlimit.
    if unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, limit) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Lifts `RLIMIT_MEMLOCK` to unlimited until dropped.
///
/// Dropping the guard restores the limit that was in place when it was
/// created, on every exit path including unwinding.
#[derive(Debug)]
pub struct MemlockGuard {
    saved: libc::rlimit,
}

impl MemlockGuard {
    /// # Errors
    ///
    /// Fails if the current limit cannot be read or the new one cannot be
    /// set (raising the hard limit needs `CAP_SYS_RESOURCE`). No guard is
    /// returned then and the limit is unchanged.
    pub fn raise() -> Result<Self, RlimitError> {
        let saved = get_memlock().map_err(RlimitError::Query)?;

        let unlimited = libc::rlimit {
            rlim_cur: libc::RLIM_INFINITY,
            rlim_max: libc::RLIM_INFINITY,
        };
        set_memlock(&unlimited).map_err(RlimitError::Update)?;

        debug!(
            "RLIMIT_MEMLOCK raised to unlimited (was {}/{})",
            saved.rlim_cur, saved.rlim_max
        );
        Ok(Self { saved })
    }
}

impl Drop for MemlockGuard {
    fn drop(&mut self) {
        match set_memlock(&self.saved) {
            Ok(()) => debug!(
                "RLIMIT_MEMLOCK restored to {}/{}",
                self.saved.rlim_cur, self.saved.rlim_max
            ),
            Err(err) => warn!("failed to restore RLIMIT_MEMLOCK: {}", err),
        }
    }
}
