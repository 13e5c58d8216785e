//! Error types for the probe engine.

use std::io;

use bpf_abi::BpfCmd;
use thiserror::Error;

/// A `bpf(2)` command the kernel refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{cmd}(): {}", errno_text(*.errno))]
pub struct SysError {
    pub cmd: BpfCmd,
    pub errno: i32,
}

impl SysError {
    pub const fn new(cmd: BpfCmd, errno: i32) -> Self {
        Self { cmd, errno }
    }

    /// Capture `errno` for `cmd`. Must run right after the failing call.
    pub fn last_os_error(cmd: BpfCmd) -> Self {
        let errno = io::Error::last_os_error().raw_os_error().unwrap_or(0);
        Self::new(cmd, errno)
    }

    /// Message text for the error code alone, as `strerror(3)` prints it.
    pub fn text(&self) -> String {
        errno_text(self.errno)
    }
}

/// Failure while adjusting the memlock resource limit.
#[derive(Debug, Error)]
pub enum RlimitError {
    #[error("getrlimit(RLIMIT_MEMLOCK): {0}")]
    Query(#[source] io::Error),
    #[error("setrlimit(RLIMIT_MEMLOCK): {0}")]
    Update(#[source] io::Error),
}

/// `strerror`-style text without the " (os error N)" suffix std appends.
pub fn errno_text(errno: i32) -> String {
    let full = io::Error::from_raw_os_error(errno).to_string();
    match full.rfind(" (os error ") {
        Some(cut) => full[..cut].to_string(),
        None => full,
    }
}
