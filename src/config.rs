//! Probe run configuration.

use std::ffi::CString;

/// Default size of the verifier log buffer used for diagnostic reloads.
pub const DEFAULT_LOG_SIZE: u32 = 1 << 16;

/// Smallest non-zero log buffer the kernel accepts.
pub const MIN_LOG_SIZE: u32 = 128;

/// Largest log buffer the kernel accepts.
pub const MAX_LOG_SIZE: u32 = u32::MAX >> 2;

/// Settings shared by every probe in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Emit diagnostic blocks for successful probes and fixup failures too.
    pub verbose: bool,
    /// License string passed with every program. Helpers restricted to GPL
    /// programs are only reachable with a GPL-compatible license.
    pub license: CString,
    /// Verifier log buffer size for diagnostic reloads; 0 disables the log.
    /// Non-zero sizes must lie in `MIN_LOG_SIZE..=MAX_LOG_SIZE`.
    pub log_size: u32,
    /// `max_entries` for maps created by fixups. Probes only need the map to
    /// exist.
    pub map_max_entries: u32,
}

impl ProbeConfig {
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn log_size(mut self, log_size: u32) -> Self {
        self.log_size = log_size;
        self
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            license: c"GPL".to_owned(),
            log_size: DEFAULT_LOG_SIZE,
            map_max_entries: 1,
        }
    }
}
