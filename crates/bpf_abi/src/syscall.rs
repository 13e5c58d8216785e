use core::ffi::c_long;

/// `__NR_bpf` for the build target, or `None` when the probe has no calling
/// convention for it. Callers report `ENOSYS` for every request then.
#[cfg(target_arch = "x86")]
pub const SYS_BPF: Option<c_long> = Some(357);

/// `__NR_bpf` for the build target, or `None` when the probe has no calling
/// convention for it. Callers report `ENOSYS` for every request then.
#[cfg(target_arch = "x86_64")]
pub const SYS_BPF: Option<c_long> = Some(321);

/// `__NR_bpf` for the build target, or `None` when the probe has no calling
/// convention for it. Callers report `ENOSYS` for every request then.
#[cfg(target_arch = "aarch64")]
pub const SYS_BPF: Option<c_long> = Some(280);

/// `__NR_bpf` for the build target, or `None` when the probe has no calling
/// convention for it. Callers report `ENOSYS` for every request then.
#[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
pub const SYS_BPF: Option<c_long> = None;
