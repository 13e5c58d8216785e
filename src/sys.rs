//! `bpf(2)` access.
//!
//! [`BpfSys`] is the seam between the probe engine and the kernel: the
//! engine only ever creates maps and loads programs through it. [`LinuxBpf`]
//! issues the real system call.

use std::ffi::CStr;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use bpf_abi::{BPF_LOG_LEVEL1, BpfAttr, BpfCmd, MapCreateAttr, MapDef, ProgLoadAttr, SYS_BPF};
use bpf_bytecode::bytecode::insn::BpfInsn;
use bpf_bytecode::bytecode::program::BpfProgType;

use crate::error::SysError;

/// Creates maps and loads programs.
///
/// Handles close themselves when dropped, so a handle's lifetime is the
/// lifetime of the kernel object reference it represents.
pub trait BpfSys {
    type Handle: AsRawFd;

    fn create_map(&self, def: &MapDef) -> Result<Self::Handle, SysError>;

    /// Load `insns` as a program of type `prog_type`.
    ///
    /// When `log` is a non-empty buffer the kernel is asked to write the
    /// verifier transcript into it.
    fn load_program(
        &self,
        prog_type: BpfProgType,
        insns: &[BpfInsn],
        license: &CStr,
        log: Option<&mut [u8]>,
    ) -> Result<Self::Handle, SysError>;
}

/// The running kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxBpf;

impl LinuxBpf {
    fn bpf(cmd: BpfCmd, attr: &mut BpfAttr) -> Result<OwnedFd, SysError> {
        let Some(nr) = SYS_BPF else {
            return Err(SysError::new(cmd, libc::ENOSYS));
        };

        // SAFETY: `attr` is a fully initialised bpf_attr of `BpfAttr::SIZE`
        // bytes and outlives the call. Any pointers inside it reference
        // buffers borrowed for the duration of the call.
        let ret = unsafe {
            libc::syscall(
                nr,
                cmd as libc::c_long,
                attr as *mut BpfAttr,
                BpfAttr::SIZE as libc::c_long,
            )
        };
        if ret < 0 {
            return Err(SysError::last_os_error(cmd));
        }

        // SAFETY: on success MAP_CREATE and PROG_LOAD return a new file
        // descriptor that nothing else owns.
        Ok(unsafe { OwnedFd::from_raw_fd(ret as libc::c_int) })
    }
}

impl BpfSys for LinuxBpf {
    type Handle = OwnedFd;

    fn create_map(&self, def: &MapDef) -> Result<OwnedFd, SysError> {
        let mut attr = BpfAttr::map_create(MapCreateAttr::from(def));
        Self::bpf(BpfCmd::MapCreate, &mut attr)
    }

    fn load_program(
        &self,
        prog_type: BpfProgType,
        insns: &[BpfInsn],
        license: &CStr,
        log: Option<&mut [u8]>,
    ) -> Result<OwnedFd, SysError> {
        let mut load = ProgLoadAttr {
            prog_type: prog_type as u32,
            insn_cnt: insns.len() as u32,
            insns: insns.as_ptr() as u64,
            license: license.as_ptr() as u64,
            ..Default::default()
        };

        if let Some(log) = log.filter(|log| !log.is_empty()) {
            load.log_level = BPF_LOG_LEVEL1;
            load.log_size = u32::try_from(log.len()).unwrap_or(u32::MAX);
            load.log_buf = log.as_mut_ptr() as u64;
        }

        let mut attr = BpfAttr::prog_load(load);
        Self::bpf(BpfCmd::ProgLoad, &mut attr)
    }
}
