//! In-memory stand-in for the kernel's `bpf(2)` interface.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashSet;
use std::ffi::CStr;
use std::os::fd::{AsRawFd, RawFd};
use std::rc::Rc;

use bpf_abi::{BpfCmd, MapDef, MapType};
use bpf_bytecode::bytecode::insn::{BpfInsn, PSEUDO_MAP_FD};
use bpf_bytecode::bytecode::program::BpfProgType;
use bpf_probe::{BpfSys, SysError};

/// One call the probe engine made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateMap(MapType),
    Load {
        prog_type: BpfProgType,
        insns: Vec<BpfInsn>,
        with_log: bool,
    },
}

#[derive(Debug, Default)]
struct State {
    next_fd: RawFd,
    live: HashSet<RawFd>,
    calls: Vec<Call>,
}

/// Fake kernel: rejects configured map and program types, and any program
/// that references a map descriptor which is not open.
#[derive(Debug, Clone)]
pub struct FakeKernel {
    state: Rc<RefCell<State>>,
    missing_maps: Vec<MapType>,
    missing_progs: Vec<BpfProgType>,
    zero_fd_loads: bool,
    reject_logged_loads: bool,
}

impl Default for FakeKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeKernel {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                next_fd: 3,
                ..Default::default()
            })),
            missing_maps: Vec::new(),
            missing_progs: Vec::new(),
            zero_fd_loads: false,
            reject_logged_loads: false,
        }
    }

    pub fn without_map(mut self, map_type: MapType) -> Self {
        self.missing_maps.push(map_type);
        self
    }

    pub fn without_prog(mut self, prog_type: BpfProgType) -> Self {
        self.missing_progs.push(prog_type);
        self
    }

    /// Successful loads hand out descriptor 0.
    pub fn zero_fd_loads(mut self) -> Self {
        self.zero_fd_loads = true;
        self
    }

    /// Loads with a verifier log attached always fail with `EACCES`.
    pub fn reject_logged_loads(mut self) -> Self {
        self.reject_logged_loads = true;
        self
    }

    /// Descriptors currently open.
    pub fn open_handles(&self) -> usize {
        self.state.borrow().live.len()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn map_calls(&self) -> Vec<MapType> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::CreateMap(map_type) => Some(map_type),
                Call::Load { .. } => None,
            })
            .collect()
    }

    pub fn load_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Load { .. }))
            .count()
    }

    fn open(&self) -> FakeFd {
        let mut state = self.state.borrow_mut();
        let fd = state.next_fd;
        state.next_fd += 1;
        state.live.insert(fd);
        FakeFd {
            fd,
            state: Some(Rc::clone(&self.state)),
        }
    }

    fn verdict(&self, prog_type: BpfProgType, insns: &[BpfInsn]) -> Result<(), (i32, String)> {
        if self.missing_progs.contains(&prog_type) {
            return Err((libc::EINVAL, format!("unknown program type {:?}\n", prog_type)));
        }

        let state = self.state.borrow();
        for insn in insns {
            let map_ref = insn.is_wide() && insn.src_reg() == PSEUDO_MAP_FD;
            if map_ref && !state.live.contains(&insn.imm) {
                let text = format!("fd {} is not pointing to valid bpf_map\n", insn.imm);
                return Err((libc::EBADF, text));
            }
            if insn.is_exit() {
                return Ok(());
            }
        }
        Err((libc::EINVAL, "last insn is not an exit or jmp\n".to_string()))
    }
}

fn write_log(log: &mut [u8], text: &str) {
    let len = text.len().min(log.len() - 1);
    log[..len].copy_from_slice(&text.as_bytes()[..len]);
    log[len] = 0;
}

impl BpfSys for FakeKernel {
    type Handle = FakeFd;

    fn create_map(&self, def: &MapDef) -> Result<FakeFd, SysError> {
        self.state.borrow_mut().calls.push(Call::CreateMap(def.map_type));
        if self.missing_maps.contains(&def.map_type) {
            return Err(SysError::new(BpfCmd::MapCreate, libc::EINVAL));
        }
        Ok(self.open())
    }

    fn load_program(
        &self,
        prog_type: BpfProgType,
        insns: &[BpfInsn],
        license: &CStr,
        log: Option<&mut [u8]>,
    ) -> Result<FakeFd, SysError> {
        assert_eq!(license, c"GPL");
        let log = log.filter(|log| !log.is_empty());
        self.state.borrow_mut().calls.push(Call::Load {
            prog_type,
            insns: insns.to_vec(),
            with_log: log.is_some(),
        });

        let verdict = match self.verdict(prog_type, insns) {
            Ok(()) if self.reject_logged_loads && log.is_some() => {
                Err((libc::EACCES, "reload refused\n".to_string()))
            }
            other => other,
        };

        match verdict {
            Ok(()) => {
                if let Some(log) = log {
                    write_log(log, &format!("processed {} insns\n", insns.len()));
                }
                if self.zero_fd_loads {
                    return Ok(FakeFd { fd: 0, state: None });
                }
                Ok(self.open())
            }
            Err((errno, text)) => {
                if let Some(log) = log {
                    write_log(log, &text);
                }
                Err(SysError::new(BpfCmd::ProgLoad, errno))
            }
        }
    }
}

/// Descriptor handed out by [`FakeKernel`]; closes itself on drop.
#[derive(Debug)]
pub struct FakeFd {
    fd: RawFd,
    state: Option<Rc<RefCell<State>>>,
}

impl AsRawFd for FakeFd {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for FakeFd {
    fn drop(&mut self) {
        if let Some(state) = &self.state {
            let closed = state.borrow_mut().live.remove(&self.fd);
            assert!(closed, "descriptor {} closed twice", self.fd);
        }
    }
}
