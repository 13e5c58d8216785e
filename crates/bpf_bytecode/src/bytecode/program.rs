//! BPF Program Representation
//!
//! A [`BpfProgram`] is an owned, explicit-length instruction sequence plus
//! the program type it is loaded as. Probe tables hold borrowed `'static`
//! slices; every probe run builds a fresh `BpfProgram` from them so that
//! patching map descriptors never touches the shared table.

use alloc::vec::Vec;
use core::fmt;

use super::insn::BpfInsn;

/// BPF program types (`enum bpf_prog_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum BpfProgType {
    #[default]
    Unspec = 0,
    SocketFilter = 1,
    Kprobe = 2,
    SchedCls = 3,
    SchedAct = 4,
    Tracepoint = 5,
    Xdp = 6,
    PerfEvent = 7,
    CgroupSkb = 8,
    CgroupSock = 9,
    LwtIn = 10,
    LwtOut = 11,
    LwtXmit = 12,
    SockOps = 13,
    SkSkb = 14,
    CgroupDevice = 15,
    SkMsg = 16,
    RawTracepoint = 17,
    CgroupSockAddr = 18,
    LwtSeg6Local = 19,
    LircMode2 = 20,
    SkReuseport = 21,
    FlowDissector = 22,
    CgroupSysctl = 23,
    RawTracepointWritable = 24,
    CgroupSockopt = 25,
    Tracing = 26,
    StructOps = 27,
    Ext = 28,
    Lsm = 29,
    SkLookup = 30,
    Syscall = 31,
    Netfilter = 32,
}

/// Owned BPF program ready to hand to the loader.
#[derive(Clone, PartialEq, Eq)]
pub struct BpfProgram {
    prog_type: BpfProgType,
    insns: Vec<BpfInsn>,
    name: Option<&'static str>,
}

impl BpfProgram {
    /// # Errors
    ///
    /// Returns [`ProgramError::EmptyProgram`] if `insns` is empty.
    pub fn new(prog_type: BpfProgType, insns: Vec<BpfInsn>) -> Result<Self, ProgramError> {
        if insns.is_empty() {
            return Err(ProgramError::EmptyProgram);
        }

        Ok(Self {
            prog_type,
            insns,
            name: None,
        })
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    #[inline]
    pub fn prog_type(&self) -> BpfProgType {
        self.prog_type
    }

    #[inline]
    pub fn instructions(&self) -> &[BpfInsn] {
        &self.insns
    }

    #[inline]
    pub fn insn_count(&self) -> usize {
        self.insns.len()
    }

    #[inline]
    pub fn name(&self) -> Option<&'static str> {
        self.name
    }

    /// Overwrite the immediate of the instruction at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range. Probe tables are static data and a
    /// bad index is an authoring error, not a runtime condition.
    pub fn patch_imm(&mut self, index: usize, imm: i32) {
        self.insns[index].imm = imm;
    }
}

impl fmt::Debug for BpfProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BpfProgram")
            .field("prog_type", &self.prog_type)
            .field("insn_count", &self.insns.len())
            .field("name", &self.name)
            .finish()
    }
}

/// Errors that can occur when building a BPF program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramError {
    /// No live instructions.
    EmptyProgram,
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyProgram => write!(f, "program has no instructions"),
        }
    }
}

impl core::error::Error for ProgramError {}

/// Number of live instructions in a fixed-capacity, zero-padded buffer.
///
/// Scans backwards for the last entry that is not [padding] and returns its
/// index plus one, or 0 when the whole buffer is padding. An all-zero
/// instruction placed on purpose at the end is indistinguishable from
/// padding; explicit-length slices do not have that problem.
///
/// [padding]: BpfInsn::is_padding
pub fn effective_length(buffer: &[BpfInsn]) -> usize {
    buffer
        .iter()
        .rposition(|insn| !insn.is_padding())
        .map_or(0, |last| last + 1)
}

/// Builder for constructing BPF programs.
pub struct ProgramBuilder {
    prog_type: BpfProgType,
    insns: Vec<BpfInsn>,
    name: Option<&'static str>,
}

impl ProgramBuilder {
    pub fn new(prog_type: BpfProgType) -> Self {
        Self {
            prog_type,
            insns: Vec::new(),
            name: None,
        }
    }

    /// Start from a fixed-capacity buffer, dropping its trailing padding.
    pub fn padded(prog_type: BpfProgType, buffer: &[BpfInsn]) -> Self {
        Self::new(prog_type).insns(buffer[..effective_length(buffer)].iter().copied())
    }

    pub fn name(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    pub fn insn(mut self, insn: BpfInsn) -> Self {
        self.insns.push(insn);
        self
    }

    pub fn insns(mut self, insns: impl IntoIterator<Item = BpfInsn>) -> Self {
        self.insns.extend(insns);
        self
    }

    pub fn exit(self) -> Self {
        self.insn(BpfInsn::exit())
    }

    /// # Errors
    ///
    /// Returns [`ProgramError::EmptyProgram`] if no instruction was added.
    pub fn build(self) -> Result<BpfProgram, ProgramError> {
        let mut program = BpfProgram::new(self.prog_type, self.insns)?;

        if let Some(name) = self.name {
            program = program.with_name(name);
        }

        Ok(program)
    }
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        Self::new(BpfProgType::Unspec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::insn::WideInsn;

    const CAPACITY: usize = 16;

    fn padded_buffer(live: &[BpfInsn]) -> [BpfInsn; CAPACITY] {
        let mut buffer = [BpfInsn::default(); CAPACITY];
        buffer[..live.len()].copy_from_slice(live);
        buffer
    }

    #[test]
    fn simple_program() {
        let program = ProgramBuilder::new(BpfProgType::SocketFilter)
            .name("test")
            .insn(BpfInsn::mov64_imm(0, 0))
            .exit()
            .build()
            .expect("valid program");

        assert_eq!(program.prog_type(), BpfProgType::SocketFilter);
        assert_eq!(program.insn_count(), 2);
        assert_eq!(program.name(), Some("test"));
    }

    #[test]
    fn empty_program_rejected() {
        let result = ProgramBuilder::new(BpfProgType::SocketFilter).build();
        assert_eq!(result, Err(ProgramError::EmptyProgram));
    }

    #[test]
    fn effective_length_of_all_padding_is_zero() {
        assert_eq!(effective_length(&[BpfInsn::default(); CAPACITY]), 0);
        assert_eq!(effective_length(&[]), 0);
    }

    #[test]
    fn effective_length_single_leading_insn() {
        let buffer = padded_buffer(&[BpfInsn::exit()]);
        assert_eq!(effective_length(&buffer), 1);
    }

    #[test]
    fn effective_length_is_deterministic() {
        let buffer = padded_buffer(&[BpfInsn::mov64_imm(0, 0), BpfInsn::exit()]);
        let first = effective_length(&buffer);
        assert_eq!(first, 2);
        assert_eq!(effective_length(&buffer), first);
    }

    #[test]
    fn effective_length_keeps_interior_zero_slots() {
        let wide = WideInsn::ld_map_fd(1);
        let buffer = padded_buffer(&[
            BpfInsn::mov64_imm(0, 0),
            wide.insn,
            wide.next,
            BpfInsn::exit(),
        ]);
        assert_eq!(effective_length(&buffer), 4);
    }

    #[test]
    fn effective_length_full_buffer() {
        let buffer = [BpfInsn::exit(); CAPACITY];
        assert_eq!(effective_length(&buffer), CAPACITY);
    }

    #[test]
    fn padded_builder_drops_tail() {
        let buffer = padded_buffer(&[BpfInsn::mov64_imm(0, 1), BpfInsn::exit()]);
        let program = ProgramBuilder::padded(BpfProgType::Xdp, &buffer)
            .build()
            .expect("valid program");
        assert_eq!(program.insn_count(), 2);
        assert!(program.instructions()[1].is_exit());
    }

    #[test]
    fn padded_builder_rejects_all_padding() {
        let result = ProgramBuilder::padded(BpfProgType::Xdp, &[BpfInsn::default(); 4]).build();
        assert_eq!(result, Err(ProgramError::EmptyProgram));
    }

    #[test]
    fn patch_imm_changes_only_the_target() {
        let wide = WideInsn::ld_map_fd(1);
        let mut program = ProgramBuilder::new(BpfProgType::SocketFilter)
            .insns([wide.insn, wide.next, BpfInsn::mov64_imm(0, 0), BpfInsn::exit()])
            .build()
            .expect("valid program");

        program.patch_imm(0, 7);
        assert_eq!(program.instructions()[0].imm, 7);
        assert_eq!(program.instructions()[1].imm, 0);
    }

    #[test]
    #[should_panic]
    fn patch_imm_out_of_range_panics() {
        let mut program = ProgramBuilder::new(BpfProgType::SocketFilter)
            .exit()
            .build()
            .expect("valid program");
        program.patch_imm(5, 1);
    }
}
