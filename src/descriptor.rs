//! Probe table entries.

use bpf_abi::{MapDef, MapFlags, MapType};
use bpf_bytecode::bytecode::insn::BpfInsn;
use bpf_bytecode::bytecode::program::{BpfProgType, BpfProgram, ProgramBuilder, ProgramError};

/// A map a probe program references, created right before loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapFixup {
    /// Index of the instruction whose immediate receives the map descriptor.
    /// Zero ends the fixup list: the first instruction is never a target.
    pub offset: usize,
    pub map_type: MapType,
    pub key_size: u32,
    pub value_size: u32,
    pub flags: MapFlags,
}

impl MapFixup {
    pub const fn new(offset: usize, map_type: MapType, key_size: u32, value_size: u32) -> Self {
        Self {
            offset,
            map_type,
            key_size,
            value_size,
            flags: MapFlags::empty(),
        }
    }

    pub const fn with_flags(mut self, flags: MapFlags) -> Self {
        self.flags = flags;
        self
    }

    #[inline]
    pub const fn is_terminator(&self) -> bool {
        self.offset == 0
    }

    /// Map definition for this fixup with room for `max_entries` elements.
    pub const fn map_def(&self, max_entries: u32) -> MapDef {
        MapDef::new(self.map_type, self.key_size, self.value_size, max_entries)
            .with_flags(self.flags)
    }
}

/// One kernel capability to probe.
///
/// Descriptors are static data. Running a probe never mutates them; see
/// [`ProbeDescriptor::program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeDescriptor {
    /// Feature flag emitted as `#define <emits>` when the probe passes.
    pub emits: &'static str,
    pub prog_type: BpfProgType,
    pub insns: &'static [BpfInsn],
    pub fixups: &'static [MapFixup],
    /// Printed to stderr when the probe fails.
    pub warn: Option<&'static str>,
}

impl ProbeDescriptor {
    pub const fn new(emits: &'static str, prog_type: BpfProgType, insns: &'static [BpfInsn]) -> Self {
        Self {
            emits,
            prog_type,
            insns,
            fixups: &[],
            warn: None,
        }
    }

    pub const fn fixups(mut self, fixups: &'static [MapFixup]) -> Self {
        self.fixups = fixups;
        self
    }

    pub const fn warn(mut self, warn: &'static str) -> Self {
        self.warn = Some(warn);
        self
    }

    /// Fresh owned copy of the probe program, ready for fixups.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::EmptyProgram`] for a descriptor without
    /// instructions.
    pub fn program(&self) -> Result<BpfProgram, ProgramError> {
        ProgramBuilder::new(self.prog_type)
            .name(self.emits)
            .insns(self.insns.iter().copied())
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static RET_ZERO: [BpfInsn; 2] = [BpfInsn::mov64_imm(0, 0), BpfInsn::exit()];

    #[test]
    fn program_is_an_independent_copy() {
        let probe = ProbeDescriptor::new("HAVE_X", BpfProgType::SocketFilter, &RET_ZERO);

        let mut first = probe.program().expect("valid program");
        first.patch_imm(0, 99);

        let second = probe.program().expect("valid program");
        assert_eq!(second.instructions()[0].imm, 0);
        assert_eq!(RET_ZERO[0].imm, 0);
        assert_eq!(second.name(), Some("HAVE_X"));
    }

    #[test]
    fn empty_descriptor_has_no_program() {
        let probe = ProbeDescriptor::new("HAVE_NOTHING", BpfProgType::SocketFilter, &[]);
        assert_eq!(probe.program(), Err(ProgramError::EmptyProgram));
    }

    #[test]
    fn fixup_map_def_carries_flags() {
        let fixup = MapFixup::new(3, MapType::LpmTrie, 8, 8).with_flags(MapFlags::NO_PREALLOC);
        let def = fixup.map_def(1);
        assert_eq!(def.max_entries, 1);
        assert_eq!(def.flags, MapFlags::NO_PREALLOC);
        assert!(!fixup.is_terminator());
        assert!(MapFixup::new(0, MapType::Hash, 4, 4).is_terminator());
    }
}
