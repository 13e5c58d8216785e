//! Map fixups.
//!
//! Probe programs reference maps by file descriptor, which only exists once
//! the map is created. The resolver creates each map a descriptor lists and
//! writes the descriptor into the referencing instruction's immediate.

use std::os::fd::AsRawFd;

use bpf_bytecode::bytecode::program::BpfProgram;
use log::debug;

use crate::descriptor::MapFixup;
use crate::error::SysError;
use crate::sys::BpfSys;

/// A fixup whose map could not be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixupFailure {
    /// Position of the failed entry in the fixup list.
    pub index: usize,
    pub error: SysError,
}

/// Maps created for one probe run.
///
/// The maps stay alive for as long as this value does; the program that
/// references them must be loaded (and any diagnostic reload done) before it
/// is dropped.
#[derive(Debug)]
pub struct FixupResolution<H> {
    pub maps: Vec<H>,
    pub failure: Option<FixupFailure>,
}

/// Create the maps listed in `fixups`, in order, patching each descriptor
/// into `program`.
///
/// Stops at the first entry with offset zero, or at the first map that cannot
/// be created. A failure is not an error here: the load that follows will be
/// rejected for referencing a missing map, and that rejection is what gets
/// reported.
///
/// # Panics
///
/// Panics if a fixup offset is outside the program.
pub fn resolve<S: BpfSys>(
    sys: &S,
    fixups: &[MapFixup],
    program: &mut BpfProgram,
    max_entries: u32,
) -> FixupResolution<S::Handle> {
    let mut maps = Vec::with_capacity(fixups.len());

    for (index, fixup) in fixups.iter().enumerate() {
        if fixup.is_terminator() {
            break;
        }

        match sys.create_map(&fixup.map_def(max_entries)) {
            Ok(map) => {
                debug!(
                    "fixup {}: {:?} map fd {} -> insn {}",
                    index,
                    fixup.map_type,
                    map.as_raw_fd(),
                    fixup.offset
                );
                program.patch_imm(fixup.offset, map.as_raw_fd());
                maps.push(map);
            }
            Err(error) => {
                debug!("fixup {}: {:?} map rejected: {}", index, fixup.map_type, error);
                return FixupResolution {
                    maps,
                    failure: Some(FixupFailure { index, error }),
                };
            }
        }
    }

    FixupResolution {
        maps,
        failure: None,
    }
}
