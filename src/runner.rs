//! Probe runner.
//!
//! Each probe goes through the same fixed sequence, with no retries:
//!
//! ```text
//! copy program -> create maps -> load -> classify -> report -> close all
//! ```
//!
//! A failing probe only ever produces a commented-out flag; the runner moves
//! on to the next descriptor regardless.

use std::fmt;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, RawFd};

use bpf_bytecode::bytecode::program::ProgramError;
use log::{debug, info, trace};

use crate::config::ProbeConfig;
use crate::descriptor::ProbeDescriptor;
use crate::error::SysError;
use crate::fixup::{self, FixupFailure};
use crate::report::Reporter;
use crate::sys::BpfSys;

/// Result of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Supported,
    Unsupported(Rejection),
}

impl ProbeOutcome {
    #[inline]
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Supported)
    }
}

/// Why a probe came out unsupported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The descriptor has no program to load; the kernel was not asked.
    Program(ProgramError),
    /// A referenced map could not be created and the load then failed.
    MapSetup { fixup: FixupFailure, load: SysError },
    /// The kernel refused the program.
    Load(SysError),
    /// The kernel reported success with a descriptor that is not positive.
    InvalidHandle(RawFd),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Program(err) => write!(f, "{}", err),
            Self::MapSetup { fixup, load } => {
                write!(f, "fixup {}: {}; {}", fixup.index, fixup.error, load)
            }
            Self::Load(err) => write!(f, "{}", err),
            Self::InvalidHandle(fd) => write!(f, "load returned descriptor {}", fd),
        }
    }
}

/// Runs probe descriptors against a [`BpfSys`] and reports each result.
pub struct ProbeRunner<S, O, E> {
    sys: S,
    config: ProbeConfig,
    reporter: Reporter<O, E>,
}

impl<S: BpfSys, O: Write, E: Write> ProbeRunner<S, O, E> {
    pub fn new(sys: S, config: ProbeConfig, out: O, err: E) -> Self {
        let reporter = Reporter::new(out, err, config.clone());
        Self {
            sys,
            config,
            reporter,
        }
    }

    /// Give back the output streams.
    pub fn into_writers(self) -> (O, E) {
        self.reporter.into_inner()
    }

    /// Run every probe in table order.
    ///
    /// # Errors
    ///
    /// Only fails when writing to the output streams fails.
    pub fn run_all(&mut self, probes: &[ProbeDescriptor]) -> io::Result<Vec<ProbeOutcome>> {
        probes.iter().map(|probe| self.run(probe)).collect()
    }

    /// Run one probe. Every map and program descriptor it opens is closed
    /// before this returns.
    ///
    /// # Errors
    ///
    /// Only fails when writing to the output streams fails.
    pub fn run(&mut self, probe: &ProbeDescriptor) -> io::Result<ProbeOutcome> {
        let mut program = match probe.program() {
            Ok(program) => program,
            Err(err) => {
                debug!("{}: {}", probe.emits, err);
                let outcome = ProbeOutcome::Unsupported(Rejection::Program(err));
                self.reporter.report(&self.sys, probe, None, &outcome)?;
                return Ok(outcome);
            }
        };

        let maps = fixup::resolve(&self.sys, probe.fixups, &mut program, self.config.map_max_entries);
        if let Some(failure) = &maps.failure {
            if self.config.verbose {
                self.reporter.fixup_failed(probe, failure)?;
            }
        }

        debug!(
            "{}: loading {:?} program, {} insns",
            probe.emits,
            program.prog_type(),
            program.insn_count()
        );
        for (idx, insn) in program.instructions().iter().enumerate() {
            trace!("{}: {:3}: {}", probe.emits, idx, insn);
        }

        let loaded = self.sys.load_program(
            program.prog_type(),
            program.instructions(),
            &self.config.license,
            None,
        );

        let outcome = match &loaded {
            Ok(prog) if prog.as_raw_fd() > 0 => ProbeOutcome::Supported,
            Ok(prog) => ProbeOutcome::Unsupported(Rejection::InvalidHandle(prog.as_raw_fd())),
            Err(load) => ProbeOutcome::Unsupported(match maps.failure {
                Some(fixup) => Rejection::MapSetup { fixup, load: *load },
                None => Rejection::Load(*load),
            }),
        };

        match &outcome {
            ProbeOutcome::Supported => info!("{}: supported", probe.emits),
            ProbeOutcome::Unsupported(why) => info!("{}: unsupported ({})", probe.emits, why),
        }

        // Maps stay open through the report so the diagnostic reload sees
        // the same descriptors.
        self.reporter.report(&self.sys, probe, Some(&program), &outcome)?;

        drop(loaded);
        drop(maps);

        Ok(outcome)
    }
}
