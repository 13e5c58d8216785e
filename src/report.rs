//! Header output.
//!
//! Every probe yields one `#define` line, commented out when the probe
//! failed. Diagnostics go inside `#if 0` blocks so the output stays a valid
//! header.

use std::io::{self, Write};

use bpf_bytecode::bytecode::program::BpfProgram;

use crate::config::ProbeConfig;
use crate::descriptor::ProbeDescriptor;
use crate::error::errno_text;
use crate::fixup::FixupFailure;
use crate::runner::ProbeOutcome;
use crate::sys::BpfSys;

/// Writes flag lines and diagnostics for each probe.
///
/// `out` receives the header; `err` receives human-directed warnings.
pub struct Reporter<O, E> {
    out: O,
    err: E,
    config: ProbeConfig,
}

impl<O: Write, E: Write> Reporter<O, E> {
    pub fn new(out: O, err: E, config: ProbeConfig) -> Self {
        Self { out, err, config }
    }

    pub fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }

    /// Note a map that could not be created for `probe`.
    pub fn fixup_failed(&mut self, probe: &ProbeDescriptor, failure: &FixupFailure) -> io::Result<()> {
        writeln!(self.out, "#if 0")?;
        writeln!(self.out, "{}: {}", probe.emits, failure.error)?;
        writeln!(self.out, "#endif")?;
        writeln!(self.out)
    }

    /// Emit the flag line for `probe` and, when the probe failed or verbose
    /// output is on, a diagnostic block.
    ///
    /// The diagnostic block comes from loading `program` a second time with a
    /// verifier log attached. That reload only feeds the transcript; its
    /// result never changes `outcome`.
    pub fn report<S: BpfSys>(
        &mut self,
        sys: &S,
        probe: &ProbeDescriptor,
        program: Option<&BpfProgram>,
        outcome: &ProbeOutcome,
    ) -> io::Result<()> {
        let supported = outcome.is_supported();
        let prefix = if supported { "" } else { "// " };
        writeln!(self.out, "{}#define {}", prefix, probe.emits)?;
        writeln!(self.out)?;

        if !supported || self.config.verbose {
            self.diagnose(sys, probe, program, outcome)?;
        }

        if !supported {
            if let Some(warn) = probe.warn {
                writeln!(self.err, "{}: {}", probe.emits, warn)?;
            }
        }

        Ok(())
    }

    fn diagnose<S: BpfSys>(
        &mut self,
        sys: &S,
        probe: &ProbeDescriptor,
        program: Option<&BpfProgram>,
        outcome: &ProbeOutcome,
    ) -> io::Result<()> {
        writeln!(self.out, "#if 0")?;

        let Some(program) = program else {
            // Nothing to reload; the rejection happened before the kernel.
            if let ProbeOutcome::Unsupported(rejection) = outcome {
                writeln!(self.out, "{} failed: {}", probe.emits, rejection)?;
            }
            writeln!(self.out, "#endif")?;
            return writeln!(self.out);
        };

        let what = if outcome.is_supported() {
            "debug output"
        } else {
            "failed due to load error"
        };

        let mut log = vec![0u8; self.config.log_size as usize];
        let reload = sys.load_program(
            program.prog_type(),
            program.instructions(),
            &self.config.license,
            Some(log.as_mut_slice()),
        );
        let text = match &reload {
            Ok(_) => errno_text(0),
            Err(error) => error.text(),
        };
        drop(reload);

        writeln!(self.out, "{} {}: {}", probe.emits, what, text)?;

        let transcript = verifier_log(&log);
        if !transcript.is_empty() {
            self.out.write_all(transcript.as_bytes())?;
            if !transcript.ends_with('\n') {
                writeln!(self.out)?;
            }
        }

        writeln!(self.out, "#endif")?;
        writeln!(self.out)
    }
}

/// The NUL-terminated text the kernel left in a verifier log buffer.
fn verifier_log(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}
