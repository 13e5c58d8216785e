//! bpf-probe
//!
//! Prints the eBPF features of the running kernel as a C header on stdout.
//! A trailing `debug` includes the verifier transcript for every probe. Any
//! other trailing words are ignored.

use std::io::{self, Write};

use anyhow::{Context, Result};
use bpf_probe::config::{DEFAULT_LOG_SIZE, MAX_LOG_SIZE, MIN_LOG_SIZE};
use bpf_probe::{LinuxBpf, MemlockGuard, ProbeConfig, ProbeRunner, catalog};
use clap::Parser;
use log::{info, warn};

#[derive(Parser)]
#[command(name = "bpf-probe")]
#[command(version)]
#[command(about = "Probe the running kernel for eBPF features", long_about = None)]
struct Cli {
    /// Run mode; verbose when the last word is `debug`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    mode: Vec<String>,

    /// Same as the `debug` mode
    #[arg(short, long)]
    verbose: bool,

    /// Verifier log buffer size in bytes (0 disables the transcript)
    #[arg(
        long,
        env = "BPF_PROBE_LOG_SIZE",
        default_value_t = DEFAULT_LOG_SIZE,
        value_parser = parse_log_size
    )]
    log_size: u32,

    /// Only run the probe emitting this flag (repeatable)
    #[arg(short, long = "probe", value_name = "NAME")]
    probes: Vec<String>,

    /// List the flags of all built-in probes and exit
    #[arg(short, long)]
    list: bool,
}

impl Cli {
    fn config(&self) -> ProbeConfig {
        let verbose = self.verbose || self.mode.last().is_some_and(|word| word == "debug");
        ProbeConfig::default()
            .verbose(verbose)
            .log_size(self.log_size)
    }
}

fn parse_log_size(arg: &str) -> Result<u32, String> {
    let size: u32 = arg
        .parse()
        .map_err(|err| format!("not a buffer size: {}", err))?;
    if size != 0 && !(MIN_LOG_SIZE..=MAX_LOG_SIZE).contains(&size) {
        return Err(format!(
            "must be 0 or between {} and {}",
            MIN_LOG_SIZE, MAX_LOG_SIZE
        ));
    }
    Ok(size)
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    if cli.list {
        let mut out = io::stdout().lock();
        for probe in catalog::probes() {
            writeln!(out, "{}", probe.emits).context("failed to write probe list")?;
        }
        return Ok(());
    }

    for name in &cli.probes {
        if !catalog::probes().iter().any(|probe| probe.emits == *name) {
            warn!("no built-in probe emits {}", name);
        }
    }
    let probes = catalog::select(&cli.probes);

    let _memlock = match MemlockGuard::raise() {
        Ok(guard) => Some(guard),
        Err(err) => {
            warn!("{}; probes may fail for lack of locked memory", err);
            None
        }
    };

    let stdout = io::stdout();
    let stderr = io::stderr();
    let mut runner = ProbeRunner::new(LinuxBpf, cli.config(), stdout.lock(), stderr.lock());

    let outcomes = runner
        .run_all(&probes)
        .context("failed to write probe results")?;

    let (mut out, _) = runner.into_writers();
    out.flush().context("failed to flush stdout")?;

    let supported = outcomes.iter().filter(|outcome| outcome.is_supported()).count();
    info!("{} of {} probes supported", supported, outcomes.len());

    Ok(())
}
