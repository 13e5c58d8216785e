//! Probes against the running kernel.
//!
//! These need `CAP_BPF` (or root) and are ignored by default:
//!
//! ```text
//! sudo -E cargo test --test kernel_probe -- --ignored --test-threads=1
//! ```

use std::fs;

use bpf_abi::MapType;
use bpf_bytecode::bytecode::insn::{BpfInsn, WideInsn};
use bpf_bytecode::bytecode::program::BpfProgType;
use bpf_probe::{
    LinuxBpf, MapFixup, MemlockGuard, ProbeConfig, ProbeDescriptor, ProbeOutcome, ProbeRunner,
    catalog,
};

const MAP_REF: WideInsn = WideInsn::ld_map_fd(1);

static RET_ZERO: [BpfInsn; 2] = [BpfInsn::mov64_imm(0, 0), BpfInsn::exit()];

static ONE_MAP: [BpfInsn; 4] = [
    BpfInsn::mov64_imm(0, 0),
    MAP_REF.insn,
    MAP_REF.next,
    BpfInsn::exit(),
];

static ARRAY_AT_1: [MapFixup; 1] = [MapFixup::new(1, MapType::Array, 4, 8)];

fn open_fds() -> usize {
    fs::read_dir("/proc/self/fd")
        .expect("procfs mounted")
        .count()
}

fn run(probes: &[ProbeDescriptor], verbose: bool) -> (Vec<ProbeOutcome>, String) {
    let config = ProbeConfig::default().verbose(verbose);
    let mut runner = ProbeRunner::new(LinuxBpf, config, Vec::new(), Vec::new());
    let outcomes = runner.run_all(probes).expect("in-memory writes succeed");
    let (out, _) = runner.into_writers();
    (outcomes, String::from_utf8(out).expect("utf-8 output"))
}

#[test]
#[ignore = "needs CAP_BPF"]
fn test_kernel_scenario() {
    let _memlock = MemlockGuard::raise().ok();
    let probes = [
        ProbeDescriptor::new("A", BpfProgType::SocketFilter, &RET_ZERO),
        ProbeDescriptor::new("B", BpfProgType::SocketFilter, &ONE_MAP).fixups(&ARRAY_AT_1),
        // No kernel loads programs of the unspecified type.
        ProbeDescriptor::new("C", BpfProgType::Unspec, &RET_ZERO),
    ];

    let baseline = open_fds();
    let (outcomes, out) = run(&probes, true);

    assert!(outcomes[0].is_supported());
    assert!(outcomes[1].is_supported());
    assert!(!outcomes[2].is_supported());
    assert!(out.contains("#define A\n"));
    assert!(out.contains("#define B\n"));
    assert!(out.contains("// #define C\n"));
    assert!(out.contains("C failed due to load error: "));
    assert_eq!(open_fds(), baseline);
}

#[test]
#[ignore = "needs CAP_BPF"]
fn test_catalog_closes_every_descriptor() {
    let _memlock = MemlockGuard::raise().ok();
    let baseline = open_fds();

    let (quiet, quiet_out) = run(catalog::probes(), false);
    assert_eq!(open_fds(), baseline);

    let (verbose, verbose_out) = run(catalog::probes(), true);
    assert_eq!(open_fds(), baseline);

    assert_eq!(quiet, verbose);
    let flags = |out: &str| -> Vec<String> {
        out.lines()
            .filter(|line| line.contains("#define"))
            .map(str::to_string)
            .collect()
    };
    assert_eq!(flags(&quiet_out), flags(&verbose_out));
}
