//! Built-in probe table.
//!
//! Each entry is a minimal program that only loads on kernels with the
//! feature named by its flag. Programs return 0 and touch nothing beyond
//! their own stack, the context and the maps they create.

use bpf_abi::{MapFlags, MapType};
use bpf_bytecode::bytecode::insn::{BpfInsn, FP, WideInsn};
use bpf_bytecode::bytecode::opcode::{AluOp, JmpOp, MemSize};
use bpf_bytecode::bytecode::program::BpfProgType;

use crate::descriptor::{MapFixup, ProbeDescriptor};

/// Kernel helper numbers (`enum bpf_func_id`).
mod helper {
    pub const MAP_LOOKUP_ELEM: i32 = 1;
    pub const GET_PRANDOM_U32: i32 = 7;
    pub const SKB_CHANGE_TAIL: i32 = 38;
    pub const GET_SOCKET_COOKIE: i32 = 46;
    pub const JIFFIES64: i32 = 118;
    pub const KTIME_GET_BOOT_NS: i32 = 125;
    pub const CSUM_LEVEL: i32 = 135;
}

const XDP_PASS: i32 = 2;

const MAP_REF: WideInsn = WideInsn::ld_map_fd(1);

/// Index of the map reference in [`MAP_LOOKUP`].
const MAP_LOOKUP_FIXUP: usize = 3;

/// `bpf_map_lookup_elem(map, &zero_key)` with an 8-byte key on the stack.
const MAP_LOOKUP: [BpfInsn; 8] = [
    BpfInsn::st_mem(MemSize::DWord, FP, -8, 0),
    BpfInsn::mov64_reg(2, FP),
    BpfInsn::add64_imm(2, -8),
    MAP_REF.insn,
    MAP_REF.next,
    BpfInsn::call(helper::MAP_LOOKUP_ELEM),
    BpfInsn::mov64_imm(0, 0),
    BpfInsn::exit(),
];

const LRU_HASH: [MapFixup; 1] = [MapFixup::new(MAP_LOOKUP_FIXUP, MapType::LruHash, 8, 8)];

const LRU_PERCPU_HASH: [MapFixup; 1] =
    [MapFixup::new(MAP_LOOKUP_FIXUP, MapType::LruPerCpuHash, 8, 8)];

const LPM_TRIE: [MapFixup; 1] = [MapFixup::new(MAP_LOOKUP_FIXUP, MapType::LpmTrie, 8, 8)
    .with_flags(MapFlags::NO_PREALLOC)];

const RET_XDP_PASS: [BpfInsn; 2] = [BpfInsn::mov64_imm(0, XDP_PASS), BpfInsn::exit()];

const RET_ZERO: [BpfInsn; 2] = [BpfInsn::mov64_imm(0, 0), BpfInsn::exit()];

const JMP32: [BpfInsn; 4] = [
    BpfInsn::mov64_imm(0, 0),
    BpfInsn::jmp32_imm(JmpOp::Jeq, 0, 0, 1),
    BpfInsn::mov64_imm(0, 1),
    BpfInsn::exit(),
];

const ALU32_ARSH: [BpfInsn; 4] = [
    BpfInsn::mov64_imm(0, -1),
    BpfInsn::alu32_imm(AluOp::Arsh, 0, 1),
    BpfInsn::mov64_imm(0, 0),
    BpfInsn::exit(),
];

const ATOMIC_FETCH: [BpfInsn; 5] = [
    BpfInsn::st_mem(MemSize::DWord, FP, -8, 0),
    BpfInsn::mov64_imm(1, 1),
    BpfInsn::atomic_fetch_add(MemSize::DWord, FP, 1, -8),
    BpfInsn::mov64_imm(0, 0),
    BpfInsn::exit(),
];

const CALL_PRANDOM: [BpfInsn; 3] = [
    BpfInsn::call(helper::GET_PRANDOM_U32),
    BpfInsn::mov64_imm(0, 0),
    BpfInsn::exit(),
];

const CALL_JIFFIES64: [BpfInsn; 3] = [
    BpfInsn::call(helper::JIFFIES64),
    BpfInsn::mov64_imm(0, 0),
    BpfInsn::exit(),
];

const CALL_KTIME_BOOT: [BpfInsn; 3] = [
    BpfInsn::call(helper::KTIME_GET_BOOT_NS),
    BpfInsn::mov64_imm(0, 0),
    BpfInsn::exit(),
];

// r1 holds the skb context on entry for all skb helpers below.
const CALL_SKB_CHANGE_TAIL: [BpfInsn; 5] = [
    BpfInsn::mov64_imm(2, 0),
    BpfInsn::mov64_imm(3, 0),
    BpfInsn::call(helper::SKB_CHANGE_TAIL),
    BpfInsn::mov64_imm(0, 0),
    BpfInsn::exit(),
];

const CALL_SOCKET_COOKIE: [BpfInsn; 3] = [
    BpfInsn::call(helper::GET_SOCKET_COOKIE),
    BpfInsn::mov64_imm(0, 0),
    BpfInsn::exit(),
];

const CALL_CSUM_LEVEL: [BpfInsn; 4] = [
    // BPF_CSUM_LEVEL_QUERY
    BpfInsn::mov64_imm(2, 0),
    BpfInsn::call(helper::CSUM_LEVEL),
    BpfInsn::mov64_imm(0, 0),
    BpfInsn::exit(),
];

static PROBES: [ProbeDescriptor; 16] = [
    // Map types
    ProbeDescriptor::new("HAVE_LRU_MAP_TYPE", BpfProgType::SchedCls, &MAP_LOOKUP)
        .fixups(&LRU_HASH)
        .warn("LRU maps unavailable, falling back to regular hash maps"),
    ProbeDescriptor::new("HAVE_LRU_PERCPU_MAP_TYPE", BpfProgType::SchedCls, &MAP_LOOKUP)
        .fixups(&LRU_PERCPU_HASH),
    ProbeDescriptor::new("HAVE_LPM_MAP_TYPE", BpfProgType::SchedCls, &MAP_LOOKUP)
        .fixups(&LPM_TRIE)
        .warn("LPM trie maps unavailable, prefix matching disabled"),
    // Program types
    ProbeDescriptor::new("HAVE_XDP_PROG_TYPE", BpfProgType::Xdp, &RET_XDP_PASS),
    ProbeDescriptor::new("HAVE_SK_MSG_PROG_TYPE", BpfProgType::SkMsg, &RET_ZERO),
    ProbeDescriptor::new("HAVE_FLOW_DISSECTOR_PROG_TYPE", BpfProgType::FlowDissector, &RET_ZERO),
    ProbeDescriptor::new("HAVE_CGROUP_SKB_PROG_TYPE", BpfProgType::CgroupSkb, &RET_ZERO),
    // Instructions
    ProbeDescriptor::new("HAVE_JMP32", BpfProgType::SocketFilter, &JMP32),
    ProbeDescriptor::new("HAVE_ALU32_ARSH", BpfProgType::SocketFilter, &ALU32_ARSH),
    ProbeDescriptor::new("HAVE_ATOMIC_FETCH", BpfProgType::SocketFilter, &ATOMIC_FETCH),
    // Helpers
    ProbeDescriptor::new("HAVE_GET_PRANDOM_U32", BpfProgType::SocketFilter, &CALL_PRANDOM),
    ProbeDescriptor::new("HAVE_JIFFIES64", BpfProgType::SchedCls, &CALL_JIFFIES64),
    ProbeDescriptor::new("HAVE_KTIME_GET_BOOT_NS", BpfProgType::SchedCls, &CALL_KTIME_BOOT),
    ProbeDescriptor::new("HAVE_SKB_CHANGE_TAIL", BpfProgType::SchedCls, &CALL_SKB_CHANGE_TAIL)
        .warn("bpf_skb_change_tail() unavailable, packet trimming disabled"),
    ProbeDescriptor::new("HAVE_CSUM_LEVEL", BpfProgType::SchedCls, &CALL_CSUM_LEVEL),
    ProbeDescriptor::new("HAVE_GET_SOCKET_COOKIE", BpfProgType::SchedCls, &CALL_SOCKET_COOKIE),
];

/// The full built-in table, in output order.
pub fn probes() -> &'static [ProbeDescriptor] {
    &PROBES
}

/// Entries of [`probes`] whose flag is in `names`, keeping table order.
/// An empty `names` selects everything.
pub fn select(names: &[String]) -> Vec<ProbeDescriptor> {
    probes()
        .iter()
        .filter(|probe| names.is_empty() || names.iter().any(|name| name == probe.emits))
        .copied()
        .collect()
}
