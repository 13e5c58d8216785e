use core::fmt;
use core::mem::size_of;

use bitflags::bitflags;

/// `bpf(2)` commands issued by the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum BpfCmd {
    MapCreate = 0,
    ProgLoad = 5,
}

impl BpfCmd {
    /// Name of the libbpf-style wrapper, used in diagnostics.
    pub const fn wrapper_name(self) -> &'static str {
        match self {
            Self::MapCreate => "bpf_map_create",
            Self::ProgLoad => "bpf_prog_load",
        }
    }
}

impl fmt::Display for BpfCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wrapper_name())
    }
}

/// Kernel map types (`enum bpf_map_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MapType {
    Unspec = 0,
    Hash = 1,
    Array = 2,
    ProgArray = 3,
    PerfEventArray = 4,
    PerCpuHash = 5,
    PerCpuArray = 6,
    StackTrace = 7,
    CgroupArray = 8,
    LruHash = 9,
    LruPerCpuHash = 10,
    LpmTrie = 11,
    ArrayOfMaps = 12,
    HashOfMaps = 13,
    DevMap = 14,
    SockMap = 15,
    CpuMap = 16,
    XskMap = 17,
    SockHash = 18,
    CgroupStorage = 19,
    ReuseportSockArray = 20,
    PerCpuCgroupStorage = 21,
    Queue = 22,
    Stack = 23,
    SkStorage = 24,
    DevMapHash = 25,
    StructOps = 26,
    RingBuf = 27,
    InodeStorage = 28,
    TaskStorage = 29,
    BloomFilter = 30,
}

bitflags! {
    /// Map creation flags (`map_flags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MapFlags: u32 {
        const NO_PREALLOC    = 1 << 0;
        const NO_COMMON_LRU  = 1 << 1;
        const NUMA_NODE      = 1 << 2;
        const RDONLY         = 1 << 3;
        const WRONLY         = 1 << 4;
        const STACK_BUILD_ID = 1 << 5;
        const ZERO_SEED      = 1 << 6;
        const RDONLY_PROG    = 1 << 7;
        const WRONLY_PROG    = 1 << 8;
        const CLONE          = 1 << 9;
        const MMAPABLE       = 1 << 10;
    }
}

/// Map definition handed to `BPF_MAP_CREATE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapDef {
    pub map_type: MapType,
    pub key_size: u32,
    pub value_size: u32,
    pub max_entries: u32,
    pub flags: MapFlags,
}

impl MapDef {
    pub const fn new(map_type: MapType, key_size: u32, value_size: u32, max_entries: u32) -> Self {
        Self {
            map_type,
            key_size,
            value_size,
            max_entries,
            flags: MapFlags::empty(),
        }
    }

    pub const fn with_flags(mut self, flags: MapFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// `BPF_MAP_CREATE` view of `union bpf_attr`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct MapCreateAttr {
    pub map_type: u32,
    pub key_size: u32,
    pub value_size: u32,
    pub max_entries: u32,
    pub map_flags: u32,
    pub inner_map_fd: u32,
    pub numa_node: u32,
    pub map_name: [u8; 16],
    pub map_ifindex: u32,
}

impl From<&MapDef> for MapCreateAttr {
    fn from(def: &MapDef) -> Self {
        Self {
            map_type: def.map_type as u32,
            key_size: def.key_size,
            value_size: def.value_size,
            max_entries: def.max_entries,
            map_flags: def.flags.bits(),
            ..Default::default()
        }
    }
}

/// `BPF_PROG_LOAD` view of `union bpf_attr`.
///
/// Pointers travel as `u64` regardless of the target's pointer width.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgLoadAttr {
    pub prog_type: u32,
    pub insn_cnt: u32,
    pub insns: u64,
    pub license: u64,
    pub log_level: u32,
    pub log_size: u32,
    pub log_buf: u64,
    pub kern_version: u32,
    pub prog_flags: u32,
    pub prog_name: [u8; 16],
    pub prog_ifindex: u32,
    pub expected_attach_type: u32,
    pub prog_btf_fd: u32,
    pub func_info_rec_size: u32,
    pub func_info: u64,
    pub func_info_cnt: u32,
    pub line_info_rec_size: u32,
    pub line_info: u64,
    pub line_info_cnt: u32,
    pub attach_btf_id: u32,
    pub attach_prog_fd: u32,
    pub core_relo_cnt: u32,
}

/// Verifier log level requesting the instruction-by-instruction transcript.
pub const BPF_LOG_LEVEL1: u32 = 1;

/// The generic request record passed to every `bpf(2)` command.
///
/// Always built from an all-zero record so that fields and padding the probe
/// does not set stay zero, which the kernel requires.
#[repr(C)]
#[derive(Clone, Copy)]
pub union BpfAttr {
    pub map_create: MapCreateAttr,
    pub prog_load: ProgLoadAttr,
    raw: [u64; 16],
}

impl BpfAttr {
    /// Size passed as the third `bpf(2)` argument.
    pub const SIZE: usize = size_of::<Self>();

    pub const fn zeroed() -> Self {
        Self { raw: [0; 16] }
    }

    pub fn map_create(attr: MapCreateAttr) -> Self {
        let mut this = Self::zeroed();
        this.map_create = attr;
        this
    }

    pub fn prog_load(attr: ProgLoadAttr) -> Self {
        let mut this = Self::zeroed();
        this.prog_load = attr;
        this
    }
}

impl Default for BpfAttr {
    fn default() -> Self {
        Self::zeroed()
    }
}
