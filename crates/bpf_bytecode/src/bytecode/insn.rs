//! BPF Instruction Format
//!
//! eBPF instructions are 64 bits (8 bytes) with the following format:
//!
//! ```text
//! +--------+----+----+--------+------------+
//! | opcode | dst| src| offset |  immediate |
//! | 8 bits | 4b | 4b | 16 bits|   32 bits  |
//! +--------+----+----+--------+------------+
//! ```
//!
//! The dst and src fields are packed into a single byte:
//! - Low 4 bits: destination register
//! - High 4 bits: source register
//!
//! Wide instructions (64-bit immediates, map references) use two
//! consecutive slots, with the upper 32 bits in the second slot's
//! immediate field.

use core::fmt;

use super::opcode::{
    self, AluOp, AtomicOp, JmpOp, MemMode, MemSize, OpcodeClass, SourceType,
};

/// Frame pointer register (read-only).
pub const FP: u8 = 10;

/// `src_reg` marker telling the verifier that a wide load's immediate is a
/// map file descriptor.
pub const PSEUDO_MAP_FD: u8 = 1;

/// Single BPF instruction (8 bytes), laid out as the kernel expects it.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct BpfInsn {
    pub opcode: u8,
    /// dst (low 4 bits) | src (high 4 bits)
    pub regs: u8,
    pub offset: i16,
    pub imm: i32,
}

impl BpfInsn {
    /// Size of a BPF instruction in bytes
    pub const SIZE: usize = 8;

    #[inline]
    pub const fn new(opcode: u8, dst: u8, src: u8, offset: i16, imm: i32) -> Self {
        Self {
            opcode,
            regs: (src << 4) | (dst & 0x0f),
            offset,
            imm,
        }
    }

    #[inline]
    pub const fn dst_reg(&self) -> u8 {
        self.regs & 0x0f
    }

    #[inline]
    pub const fn src_reg(&self) -> u8 {
        (self.regs >> 4) & 0x0f
    }

    #[inline]
    pub const fn class(&self) -> OpcodeClass {
        OpcodeClass::from_opcode(self.opcode)
    }

    /// True for the all-zero filler that pads fixed-capacity buffers.
    ///
    /// Only the opcode and immediate are considered, so the second slot of a
    /// wide load of zero also counts as padding.
    #[inline]
    pub const fn is_padding(&self) -> bool {
        self.opcode == 0 && self.imm == 0
    }

    /// Copy of this instruction with a different immediate.
    #[inline]
    pub const fn with_imm(mut self, imm: i32) -> Self {
        self.imm = imm;
        self
    }

    /// First slot of a 64-bit immediate load.
    #[inline]
    pub const fn is_wide(&self) -> bool {
        self.opcode == opcode::mem(OpcodeClass::Ld, MemSize::DWord, MemMode::Imm)
    }

    #[inline]
    pub const fn is_exit(&self) -> bool {
        self.opcode == opcode::jmp(OpcodeClass::Jmp, JmpOp::Exit, SourceType::Imm)
    }

    #[inline]
    pub const fn is_call(&self) -> bool {
        self.opcode == opcode::jmp(OpcodeClass::Jmp, JmpOp::Call, SourceType::Imm)
    }

    #[inline]
    pub const fn exit() -> Self {
        Self::new(opcode::jmp(OpcodeClass::Jmp, JmpOp::Exit, SourceType::Imm), 0, 0, 0, 0)
    }

    /// Call a kernel helper by its `enum bpf_func_id` number.
    #[inline]
    pub const fn call(helper_id: i32) -> Self {
        Self::new(opcode::jmp(OpcodeClass::Jmp, JmpOp::Call, SourceType::Imm), 0, 0, 0, helper_id)
    }

    #[inline]
    pub const fn alu64_imm(op: AluOp, dst: u8, imm: i32) -> Self {
        Self::new(opcode::alu(OpcodeClass::Alu64, op, SourceType::Imm), dst, 0, 0, imm)
    }

    #[inline]
    pub const fn alu64_reg(op: AluOp, dst: u8, src: u8) -> Self {
        Self::new(opcode::alu(OpcodeClass::Alu64, op, SourceType::Reg), dst, src, 0, 0)
    }

    #[inline]
    pub const fn alu32_imm(op: AluOp, dst: u8, imm: i32) -> Self {
        Self::new(opcode::alu(OpcodeClass::Alu32, op, SourceType::Imm), dst, 0, 0, imm)
    }

    #[inline]
    pub const fn alu32_reg(op: AluOp, dst: u8, src: u8) -> Self {
        Self::new(opcode::alu(OpcodeClass::Alu32, op, SourceType::Reg), dst, src, 0, 0)
    }

    #[inline]
    pub const fn mov64_imm(dst: u8, imm: i32) -> Self {
        Self::alu64_imm(AluOp::Mov, dst, imm)
    }

    #[inline]
    pub const fn mov64_reg(dst: u8, src: u8) -> Self {
        Self::alu64_reg(AluOp::Mov, dst, src)
    }

    #[inline]
    pub const fn add64_imm(dst: u8, imm: i32) -> Self {
        Self::alu64_imm(AluOp::Add, dst, imm)
    }

    #[inline]
    pub const fn jmp_imm(op: JmpOp, dst: u8, imm: i32, offset: i16) -> Self {
        Self::new(opcode::jmp(OpcodeClass::Jmp, op, SourceType::Imm), dst, 0, offset, imm)
    }

    #[inline]
    pub const fn jmp32_imm(op: JmpOp, dst: u8, imm: i32, offset: i16) -> Self {
        Self::new(opcode::jmp(OpcodeClass::Jmp32, op, SourceType::Imm), dst, 0, offset, imm)
    }

    #[inline]
    pub const fn jmp32_reg(op: JmpOp, dst: u8, src: u8, offset: i16) -> Self {
        Self::new(opcode::jmp(OpcodeClass::Jmp32, op, SourceType::Reg), dst, src, offset, 0)
    }

    #[inline]
    pub const fn ja(offset: i16) -> Self {
        Self::jmp_imm(JmpOp::Ja, 0, 0, offset)
    }

    /// `*(size *)(dst + offset) = imm`
    #[inline]
    pub const fn st_mem(size: MemSize, dst: u8, offset: i16, imm: i32) -> Self {
        Self::new(opcode::mem(OpcodeClass::St, size, MemMode::Mem), dst, 0, offset, imm)
    }

    /// `*(size *)(dst + offset) = src`
    #[inline]
    pub const fn stx_mem(size: MemSize, dst: u8, src: u8, offset: i16) -> Self {
        Self::new(opcode::mem(OpcodeClass::Stx, size, MemMode::Mem), dst, src, offset, 0)
    }

    /// `dst = *(size *)(src + offset)`
    #[inline]
    pub const fn ldx_mem(size: MemSize, dst: u8, src: u8, offset: i16) -> Self {
        Self::new(opcode::mem(OpcodeClass::Ldx, size, MemMode::Mem), dst, src, offset, 0)
    }

    /// Atomic read-modify-write on `*(size *)(dst + offset)` with `src`.
    /// `op` may be or-ed with [`AtomicOp::FETCH`].
    #[inline]
    pub const fn atomic(size: MemSize, dst: u8, src: u8, offset: i16, op: i32) -> Self {
        Self::new(opcode::mem(OpcodeClass::Stx, size, MemMode::Atomic), dst, src, offset, op)
    }

    #[inline]
    pub const fn atomic_fetch_add(size: MemSize, dst: u8, src: u8, offset: i16) -> Self {
        Self::atomic(size, dst, src, offset, AtomicOp::Add as i32 | AtomicOp::FETCH)
    }
}

impl fmt::Debug for BpfInsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BpfInsn")
            .field("opcode", &format_args!("{:#04x}", self.opcode))
            .field("dst", &self.dst_reg())
            .field("src", &self.src_reg())
            .field("offset", &self.offset)
            .field("imm", &self.imm)
            .finish()
    }
}

impl fmt::Display for BpfInsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_exit() {
            return write!(f, "exit");
        }

        if self.is_call() {
            return write!(f, "call {}", self.imm);
        }

        if self.is_wide() {
            return if self.src_reg() == PSEUDO_MAP_FD {
                write!(f, "lddw r{}, map_fd {}", self.dst_reg(), self.imm)
            } else {
                write!(f, "lddw r{}, {:#x}", self.dst_reg(), self.imm)
            };
        }

        let class = self.class();
        let reg_src = matches!(SourceType::from_opcode(self.opcode), SourceType::Reg);

        if class.is_alu() {
            if let Some(op) = AluOp::from_opcode(self.opcode) {
                let width = if class == OpcodeClass::Alu64 { "" } else { "32" };
                return if reg_src {
                    write!(f, "{}{} r{}, r{}", op, width, self.dst_reg(), self.src_reg())
                } else {
                    write!(f, "{}{} r{}, {}", op, width, self.dst_reg(), self.imm)
                };
            }
        }

        if class.is_jump() {
            if let Some(op) = JmpOp::from_opcode(self.opcode) {
                if op == JmpOp::Ja {
                    return write!(f, "ja {:+}", self.offset);
                }
                let width = if class == OpcodeClass::Jmp32 { "32" } else { "" };
                return if reg_src {
                    write!(
                        f,
                        "{}{} r{}, r{}, {:+}",
                        op,
                        width,
                        self.dst_reg(),
                        self.src_reg(),
                        self.offset
                    )
                } else {
                    write!(
                        f,
                        "{}{} r{}, {}, {:+}",
                        op,
                        width,
                        self.dst_reg(),
                        self.imm,
                        self.offset
                    )
                };
            }
        }

        if class.is_memory() && MemMode::from_opcode(self.opcode) == Some(MemMode::Mem) {
            let size = MemSize::from_opcode(self.opcode).suffix();
            let (dst, src, off) = (self.dst_reg(), self.src_reg(), self.offset);
            match class {
                OpcodeClass::Ldx => return write!(f, "ldx{size} r{dst}, [r{src}{off:+}]"),
                OpcodeClass::Stx => return write!(f, "stx{size} [r{dst}{off:+}], r{src}"),
                OpcodeClass::St => return write!(f, "st{size} [r{dst}{off:+}], {}", self.imm),
                _ => {}
            }
        }

        write!(
            f,
            "op={:#04x} dst=r{} src=r{} off={} imm={}",
            self.opcode,
            self.dst_reg(),
            self.src_reg(),
            self.offset,
            self.imm
        )
    }
}

/// Wide instruction occupying two slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WideInsn {
    /// First slot, carries the low 32 bits
    pub insn: BpfInsn,
    /// Second slot, only imm (high 32 bits) is used
    pub next: BpfInsn,
}

impl WideInsn {
    #[inline]
    pub const fn imm64(&self) -> u64 {
        let low = self.insn.imm as u32 as u64;
        let high = self.next.imm as u32 as u64;
        (high << 32) | low
    }

    #[inline]
    pub const fn ld_dw_imm(dst: u8, imm64: u64) -> Self {
        Self {
            insn: BpfInsn::new(
                opcode::mem(OpcodeClass::Ld, MemSize::DWord, MemMode::Imm),
                dst,
                0,
                0,
                imm64 as i32,
            ),
            next: BpfInsn::new(0, 0, 0, 0, (imm64 >> 32) as i32),
        }
    }

    /// `dst = map` where the map is named by file descriptor. The descriptor
    /// is unknown when the program is written, so it starts out as zero and
    /// is patched into the first slot's immediate before loading.
    #[inline]
    pub const fn ld_map_fd(dst: u8) -> Self {
        Self {
            insn: BpfInsn::new(
                opcode::mem(OpcodeClass::Ld, MemSize::DWord, MemMode::Imm),
                dst,
                PSEUDO_MAP_FD,
                0,
                0,
            ),
            next: BpfInsn::new(0, 0, 0, 0, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;

    use super::*;

    #[test]
    fn instruction_size() {
        assert_eq!(core::mem::size_of::<BpfInsn>(), BpfInsn::SIZE);
    }

    #[test]
    fn register_packing() {
        let insn = BpfInsn::new(0x07, 5, 3, 0, 0);
        assert_eq!(insn.dst_reg(), 5);
        assert_eq!(insn.src_reg(), 3);
        assert_eq!(insn.regs, 0x35);
    }

    #[test]
    fn exit_and_call() {
        assert!(BpfInsn::exit().is_exit());
        assert!(BpfInsn::call(7).is_call());
        assert_eq!(format!("{}", BpfInsn::exit()), "exit");
        assert_eq!(format!("{}", BpfInsn::call(7)), "call 7");
    }

    #[test]
    fn padding_ignores_registers_and_offset() {
        assert!(BpfInsn::default().is_padding());
        assert!(BpfInsn::new(0, 3, 1, 8, 0).is_padding());
        assert!(!BpfInsn::exit().is_padding());
        assert!(!BpfInsn::new(0, 0, 0, 0, 1).is_padding());
    }

    #[test]
    fn map_reference_is_patchable() {
        let wide = WideInsn::ld_map_fd(1);
        assert!(wide.insn.is_wide());
        assert_eq!(wide.insn.src_reg(), PSEUDO_MAP_FD);

        let patched = wide.insn.with_imm(42);
        assert_eq!(patched.imm, 42);
        assert_eq!(format!("{}", patched), "lddw r1, map_fd 42");
    }

    #[test]
    fn wide_immediate_split() {
        let wide = WideInsn::ld_dw_imm(0, 0x1234_5678_9abc_def0);
        assert_eq!(wide.imm64(), 0x1234_5678_9abc_def0);
    }

    #[test]
    fn disassembly() {
        assert_eq!(format!("{}", BpfInsn::mov64_imm(0, 2)), "mov r0, 2");
        assert_eq!(format!("{}", BpfInsn::alu32_imm(AluOp::Arsh, 0, 1)), "arsh32 r0, 1");
        assert_eq!(
            format!("{}", BpfInsn::jmp32_imm(JmpOp::Jeq, 0, 0, 1)),
            "jeq32 r0, 0, +1"
        );
        assert_eq!(
            format!("{}", BpfInsn::st_mem(MemSize::DWord, FP, -8, 0)),
            "stdw [r10-8], 0"
        );
        assert_eq!(
            format!("{}", BpfInsn::ldx_mem(MemSize::Word, 0, 1, 4)),
            "ldxw r0, [r1+4]"
        );
    }
}
