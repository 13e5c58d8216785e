//! Opcode fields
//!
//! ```text
//! ALU / JMP classes          LD / LDX / ST / STX classes
//! +--------+-----+-------+   +--------+------+-------+
//! | op (4) | src | class |   |mode (3)|size 2| class |
//! +--------+-----+-------+   +--------+------+-------+
//! ```
//!
//! Probes compose opcodes from these fields with [`alu`], [`jmp`] and
//! [`mem`]; the `from_opcode` decoders exist for disassembly in logs.

use core::fmt;

/// Instruction class (bits 0-2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpcodeClass {
    Ld = 0x00,
    Ldx = 0x01,
    St = 0x02,
    Stx = 0x03,
    Alu32 = 0x04,
    Jmp = 0x05,
    Jmp32 = 0x06,
    Alu64 = 0x07,
}

impl OpcodeClass {
    #[inline]
    pub const fn from_opcode(opcode: u8) -> Self {
        match opcode & 0x07 {
            0x00 => Self::Ld,
            0x01 => Self::Ldx,
            0x02 => Self::St,
            0x03 => Self::Stx,
            0x04 => Self::Alu32,
            0x05 => Self::Jmp,
            0x06 => Self::Jmp32,
            _ => Self::Alu64,
        }
    }

    #[inline]
    pub const fn is_alu(self) -> bool {
        matches!(self, Self::Alu32 | Self::Alu64)
    }

    #[inline]
    pub const fn is_jump(self) -> bool {
        matches!(self, Self::Jmp | Self::Jmp32)
    }

    #[inline]
    pub const fn is_memory(self) -> bool {
        matches!(self, Self::Ld | Self::Ldx | Self::St | Self::Stx)
    }
}

/// Operand source (bit 3) for ALU and JMP classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SourceType {
    Imm = 0x00,
    Reg = 0x08,
}

impl SourceType {
    #[inline]
    pub const fn from_opcode(opcode: u8) -> Self {
        if opcode & 0x08 != 0 { Self::Reg } else { Self::Imm }
    }
}

/// ALU operation (bits 4-7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AluOp {
    Add = 0x00,
    Sub = 0x10,
    Mul = 0x20,
    Div = 0x30,
    Or = 0x40,
    And = 0x50,
    Lsh = 0x60,
    Rsh = 0x70,
    Neg = 0x80,
    Mod = 0x90,
    Xor = 0xa0,
    Mov = 0xb0,
    Arsh = 0xc0,
    End = 0xd0,
}

impl AluOp {
    #[inline]
    pub const fn from_opcode(opcode: u8) -> Option<Self> {
        Some(match opcode & 0xf0 {
            0x00 => Self::Add,
            0x10 => Self::Sub,
            0x20 => Self::Mul,
            0x30 => Self::Div,
            0x40 => Self::Or,
            0x50 => Self::And,
            0x60 => Self::Lsh,
            0x70 => Self::Rsh,
            0x80 => Self::Neg,
            0x90 => Self::Mod,
            0xa0 => Self::Xor,
            0xb0 => Self::Mov,
            0xc0 => Self::Arsh,
            0xd0 => Self::End,
            _ => return None,
        })
    }

    const fn mnemonic(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Or => "or",
            Self::And => "and",
            Self::Lsh => "lsh",
            Self::Rsh => "rsh",
            Self::Neg => "neg",
            Self::Mod => "mod",
            Self::Xor => "xor",
            Self::Mov => "mov",
            Self::Arsh => "arsh",
            Self::End => "end",
        }
    }
}

impl fmt::Display for AluOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Jump operation (bits 4-7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum JmpOp {
    Ja = 0x00,
    Jeq = 0x10,
    Jgt = 0x20,
    Jge = 0x30,
    Jset = 0x40,
    Jne = 0x50,
    Jsgt = 0x60,
    Jsge = 0x70,
    Call = 0x80,
    Exit = 0x90,
    Jlt = 0xa0,
    Jle = 0xb0,
    Jslt = 0xc0,
    Jsle = 0xd0,
}

impl JmpOp {
    #[inline]
    pub const fn from_opcode(opcode: u8) -> Option<Self> {
        Some(match opcode & 0xf0 {
            0x00 => Self::Ja,
            0x10 => Self::Jeq,
            0x20 => Self::Jgt,
            0x30 => Self::Jge,
            0x40 => Self::Jset,
            0x50 => Self::Jne,
            0x60 => Self::Jsgt,
            0x70 => Self::Jsge,
            0x80 => Self::Call,
            0x90 => Self::Exit,
            0xa0 => Self::Jlt,
            0xb0 => Self::Jle,
            0xc0 => Self::Jslt,
            0xd0 => Self::Jsle,
            _ => return None,
        })
    }

    const fn mnemonic(self) -> &'static str {
        match self {
            Self::Ja => "ja",
            Self::Jeq => "jeq",
            Self::Jgt => "jgt",
            Self::Jge => "jge",
            Self::Jset => "jset",
            Self::Jne => "jne",
            Self::Jsgt => "jsgt",
            Self::Jsge => "jsge",
            Self::Call => "call",
            Self::Exit => "exit",
            Self::Jlt => "jlt",
            Self::Jle => "jle",
            Self::Jslt => "jslt",
            Self::Jsle => "jsle",
        }
    }
}

impl fmt::Display for JmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Access width (bits 3-4) for memory classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MemSize {
    Word = 0x00,
    Half = 0x08,
    Byte = 0x10,
    DWord = 0x18,
}

impl MemSize {
    #[inline]
    pub const fn from_opcode(opcode: u8) -> Self {
        match opcode & 0x18 {
            0x00 => Self::Word,
            0x08 => Self::Half,
            0x10 => Self::Byte,
            _ => Self::DWord,
        }
    }

    #[inline]
    pub const fn size_bytes(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Half => 2,
            Self::Word => 4,
            Self::DWord => 8,
        }
    }

    /// Mnemonic suffix, e.g. the `dw` in `ldxdw`.
    pub(crate) const fn suffix(self) -> &'static str {
        match self {
            Self::Byte => "b",
            Self::Half => "h",
            Self::Word => "w",
            Self::DWord => "dw",
        }
    }
}

/// Addressing mode (bits 5-7) for memory classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MemMode {
    Imm = 0x00,
    Abs = 0x20,
    Ind = 0x40,
    Mem = 0x60,
    Atomic = 0xc0,
}

impl MemMode {
    #[inline]
    pub const fn from_opcode(opcode: u8) -> Option<Self> {
        Some(match opcode & 0xe0 {
            0x00 => Self::Imm,
            0x20 => Self::Abs,
            0x40 => Self::Ind,
            0x60 => Self::Mem,
            0xc0 => Self::Atomic,
            _ => return None,
        })
    }
}

/// Atomic operation, carried in the immediate of `STX | ATOMIC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum AtomicOp {
    Add = 0x00,
    Or = 0x40,
    And = 0x50,
    Xor = 0xa0,
    Xchg = 0xe0 | 0x01,
    Cmpxchg = 0xf0 | 0x01,
}

impl AtomicOp {
    /// Modifier returning the old value in the source register.
    pub const FETCH: i32 = 0x01;
}

/// Compose an ALU opcode.
#[inline]
pub const fn alu(class: OpcodeClass, op: AluOp, src: SourceType) -> u8 {
    class as u8 | op as u8 | src as u8
}

/// Compose a JMP opcode.
#[inline]
pub const fn jmp(class: OpcodeClass, op: JmpOp, src: SourceType) -> u8 {
    class as u8 | op as u8 | src as u8
}

/// Compose a load/store opcode.
#[inline]
pub const fn mem(class: OpcodeClass, size: MemSize, mode: MemMode) -> u8 {
    class as u8 | size as u8 | mode as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composes_well_known_opcodes() {
        assert_eq!(alu(OpcodeClass::Alu64, AluOp::Mov, SourceType::Imm), 0xb7);
        assert_eq!(alu(OpcodeClass::Alu64, AluOp::Mov, SourceType::Reg), 0xbf);
        assert_eq!(alu(OpcodeClass::Alu32, AluOp::Arsh, SourceType::Imm), 0xc4);
        assert_eq!(jmp(OpcodeClass::Jmp, JmpOp::Exit, SourceType::Imm), 0x95);
        assert_eq!(jmp(OpcodeClass::Jmp, JmpOp::Call, SourceType::Imm), 0x85);
        assert_eq!(jmp(OpcodeClass::Jmp32, JmpOp::Jeq, SourceType::Imm), 0x16);
        assert_eq!(mem(OpcodeClass::Ld, MemSize::DWord, MemMode::Imm), 0x18);
        assert_eq!(mem(OpcodeClass::St, MemSize::DWord, MemMode::Mem), 0x7a);
        assert_eq!(mem(OpcodeClass::Stx, MemSize::DWord, MemMode::Atomic), 0xdb);
    }

    #[test]
    fn decodes_fields() {
        assert_eq!(OpcodeClass::from_opcode(0x61), OpcodeClass::Ldx);
        assert_eq!(SourceType::from_opcode(0x0f), SourceType::Reg);
        assert_eq!(AluOp::from_opcode(0x17), Some(AluOp::Sub));
        assert_eq!(JmpOp::from_opcode(0x95), Some(JmpOp::Exit));
        assert_eq!(MemSize::from_opcode(0x7a), MemSize::DWord);
        assert_eq!(MemMode::from_opcode(0xdb), Some(MemMode::Atomic));
        assert_eq!(JmpOp::from_opcode(0xe5), None);
    }

    #[test]
    fn mem_size_bytes() {
        assert_eq!(MemSize::Byte.size_bytes(), 1);
        assert_eq!(MemSize::DWord.size_bytes(), 8);
    }
}
