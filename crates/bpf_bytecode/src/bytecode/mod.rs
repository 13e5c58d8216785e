//! eBPF Bytecode
//!
//! - 11 registers (R0-R10), R10 is the read-only frame pointer
//! - 8-byte instruction format
//! - Wide instructions (two slots) for 64-bit immediates and map references

pub mod insn;
pub mod opcode;
pub mod program;

pub use insn::{BpfInsn, WideInsn};
pub use opcode::{AluOp, JmpOp, MemMode, MemSize, OpcodeClass, SourceType};
pub use program::{BpfProgType, BpfProgram, ProgramBuilder, ProgramError, effective_length};
