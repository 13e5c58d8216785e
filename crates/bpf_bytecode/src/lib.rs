//! eBPF bytecode for capability probes
//!
//! Encoding helpers for the small programs the probe submits to the kernel.
//! Nothing here talks to the kernel: instructions are plain values that the
//! probe copies, patches and hands to `bpf(2)`.
//!
//! # Modules
//!
//! - [`bytecode`] - instruction format, opcode fields, program types and
//!   owned program buffers
//!
//! # Quick Start
//!
//! ```
//! use bpf_bytecode::bytecode::insn::BpfInsn;
//! use bpf_bytecode::bytecode::program::{BpfProgType, ProgramBuilder};
//!
//! // r0 = 0; exit
//! let program = ProgramBuilder::new(BpfProgType::SocketFilter)
//!     .insn(BpfInsn::mov64_imm(0, 0))
//!     .exit()
//!     .build()
//!     .expect("valid program");
//!
//! assert_eq!(program.insn_count(), 2);
//! ```

#![no_std]

extern crate alloc;

pub mod bytecode;
