//! Userspace view of the Linux `bpf(2)` interface.
//!
//! Only the pieces the capability probe needs are modelled: the two commands
//! it issues, the request record they share, and the syscall number for the
//! architectures the probe knows how to reach.

#![no_std]

mod bpf;
mod syscall;

pub use bpf::*;
pub use syscall::*;
