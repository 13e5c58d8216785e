//! eBPF feature probing.
//!
//! Each [`ProbeDescriptor`] describes one small program that the kernel only
//! accepts when it has a particular feature. The [`ProbeRunner`] loads each
//! program through a [`BpfSys`] and prints the result as a C header:
//!
//! ```text
//! #define HAVE_LRU_MAP_TYPE
//!
//! // #define HAVE_SK_MSG_PROG_TYPE
//!
//! #if 0
//! HAVE_SK_MSG_PROG_TYPE failed due to load error: Invalid argument
//! #endif
//! ```
//!
//! Maps a probe references are created first and their descriptors patched
//! into a per-run copy of the program, so the built-in table in [`catalog`]
//! is never modified.

pub mod catalog;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod fixup;
pub mod report;
pub mod rlimit;
pub mod runner;
pub mod sys;

pub use config::ProbeConfig;
pub use descriptor::{MapFixup, ProbeDescriptor};
pub use error::{RlimitError, SysError};
pub use rlimit::MemlockGuard;
pub use runner::{ProbeOutcome, ProbeRunner, Rejection};
pub use sys::{BpfSys, LinuxBpf};
