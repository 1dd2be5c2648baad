//! # sdb-core
//!
//! Process-control core for the sdb debugger.
//!
//! This crate provides:
//! - A stop-reason decoder that turns raw `waitpid` statuses into [`StopReason`]s
//! - A process controller, [`Process`], that launches or attaches to a target
//!   under `ptrace`, resumes it, waits for it, and releases it exactly once
//!
//! Everything is synchronous: each operation blocks until the kernel confirms
//! the transition it asked for.
//!
//! ## Platform Support
//!
//! - **Linux**: `ptrace(2)` / `waitpid(2)`. The decoder and the plain types
//!   build on any Unix, the controller only on Linux.
//!
//! ## Why unsafe code is needed
//!
//! `fork()` and `execvp()` with a hand-built argv, raw `waitpid()` (so the
//! decoder sees the undecoded status word) and `pipe2()` have no safe
//! wrapper that fits. Each `unsafe` block is kept to a single call.

#![allow(unsafe_code)] // Required for fork/exec and raw waitpid

pub mod error;
mod platform;
#[cfg(target_os = "linux")]
pub mod process;
pub mod prelude;
pub mod stop_reason;
pub mod types;

// Re-export commonly used types
pub use error::{SdbError, SdbResult};
#[cfg(target_os = "linux")]
pub use process::{Process, TeardownReport};
pub use stop_reason::StopReason;
pub use types::{ProcessId, ProcessState};
