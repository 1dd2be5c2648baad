//! # Platform-Specific Implementations
//!
//! The process controller is written against Linux `ptrace(2)` and
//! `waitpid(2)`. There is no portable abstraction on top: each primitive is
//! wrapped once, in `linux`, and used directly by [`crate::process`].
//!
//! - **Linux**: `fork()` + `PTRACE_TRACEME` + `execvp()` to launch,
//!   `PTRACE_ATTACH` to attach, `PTRACE_CONT` / `waitpid()` to drive execution
//!   - See: [ptrace(2) man page](https://man7.org/linux/man-pages/man2/ptrace.2.html)

#[cfg(target_os = "linux")]
pub(crate) mod linux;
