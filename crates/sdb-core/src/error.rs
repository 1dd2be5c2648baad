//! # Error Types
//!
//! General error handling for the process controller.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use nix::errno::Errno;
use thiserror::Error;

use crate::stop_reason::StopReason;
use crate::types::ProcessState;

/// Main error type for process-control operations
///
/// ## Error Categories
///
/// 1. **OS errors**: `SystemCall` (fork, ptrace, execvp, waitpid, kill, ...)
/// 2. **Caller errors**: `InvalidArgument`, `InvalidState`
/// 3. **Target errors**: `StartupFailed` (the target died before it could be traced)
/// 4. **Platform contract errors**: `UnknownWaitStatus`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SdbError
{
    /// An OS primitive returned failure
    ///
    /// `call` names the primitive as it appears in the man pages, for example
    /// `"ptrace(PTRACE_ATTACH)"` or `"waitpid"`. `errno` is the error code the
    /// kernel reported. For failures inside a freshly forked child, the code is
    /// carried back to the parent over a pipe, so it is the child's errno.
    #[error("{call} failed: {errno}")]
    SystemCall
    {
        /// Name of the failing system call
        call: &'static str,
        /// OS-reported error code
        errno: Errno,
    },

    /// Invalid argument passed directly to the controller
    ///
    /// Examples:
    /// - `attach(0)`
    /// - An empty program path
    /// - A program path or argument containing a NUL byte
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not legal in the handle's current state
    ///
    /// `resume()` requires `Stopped`; `wait_on_signal()` requires a state
    /// that is not terminal. No system call is issued when this is returned.
    #[error("Cannot {operation} a process that is {state}")]
    InvalidState
    {
        /// The operation that was refused
        operation: &'static str,
        /// State of the handle when it was refused
        state: ProcessState,
    },

    /// The target exited or was killed before its initial trace-stop
    #[error("Process {0} before reaching its initial stop")]
    StartupFailed(StopReason),

    /// `waitpid` produced a status that is neither stopped, exited nor signaled
    #[error("Unrecognised wait status: {0:#x}")]
    UnknownWaitStatus(i32),
}

impl SdbError
{
    /// Build a `SystemCall` error from an errno value.
    #[must_use]
    pub fn system_call(call: &'static str, errno: Errno) -> Self
    {
        Self::SystemCall { call, errno }
    }

    /// OS error code, if this is a system call failure.
    #[must_use]
    pub fn errno(&self) -> Option<Errno>
    {
        match self {
            Self::SystemCall { errno, .. } => Some(*errno),
            _ => None,
        }
    }

    /// Whether a blocking call was interrupted by a signal (`EINTR`).
    ///
    /// The controller never retries on its own; callers that know retrying is
    /// safe can check this and call again.
    #[must_use]
    pub fn is_interrupted(&self) -> bool
    {
        self.errno() == Some(Errno::EINTR)
    }
}

/// Convenience type alias for `Result<T, SdbError>`
///
/// ```rust
/// use sdb_core::error::SdbResult;
/// fn foo() -> SdbResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type SdbResult<T> = std::result::Result<T, SdbError>;

/// Extension for turning `nix` results into `SdbResult`s tagged with the call name.
pub(crate) trait SystemCallExt<T>
{
    fn syscall(self, call: &'static str) -> SdbResult<T>;
}

impl<T> SystemCallExt<T> for nix::Result<T>
{
    fn syscall(self, call: &'static str) -> SdbResult<T>
    {
        self.map_err(|errno| SdbError::system_call(call, errno))
    }
}
