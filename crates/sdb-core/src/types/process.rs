//! Process identifier and lifecycle state types.

use std::fmt;

use nix::unistd::Pid;

use crate::error::{SdbError, SdbResult};

/// Process identifier (PID)
///
/// A PID is the number the kernel assigns to each running process. Linux
/// stores it as a signed `pid_t`, but every real PID is positive, so we
/// expose it as a `u32` and convert at the system call boundary.
///
/// ## Why wrap it in a struct?
///
/// Using a newtype pattern (`struct ProcessId(u32)`) instead of a raw `u32`
/// provides:
/// - **Type safety**: Prevents accidentally passing a random number where a PID is expected
/// - **Self-documenting code**: Makes it clear what the value represents
///
/// ## Example
///
/// ```rust,no_run
/// use sdb_core::types::ProcessId;
/// use sdb_core::Process;
///
/// let mut process = Process::attach(ProcessId::from(12345))?;
/// process.resume()?;
/// # Ok::<(), sdb_core::error::SdbError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(pub u32);

impl ProcessId
{
    /// Get the raw `u32` value of the PID
    ///
    /// ```rust
    /// use sdb_core::types::ProcessId;
    ///
    /// assert_eq!(ProcessId::from(42).raw(), 42);
    /// ```
    #[must_use]
    pub fn raw(self) -> u32
    {
        self.0
    }

    /// Convert into the `nix` PID type used by the system call wrappers.
    ///
    /// Rejects `0` (which `ptrace` and `kill` would interpret as "the calling
    /// process group") and values that do not fit a `pid_t`.
    pub(crate) fn to_pid(self) -> SdbResult<Pid>
    {
        if self.0 == 0 {
            return Err(SdbError::InvalidArgument("Invalid PID 0".to_string()));
        }
        let raw = libc::pid_t::try_from(self.0)
            .map_err(|_| SdbError::InvalidArgument(format!("PID {} is out of range", self.0)))?;
        Ok(Pid::from_raw(raw))
    }
}

impl From<u32> for ProcessId
{
    fn from(pid: u32) -> Self
    {
        ProcessId(pid)
    }
}

impl From<ProcessId> for u32
{
    fn from(pid: ProcessId) -> Self
    {
        pid.0
    }
}

impl From<Pid> for ProcessId
{
    fn from(pid: Pid) -> Self
    {
        // The kernel never hands out negative PIDs
        ProcessId(pid.as_raw().unsigned_abs())
    }
}

impl fmt::Display for ProcessId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a traced process
///
/// ## State Transitions
///
/// - `Stopped` → `Running`: `resume()`
/// - `Running` → `Stopped` | `Exited` | `Terminated`: `wait_on_signal()`
/// - `Stopped` → `Exited` | `Terminated`: `wait_on_signal()` after the
///   process was killed by someone else
///
/// `Exited` and `Terminated` are terminal. `Running` is only an
/// approximation between `resume()` and the next wait: the kernel's wait
/// report is the only source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessState
{
    /// Suspended in a trace-stop
    Stopped,
    /// Continued by the controller and not yet observed to stop
    Running,
    /// Exited normally with an exit code
    Exited,
    /// Killed by an unhandled signal
    Terminated,
}

impl ProcessState
{
    /// Whether the process is gone and its PID has been reaped.
    #[must_use]
    pub fn is_terminal(self) -> bool
    {
        matches!(self, Self::Exited | Self::Terminated)
    }
}

impl fmt::Display for ProcessState
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Exited => "exited",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}
