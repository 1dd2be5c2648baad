//! # Stop-Reason Decoder
//!
//! Turns the raw status word written by `waitpid(2)` into a [`StopReason`].
//!
//! The kernel packs three mutually exclusive outcomes into one `int`:
//!
//! | outcome     | test            | payload         |
//! |-------------|-----------------|-----------------|
//! | stopped     | `WIFSTOPPED`    | `WSTOPSIG`      |
//! | exited      | `WIFEXITED`     | `WEXITSTATUS`   |
//! | signaled    | `WIFSIGNALED`   | `WTERMSIG`      |
//!
//! The tests run in that order and the first match wins. A status that
//! matches none of them (for example a `WIFCONTINUED` report, which we never
//! ask for) is an error rather than a default.
//!
//! See: [waitpid(2) man page](https://man7.org/linux/man-pages/man2/waitpid.2.html)

use std::fmt;

use nix::sys::signal::Signal;

use crate::error::{SdbError, SdbResult};
use crate::types::ProcessState;

/// Why `waitpid` returned
///
/// `reason` is never [`ProcessState::Running`]: running is not something a
/// wait can report.
///
/// ## Example
///
/// ```rust
/// use sdb_core::{ProcessState, StopReason};
///
/// // SIGTRAP stop, as reported after a traced exec
/// let reason = StopReason::from_wait_status(0x057f)?;
/// assert_eq!(reason.reason, ProcessState::Stopped);
/// assert_eq!(reason.info, 5);
/// assert_eq!(reason.to_string(), "stopped with signal TRAP");
/// # Ok::<(), sdb_core::error::SdbError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StopReason
{
    /// New state of the process
    pub reason: ProcessState,
    /// Signal number for `Stopped`/`Terminated`, exit code for `Exited`
    pub info: u8,
}

impl StopReason
{
    /// Decode a raw wait status.
    ///
    /// ## Errors
    ///
    /// - `UnknownWaitStatus`: the status is neither stopped, exited nor signaled
    pub fn from_wait_status(status: i32) -> SdbResult<Self>
    {
        if libc::WIFSTOPPED(status) {
            Ok(Self::new(ProcessState::Stopped, libc::WSTOPSIG(status)))
        } else if libc::WIFEXITED(status) {
            Ok(Self::new(ProcessState::Exited, libc::WEXITSTATUS(status)))
        } else if libc::WIFSIGNALED(status) {
            Ok(Self::new(ProcessState::Terminated, libc::WTERMSIG(status)))
        } else {
            Err(SdbError::UnknownWaitStatus(status))
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn new(reason: ProcessState, info: libc::c_int) -> Self
    {
        Self {
            reason,
            info: (info & 0xff) as u8,
        }
    }

    /// The signal carried by a `Stopped`/`Terminated` reason, if `nix` knows it.
    ///
    /// Real-time signals have no `Signal` variant and return `None`.
    #[must_use]
    pub fn signal(&self) -> Option<Signal>
    {
        match self.reason {
            ProcessState::Stopped | ProcessState::Terminated => Signal::try_from(i32::from(self.info)).ok(),
            ProcessState::Exited | ProcessState::Running => None,
        }
    }

    /// Exit code, if the process exited normally.
    #[must_use]
    pub fn exit_code(&self) -> Option<u8>
    {
        (self.reason == ProcessState::Exited).then_some(self.info)
    }
}

impl TryFrom<i32> for StopReason
{
    type Error = SdbError;

    fn try_from(status: i32) -> SdbResult<Self>
    {
        Self::from_wait_status(status)
    }
}

impl fmt::Display for StopReason
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self.reason {
            ProcessState::Stopped => write!(f, "stopped with signal {}", SignalAbbrev(self.info)),
            ProcessState::Terminated => write!(f, "terminated with signal {}", SignalAbbrev(self.info)),
            ProcessState::Exited => write!(f, "exited with status {}", self.info),
            ProcessState::Running => f.write_str("running"),
        }
    }
}

/// Signal name without the `SIG` prefix (`TRAP`, `KILL`), or the number.
struct SignalAbbrev(u8);

impl fmt::Display for SignalAbbrev
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match Signal::try_from(i32::from(self.0)) {
            Ok(signal) => {
                let name = signal.as_str();
                f.write_str(name.strip_prefix("SIG").unwrap_or(name))
            }
            Err(_) => write!(f, "{}", self.0),
        }
    }
}
