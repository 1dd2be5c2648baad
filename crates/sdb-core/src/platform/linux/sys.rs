//! # Linux System Call Wrappers
//!
//! Thin wrappers around the tracing and signalling primitives the controller
//! needs. Each wrapper tags failures with the call name so errors read like
//! `ptrace(PTRACE_CONT) failed: ESRCH: No such process`.
//!
//! `nix` covers `ptrace` and `kill`. `waitpid` goes through `libc` directly
//! because `nix::sys::wait::waitpid` decodes the status itself, and the raw
//! word is what the stop-reason decoder consumes.

use nix::errno::Errno;
use nix::sys::ptrace;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::trace;

use crate::error::{SdbResult, SystemCallExt};

pub(crate) const PTRACE_ATTACH: &str = "ptrace(PTRACE_ATTACH)";
pub(crate) const PTRACE_CONT: &str = "ptrace(PTRACE_CONT)";
pub(crate) const PTRACE_DETACH: &str = "ptrace(PTRACE_DETACH)";
pub(crate) const PTRACE_TRACEME: &str = "ptrace(PTRACE_TRACEME)";
pub(crate) const EXECVP: &str = "execvp";
pub(crate) const FORK: &str = "fork";
pub(crate) const PIPE2: &str = "pipe2";
pub(crate) const WAITPID: &str = "waitpid";
pub(crate) const KILL: &str = "kill";

/// `PTRACE_ATTACH`: become the tracer of an existing process.
///
/// The kernel sends the target `SIGSTOP`; callers must wait for that stop.
pub(crate) fn attach(pid: Pid) -> SdbResult<()>
{
    trace!(%pid, "ptrace(PTRACE_ATTACH)");
    ptrace::attach(pid).syscall(PTRACE_ATTACH)
}

/// `PTRACE_CONT` without injecting a signal.
pub(crate) fn cont(pid: Pid) -> SdbResult<()>
{
    trace!(%pid, "ptrace(PTRACE_CONT)");
    ptrace::cont(pid, None).syscall(PTRACE_CONT)
}

/// `PTRACE_DETACH` without injecting a signal.
pub(crate) fn detach(pid: Pid) -> SdbResult<()>
{
    trace!(%pid, "ptrace(PTRACE_DETACH)");
    ptrace::detach(pid, None).syscall(PTRACE_DETACH)
}

/// Send `signal` to `pid`.
pub(crate) fn kill(pid: Pid, signal: Signal) -> SdbResult<()>
{
    trace!(%pid, %signal, "kill");
    signal::kill(pid, signal).syscall(KILL)
}

/// Block until `pid` changes state and return the raw status word.
///
/// A single attempt: `EINTR` is returned to the caller like any other error.
pub(crate) fn waitpid(pid: Pid) -> SdbResult<libc::c_int>
{
    let mut status: libc::c_int = 0;
    trace!(%pid, "waitpid");
    // SAFETY: `status` is a valid, writable c_int for the duration of the call
    let result = unsafe { libc::waitpid(pid.as_raw(), &mut status, 0) };
    Errno::result(result).syscall(WAITPID)?;
    trace!(%pid, status = format_args!("{status:#x}"), "waitpid returned");
    Ok(status)
}

/// `waitpid` that retries on `EINTR`, for callers that cannot hand the retry
/// decision to anyone else.
pub(crate) fn waitpid_uninterrupted(pid: Pid) -> SdbResult<libc::c_int>
{
    loop {
        match waitpid(pid) {
            Err(err) if err.is_interrupted() => continue,
            other => return other,
        }
    }
}
