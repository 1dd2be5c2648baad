//! # Process Controller
//!
//! [`Process`] owns exactly one traced process: it creates the trace
//! relationship (by launching or attaching), drives the target between
//! stopped and running, and releases the relationship exactly once.
//!
//! ## Ownership
//!
//! A `Process` can only be obtained from [`Process::launch`],
//! [`Process::launch_with_args`] or [`Process::attach`]. It is neither
//! `Clone` nor `Copy`, so two handles can never believe they trace the same
//! PID. Moving a handle moves the trace relationship with it.
//!
//! ## Thread affinity
//!
//! Linux binds the tracer role to the thread that forked the target or issued
//! `PTRACE_ATTACH`. Requests from any other thread fail with `ESRCH`,
//! including the detach at teardown. `Process` is therefore neither `Send`
//! nor `Sync`: create, drive and release it on one thread.
//!
//! ```rust,compile_fail
//! fn assert_send<T: Send>() {}
//! assert_send::<sdb_core::Process>();
//! ```
//!
//! ## Teardown
//!
//! Releasing a handle (explicitly with [`Process::close`], or implicitly on
//! drop) runs the following steps, ignoring individual failures so later steps
//! still run:
//!
//! 1. If the target is already known to be gone (exited/terminated), stop here.
//!    Its PID has been reaped and may already belong to another process.
//! 2. If the target is running, send `SIGSTOP` and wait for the stop.
//! 3. `PTRACE_DETACH`.
//! 4. Send `SIGCONT`, so a detached target is not left frozen.
//! 5. Launched targets only: send `SIGKILL` and reap the child.
//!
//! An attached target is never killed.

use std::marker::PhantomData;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use tracing::{debug, info, info_span, warn};

use crate::error::{SdbError, SdbResult};
use crate::platform::linux::{sys, LaunchManager};
use crate::stop_reason::StopReason;
use crate::types::{ProcessId, ProcessState};

/// A traced process
///
/// ## Example
///
/// ```rust,no_run
/// use sdb_core::{Process, ProcessState};
///
/// let mut process = Process::launch("true")?;
/// assert_eq!(process.state(), ProcessState::Stopped);
///
/// process.resume()?;
/// let reason = process.wait_on_signal()?;
/// println!("Process {} {}", process.pid(), reason);
///
/// let report = process.close();
/// assert!(report.target_gone);
/// # Ok::<(), sdb_core::error::SdbError>(())
/// ```
#[derive(Debug)]
pub struct Process
{
    pid: Pid,
    state: ProcessState,
    terminate_on_teardown: bool,
    released: bool,
    // Pins the handle to the tracer thread
    _tracer_thread: PhantomData<*const ()>,
}

/// Where teardown has to start from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TeardownEntry
{
    /// Already reaped: touch nothing
    TargetGone,
    /// Might be running: stop and wait before detaching
    StopFirst,
    /// In a trace-stop: detach right away
    Detach,
}

/// What happened while releasing a [`Process`]
///
/// Teardown never fails as a whole: each step that went wrong is logged and
/// collected in `failures`, and the remaining steps still run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport
{
    /// A running target was stopped with `SIGSTOP` before detaching
    pub stopped: bool,
    /// `PTRACE_DETACH` succeeded
    pub detached: bool,
    /// `SIGCONT` was delivered after detaching
    pub continued: bool,
    /// `SIGKILL` was delivered (launched targets only)
    pub killed: bool,
    /// The target was already gone, so nothing was sent to its PID
    pub target_gone: bool,
    /// Steps that failed, in the order they ran
    pub failures: Vec<SdbError>,
}

impl TeardownReport
{
    /// Record the outcome of one step, returning whether it succeeded.
    fn record<T>(&mut self, result: SdbResult<T>) -> Option<T>
    {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(error = %err, "Teardown step failed, continuing");
                self.failures.push(err);
                None
            }
        }
    }
}

impl Process
{
    /// Launch `program` under trace with no extra arguments
    ///
    /// `program` is looked up on `PATH` when it contains no slash, like
    /// `execlp`. Blocks until the child stops at its first instruction.
    ///
    /// ## Errors
    ///
    /// See [`Process::launch_with_args`].
    pub fn launch(program: &str) -> SdbResult<Self>
    {
        Self::launch_with_args(program, &[])
    }

    /// Launch `program` under trace, passing `args` after the program name
    ///
    /// The returned handle is `Stopped` and kills the target on teardown.
    ///
    /// ## Errors
    ///
    /// - `InvalidArgument`: empty path, or a path/argument containing NUL
    /// - `SystemCall`: `pipe2`/`fork` failed in the parent, the child's
    ///   `ptrace(PTRACE_TRACEME)` or `execvp` failed (the child is reaped),
    ///   or the initial `waitpid` failed
    /// - `StartupFailed`: the child exited or was killed before its first stop
    pub fn launch_with_args(program: &str, args: &[&str]) -> SdbResult<Self>
    {
        let pid = LaunchManager::launch(program, args)?;
        let process = Self::await_initial_stop(pid, true)?;
        info!(pid = %process.pid, program, "Launched process");
        Ok(process)
    }

    /// Attach to an existing process
    ///
    /// Blocks until the target acknowledges the attach with a stop. The
    /// returned handle is `Stopped` and never kills the target on teardown.
    ///
    /// ## Errors
    ///
    /// - `InvalidArgument`: `pid` is 0 or not a valid `pid_t`
    /// - `SystemCall`: `ptrace(PTRACE_ATTACH)` was rejected (no such process,
    ///   permission denied) or the initial `waitpid` failed
    /// - `StartupFailed`: the target died before stopping
    pub fn attach(pid: ProcessId) -> SdbResult<Self>
    {
        let pid = pid.to_pid()?;
        info!(%pid, "Attaching to process");
        sys::attach(pid)?;
        let process = Self::await_initial_stop(pid, false)?;
        info!(%pid, "Attached to process");
        Ok(process)
    }

    /// Handle for a target whose initial stop has not been observed yet.
    ///
    /// It counts as running, so an early teardown waits for the pending stop
    /// before detaching.
    fn provisional(pid: Pid, terminate_on_teardown: bool) -> Self
    {
        Self {
            pid,
            state: ProcessState::Running,
            terminate_on_teardown,
            released: false,
            _tracer_thread: PhantomData,
        }
    }

    /// Build the handle and wait for the first trace-stop.
    ///
    /// The handle exists before the wait, so any failure here releases the
    /// target through the normal teardown path when `process` is dropped.
    fn await_initial_stop(pid: Pid, terminate_on_teardown: bool) -> SdbResult<Self>
    {
        let mut process = Self::provisional(pid, terminate_on_teardown);

        let reason = process.wait_on_signal()?;
        if reason.reason != ProcessState::Stopped {
            return Err(SdbError::StartupFailed(reason));
        }
        Ok(process)
    }

    /// Continue a stopped process
    ///
    /// ## Errors
    ///
    /// - `InvalidState`: the process is not `Stopped` (including a second
    ///   `resume()` without an intervening wait). No system call is made.
    /// - `SystemCall`: `ptrace(PTRACE_CONT)` failed; the state is unchanged
    pub fn resume(&mut self) -> SdbResult<()>
    {
        if self.state != ProcessState::Stopped {
            return Err(SdbError::InvalidState {
                operation: "resume",
                state: self.state,
            });
        }

        sys::cont(self.pid)?;
        self.state = ProcessState::Running;
        debug!(pid = %self.pid, "Resumed process");
        Ok(())
    }

    /// Block until the process changes state and report why
    ///
    /// ## Errors
    ///
    /// - `InvalidState`: the process already exited or was terminated
    /// - `SystemCall`: `waitpid` failed (including `EINTR`, which is not
    ///   retried; see [`SdbError::is_interrupted`])
    /// - `UnknownWaitStatus`: the kernel reported a status we cannot classify
    pub fn wait_on_signal(&mut self) -> SdbResult<StopReason>
    {
        if self.state.is_terminal() {
            return Err(SdbError::InvalidState {
                operation: "wait on",
                state: self.state,
            });
        }

        let status = sys::waitpid(self.pid)?;
        let reason = StopReason::from_wait_status(status)?;
        self.state = reason.reason;
        debug!(pid = %self.pid, %reason, "Observed state change");
        Ok(reason)
    }

    /// PID of the traced process.
    #[must_use]
    pub fn pid(&self) -> ProcessId
    {
        ProcessId::from(self.pid)
    }

    /// Last observed state.
    #[must_use]
    pub fn state(&self) -> ProcessState
    {
        self.state
    }

    /// Whether teardown kills the target (true for launched processes).
    #[must_use]
    pub fn terminates_on_teardown(&self) -> bool
    {
        self.terminate_on_teardown
    }

    /// Release the process now and report what teardown did
    ///
    /// Equivalent to dropping the handle, except the outcome is returned
    /// instead of only being logged.
    #[must_use = "the report is the only place teardown failures are returned"]
    pub fn close(mut self) -> TeardownReport
    {
        self.teardown()
    }

    fn teardown(&mut self) -> TeardownReport
    {
        let mut report = TeardownReport::default();
        if self.released {
            return report;
        }
        self.released = true;

        let pid = self.pid;
        let _span = info_span!("teardown", %pid, state = %self.state).entered();

        match self.teardown_entry() {
            TeardownEntry::TargetGone => {
                debug!("Process already reaped, nothing to release");
                report.target_gone = true;
                return report;
            }
            TeardownEntry::StopFirst => {
                if !self.stop_for_teardown(&mut report) {
                    return report;
                }
            }
            TeardownEntry::Detach => {}
        }

        report.detached = report.record(sys::detach(pid)).is_some();
        report.continued = report.record(sys::kill(pid, Signal::SIGCONT)).is_some();

        if self.terminate_on_teardown {
            report.killed = report.record(sys::kill(pid, Signal::SIGKILL)).is_some();
            if report.killed {
                let reaped = sys::waitpid_uninterrupted(pid).and_then(StopReason::from_wait_status);
                if let Some(reason) = report.record(reaped) {
                    self.state = reason.reason;
                }
            }
        }

        info!(
            detached = report.detached,
            killed = report.killed,
            failures = report.failures.len(),
            "Released process"
        );
        report
    }

    fn teardown_entry(&self) -> TeardownEntry
    {
        match self.state {
            ProcessState::Exited | ProcessState::Terminated => TeardownEntry::TargetGone,
            ProcessState::Running => TeardownEntry::StopFirst,
            ProcessState::Stopped => TeardownEntry::Detach,
        }
    }

    /// Stop a running target before detaching.
    ///
    /// Returns `false` when the target turned out to be gone, in which case
    /// no further signals may be sent to its PID.
    fn stop_for_teardown(&mut self, report: &mut TeardownReport) -> bool
    {
        match sys::kill(self.pid, Signal::SIGSTOP) {
            Ok(()) => {}
            Err(err) if err.errno() == Some(Errno::ESRCH) => {
                debug!("Process vanished before it could be stopped");
                report.target_gone = true;
                return false;
            }
            Err(err) => {
                // Waiting for a stop we failed to request could block forever
                report.record::<()>(Err(err));
                return true;
            }
        }

        match sys::waitpid_uninterrupted(self.pid).and_then(StopReason::from_wait_status) {
            Ok(reason) if reason.reason.is_terminal() => {
                debug!(%reason, "Process ended while being stopped");
                self.state = reason.reason;
                report.target_gone = true;
                false
            }
            Ok(reason) => {
                self.state = reason.reason;
                report.stopped = true;
                true
            }
            Err(err) if matches!(err.errno(), Some(Errno::ECHILD | Errno::ESRCH)) => {
                debug!("Process already reaped elsewhere");
                report.target_gone = true;
                false
            }
            Err(err) => {
                report.record::<()>(Err(err));
                true
            }
        }
    }
}

impl Drop for Process
{
    fn drop(&mut self)
    {
        // Best effort: failures were already logged by `teardown`
        let _ = self.teardown();
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    /// A handle that never runs teardown, so no signal reaches `pid`.
    fn inert(state: ProcessState) -> Process
    {
        let mut process = Process::provisional(Pid::from_raw(i32::MAX), false);
        process.state = state;
        process.released = true;
        process
    }

    #[test]
    fn test_provisional_handle_waits_for_its_first_stop()
    {
        let mut process = Process::provisional(Pid::from_raw(i32::MAX), true);
        process.released = true;

        assert_eq!(process.state(), ProcessState::Running);
        assert_eq!(process.teardown_entry(), TeardownEntry::StopFirst);
        assert!(process.terminates_on_teardown());
    }

    #[test]
    fn test_teardown_entry_follows_state()
    {
        assert_eq!(inert(ProcessState::Stopped).teardown_entry(), TeardownEntry::Detach);
        assert_eq!(inert(ProcessState::Running).teardown_entry(), TeardownEntry::StopFirst);
        assert_eq!(inert(ProcessState::Exited).teardown_entry(), TeardownEntry::TargetGone);
        assert_eq!(inert(ProcessState::Terminated).teardown_entry(), TeardownEntry::TargetGone);
    }

    #[test]
    fn test_released_handle_tears_down_once()
    {
        let mut process = inert(ProcessState::Running);
        assert_eq!(process.teardown(), TeardownReport::default());
    }
}
