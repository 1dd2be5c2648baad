//! Integration tests for the Linux process controller
//!
//! These tests require:
//! - Running on Linux (`#[cfg(target_os = "linux")]`)
//! - `ptrace` being permitted (containers with a restrictive seccomp profile
//!   or `kernel.yama.ptrace_scope = 3` forbid it)
//! - `true`, `false` and `sleep` on `PATH`
//!
//! Tests print a message and return early when ptrace is not permitted.

#![cfg(target_os = "linux")]

use std::process::{Child, Command};
use std::thread;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use sdb_core::{Process, ProcessId, ProcessState, SdbError};
use static_assertions::assert_not_impl_any;

// ptrace requests only work from the thread that became the tracer
assert_not_impl_any!(Process: Send, Sync);

/// Whether this environment lets us trace processes at all.
fn ptrace_permitted() -> bool
{
    match Process::launch("true") {
        Ok(_process) => true,
        Err(err) if matches!(err.errno(), Some(Errno::EPERM | Errno::EACCES | Errno::ENOSYS)) => {
            eprintln!("skipping: ptrace is not permitted here ({err})");
            false
        }
        Err(err) => panic!("unexpected failure launching `true`: {err}"),
    }
}

fn nix_pid(pid: ProcessId) -> Pid
{
    Pid::from_raw(i32::try_from(pid.raw()).unwrap())
}

/// Whether any process (including a zombie) still has this PID.
fn process_exists(pid: ProcessId) -> bool
{
    signal::kill(nix_pid(pid), None::<Signal>).is_ok()
}

/// Scheduler state letter from `/proc/<pid>/stat` (`S`, `t`, `T`, ...).
fn scheduler_state(pid: ProcessId) -> Option<char>
{
    let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    // The command name may contain spaces and parentheses; the state follows the last ')'
    let (_, rest) = stat.rsplit_once(')')?;
    rest.trim_start().chars().next()
}

/// Wait until the target is neither trace-stopped nor job-stopped.
fn runs_freely(pid: ProcessId) -> bool
{
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if !matches!(scheduler_state(pid), Some('t' | 'T')) {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    false
}

fn spawn_sleeper() -> Child
{
    Command::new("sleep").arg("30").spawn().expect("failed to spawn sleep")
}

fn reap(mut child: Child)
{
    let _ = child.kill();
    let _ = child.wait();
}

#[test]
fn test_launch_starts_stopped()
{
    if !ptrace_permitted() {
        return;
    }

    let process = Process::launch("true").unwrap();
    assert_eq!(process.state(), ProcessState::Stopped);
    assert!(process.pid().raw() > 0);
    assert_ne!(process.pid().raw(), std::process::id());
    assert!(process.terminates_on_teardown());
}

#[test]
fn test_launch_resume_wait_reports_exit_zero()
{
    if !ptrace_permitted() {
        return;
    }

    let mut process = Process::launch("true").unwrap();
    process.resume().unwrap();
    assert_eq!(process.state(), ProcessState::Running);

    let reason = process.wait_on_signal().unwrap();
    assert_eq!(reason.reason, ProcessState::Exited);
    assert_eq!(reason.info, 0);
    assert_eq!(process.state(), ProcessState::Exited);

    let report = process.close();
    assert!(report.target_gone);
    assert!(!report.killed);
    assert!(report.failures.is_empty());
}

#[test]
fn test_launch_reports_nonzero_exit_code()
{
    if !ptrace_permitted() {
        return;
    }

    let mut process = Process::launch("false").unwrap();
    process.resume().unwrap();
    let reason = process.wait_on_signal().unwrap();
    assert_eq!(reason.reason, ProcessState::Exited);
    assert_eq!(reason.info, 1);
}

#[test]
fn test_terminal_state_rejects_resume_and_wait()
{
    if !ptrace_permitted() {
        return;
    }

    let mut process = Process::launch("true").unwrap();
    process.resume().unwrap();
    process.wait_on_signal().unwrap();

    assert_eq!(
        process.resume().unwrap_err(),
        SdbError::InvalidState {
            operation: "resume",
            state: ProcessState::Exited
        }
    );
    assert!(matches!(process.wait_on_signal(), Err(SdbError::InvalidState { .. })));
    assert_eq!(process.state(), ProcessState::Exited);
}

#[test]
fn test_launch_missing_program_fails_with_exec_error()
{
    if !ptrace_permitted() {
        return;
    }

    let err = Process::launch("sdb-test-no-such-program").unwrap_err();
    assert_eq!(err, SdbError::system_call("execvp", Errno::ENOENT));
}

#[test]
fn test_launch_empty_path_is_invalid()
{
    assert!(matches!(Process::launch(""), Err(SdbError::InvalidArgument(_))));
}

#[test]
fn test_attach_zero_is_invalid()
{
    assert!(matches!(Process::attach(ProcessId::from(0)), Err(SdbError::InvalidArgument(_))));
}

#[test]
fn test_attach_out_of_range_pid_is_invalid()
{
    assert!(matches!(Process::attach(ProcessId::from(u32::MAX)), Err(SdbError::InvalidArgument(_))));
}

#[test]
fn test_attach_nonexistent_pid_fails_with_system_call_error()
{
    // Far above PID_MAX_LIMIT, so never a live process
    let pid = ProcessId::from(i32::MAX.unsigned_abs());
    let err = Process::attach(pid).unwrap_err();
    assert!(matches!(err, SdbError::SystemCall { call: "ptrace(PTRACE_ATTACH)", .. }), "{err}");
}

#[test]
fn test_double_resume_is_rejected_without_crashing()
{
    if !ptrace_permitted() {
        return;
    }

    let mut process = Process::launch_with_args("sleep", &["30"]).unwrap();
    process.resume().unwrap();

    let err = process.resume().unwrap_err();
    assert_eq!(
        err,
        SdbError::InvalidState {
            operation: "resume",
            state: ProcessState::Running
        }
    );
    assert_eq!(process.state(), ProcessState::Running);
}

#[test]
fn test_close_running_launched_process_kills_it()
{
    if !ptrace_permitted() {
        return;
    }

    let mut process = Process::launch_with_args("sleep", &["30"]).unwrap();
    let pid = process.pid();
    process.resume().unwrap();

    let report = process.close();
    assert!(report.stopped);
    assert!(report.detached);
    assert!(report.continued);
    assert!(report.killed);
    assert!(!report.target_gone);
    assert!(report.failures.is_empty(), "{:?}", report.failures);

    // Killed and reaped: not even a zombie is left
    assert!(!process_exists(pid));
}

#[test]
fn test_drop_running_launched_process_kills_it()
{
    if !ptrace_permitted() {
        return;
    }

    let pid = {
        let mut process = Process::launch_with_args("sleep", &["30"]).unwrap();
        process.resume().unwrap();
        process.pid()
    };

    assert!(!process_exists(pid));
}

#[test]
fn test_close_stopped_launched_process_skips_sigstop()
{
    if !ptrace_permitted() {
        return;
    }

    let process = Process::launch_with_args("sleep", &["30"]).unwrap();
    let pid = process.pid();

    let report = process.close();
    assert!(!report.stopped);
    assert!(report.detached);
    assert!(report.killed);
    assert!(!process_exists(pid));
}

#[test]
fn test_wait_observes_external_kill_while_stopped()
{
    if !ptrace_permitted() {
        return;
    }

    let mut process = Process::launch_with_args("sleep", &["30"]).unwrap();
    signal::kill(nix_pid(process.pid()), Signal::SIGKILL).unwrap();

    let reason = process.wait_on_signal().unwrap();
    assert_eq!(reason.reason, ProcessState::Terminated);
    assert_eq!(i32::from(reason.info), libc::SIGKILL);

    let report = process.close();
    assert!(report.target_gone);
    assert!(!report.killed);
}

#[test]
fn test_attach_then_close_never_kills_target()
{
    if !ptrace_permitted() {
        return;
    }

    let child = spawn_sleeper();
    let pid = ProcessId::from(child.id());

    let process = match Process::attach(pid) {
        Ok(process) => process,
        Err(err) if err.errno() == Some(Errno::EPERM) => {
            eprintln!("skipping: attach not permitted ({err})");
            reap(child);
            return;
        }
        Err(err) => panic!("attach failed: {err}"),
    };
    assert_eq!(process.state(), ProcessState::Stopped);
    assert_eq!(process.pid(), pid);
    assert!(!process.terminates_on_teardown());

    let report = process.close();
    assert!(report.detached);
    assert!(report.continued);
    assert!(!report.killed);

    let mut child = child;
    assert!(child.try_wait().unwrap().is_none(), "attached target must survive teardown");
    reap(child);
}

#[test]
fn test_attach_resume_then_close_stops_detaches_and_spares_target()
{
    if !ptrace_permitted() {
        return;
    }

    let child = spawn_sleeper();
    let pid = ProcessId::from(child.id());

    let mut process = match Process::attach(pid) {
        Ok(process) => process,
        Err(err) if err.errno() == Some(Errno::EPERM) => {
            eprintln!("skipping: attach not permitted ({err})");
            reap(child);
            return;
        }
        Err(err) => panic!("attach failed: {err}"),
    };
    process.resume().unwrap();
    assert_eq!(process.state(), ProcessState::Running);

    drop(process);

    let mut child = child;
    assert!(child.try_wait().unwrap().is_none(), "attached target must survive teardown");
    reap(child);
}

#[test]
fn test_handle_driven_entirely_on_worker_thread()
{
    if !ptrace_permitted() {
        return;
    }

    // The tracer is whichever thread creates the handle
    let (reason, report) = thread::spawn(|| {
        let mut process = Process::launch("false").unwrap();
        process.resume().unwrap();
        let reason = process.wait_on_signal().unwrap();
        (reason, process.close())
    })
    .join()
    .unwrap();

    assert_eq!(reason.exit_code(), Some(1));
    assert!(report.target_gone);
    assert!(report.failures.is_empty(), "{:?}", report.failures);
}

#[test]
fn test_attached_target_runs_freely_after_close_on_worker_thread()
{
    if !ptrace_permitted() {
        return;
    }

    let child = spawn_sleeper();
    let pid = ProcessId::from(child.id());

    let outcome = thread::spawn(move || {
        let mut process = Process::attach(pid)?;
        process.resume()?;
        Ok::<_, SdbError>(process.close())
    })
    .join()
    .unwrap();

    let report = match outcome {
        Ok(report) => report,
        Err(err) if err.errno() == Some(Errno::EPERM) => {
            eprintln!("skipping: attach not permitted ({err})");
            reap(child);
            return;
        }
        Err(err) => panic!("attach failed: {err}"),
    };

    assert!(report.stopped);
    assert!(report.detached);
    assert!(report.continued);
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert!(runs_freely(pid), "target left stopped: {:?}", scheduler_state(pid));

    let mut child = child;
    assert!(child.try_wait().unwrap().is_none(), "attached target must survive teardown");
    reap(child);
}
