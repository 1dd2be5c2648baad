//! # Linux Process Launch
//!
//! Process launching using `fork()` + `PTRACE_TRACEME` + `execvp()`.
//!
//! The child asks to be traced by its parent and then replaces its image with
//! the target program. The kernel stops it with `SIGTRAP` right after the
//! exec succeeds, so the parent can take control before the first instruction
//! of the new program runs.
//!
//! ## Reporting failures from the child
//!
//! A child that fails after the fork cannot return an error: it shares no
//! memory with the parent. Instead it writes `(step, errno)` to a pipe and
//! exits with status 127. The write end is close-on-exec, so a successful
//! exec closes it and the parent reads EOF.
//!
//! Everything the child touches (C strings, the argv array, the pipe) is
//! prepared before the fork. After the fork the child only makes
//! async-signal-safe calls.
//!
//! ## References
//!
//! - [fork(2) man page](https://man7.org/linux/man-pages/man2/fork.2.html)
//! - [ptrace(2) man page](https://man7.org/linux/man-pages/man2/ptrace.2.html)
//! - [execvp(3) man page](https://man7.org/linux/man-pages/man3/execvp.3.html)

use std::ffi::CString;
use std::fs::File;
use std::io::Read;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::ptr;

use nix::errno::Errno;
use nix::sys::ptrace;
use nix::unistd::{fork, ForkResult, Pid};
use tracing::{debug, info, trace};

use super::sys;
use crate::error::{SdbError, SdbResult};

/// Exit status used by a child that failed before exec.
const CHILD_FAILURE_STATUS: libc::c_int = 127;

/// Size of a child failure report: one step byte plus a native-endian errno.
const REPORT_LEN: usize = 1 + std::mem::size_of::<i32>();

/// The step a forked child was executing when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum ChildStep
{
    TraceMe = 1,
    Exec = 2,
}

impl ChildStep
{
    fn from_byte(byte: u8) -> Option<Self>
    {
        match byte {
            1 => Some(Self::TraceMe),
            2 => Some(Self::Exec),
            _ => None,
        }
    }

    fn call_name(self) -> &'static str
    {
        match self {
            Self::TraceMe => sys::PTRACE_TRACEME,
            Self::Exec => sys::EXECVP,
        }
    }
}

/// Encode a child failure report.
fn encode_report(step: ChildStep, errno: i32) -> [u8; REPORT_LEN]
{
    let mut report = [0u8; REPORT_LEN];
    report[0] = step as u8;
    report[1..].copy_from_slice(&errno.to_ne_bytes());
    report
}

/// Decode what the parent read from the error pipe.
///
/// `Ok(())` means EOF without a report: the exec succeeded.
fn decode_report(bytes: &[u8]) -> SdbResult<()>
{
    if bytes.is_empty() {
        return Ok(());
    }

    let step = bytes.first().copied().and_then(ChildStep::from_byte);
    let errno = bytes
        .get(1..REPORT_LEN)
        .and_then(|raw| <[u8; 4]>::try_from(raw).ok())
        .map(i32::from_ne_bytes);

    match (step, errno) {
        (Some(step), Some(errno)) => Err(SdbError::system_call(step.call_name(), Errno::from_raw(errno))),
        // A truncated report still means the child did not exec
        _ => Err(SdbError::system_call(sys::EXECVP, Errno::UnknownErrno)),
    }
}

/// Everything the child needs, allocated before the fork.
struct ExecImage
{
    program: CString,
    // Keeps the strings `argv` points into alive
    _args: Vec<CString>,
    argv: Vec<*const libc::c_char>,
}

impl ExecImage
{
    /// Build `argv = [program, args...]`, as `execlp(path, path, ...)` would.
    fn new(program: &str, args: &[&str]) -> SdbResult<Self>
    {
        if program.is_empty() {
            return Err(SdbError::InvalidArgument("Program path cannot be empty".to_string()));
        }

        let program_cstr =
            CString::new(program).map_err(|e| SdbError::InvalidArgument(format!("Invalid program path: {e}")))?;

        let mut arg_cstrs = Vec::with_capacity(args.len() + 1);
        arg_cstrs.push(program_cstr.clone());
        for arg in args {
            arg_cstrs.push(CString::new(*arg).map_err(|e| SdbError::InvalidArgument(format!("Invalid argument: {e}")))?);
        }

        // Null-terminated argv
        let mut argv: Vec<*const libc::c_char> = arg_cstrs.iter().map(|s| s.as_ptr()).collect();
        argv.push(ptr::null());

        Ok(Self {
            program: program_cstr,
            _args: arg_cstrs,
            argv,
        })
    }
}

/// Create a close-on-exec pipe used by the child to report failures.
fn create_error_pipe() -> SdbResult<(OwnedFd, OwnedFd)>
{
    let mut fds: [RawFd; 2] = [0; 2];
    // SAFETY: `fds` has room for the two descriptors pipe2 writes
    let result = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };
    Errno::result(result).map_err(|errno| SdbError::system_call(sys::PIPE2, errno))?;

    // SAFETY: pipe2 succeeded, so both descriptors are open and owned by nobody else
    unsafe { Ok((OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1]))) }
}

/// Child side of the fork. Never returns.
///
/// Only async-signal-safe calls are allowed here: no allocation, no locks,
/// no logging, no unwinding.
fn run_child(image: &ExecImage, error_fd: RawFd) -> !
{
    let (step, errno) = match ptrace::traceme() {
        Err(errno) => (ChildStep::TraceMe, errno as i32),
        Ok(()) => {
            // SAFETY: `program` and `argv` are valid, null-terminated and outlive the call
            unsafe { libc::execvp(image.program.as_ptr(), image.argv.as_ptr()) };
            (ChildStep::Exec, Errno::last_raw())
        }
    };

    let report = encode_report(step, errno);
    // SAFETY: writing a stack buffer to an fd we own, then terminating without
    // running any destructors or atexit handlers inherited from the parent
    unsafe {
        let _ = libc::write(error_fd, report.as_ptr().cast(), report.len());
        libc::_exit(CHILD_FAILURE_STATUS)
    }
}

/// Process launch functions for the Linux controller.
pub(crate) struct LaunchManager;

impl LaunchManager
{
    /// Fork a traced child running `program`.
    ///
    /// Returns once the child has either replaced its image (the caller must
    /// then wait for the exec trace-stop) or failed, in which case the child
    /// has been reaped and its error is returned.
    ///
    /// ## Errors
    ///
    /// - `InvalidArgument`: empty path, or a path/argument containing NUL
    /// - `SystemCall`: `pipe2`, `fork`, or the child's `ptrace(PTRACE_TRACEME)`/`execvp`
    pub(crate) fn launch(program: &str, args: &[&str]) -> SdbResult<Pid>
    {
        info!("Launching process: {} with args: {:?}", program, args);
        debug!("Preparing exec image");
        let image = ExecImage::new(program, args)?;
        let (read_end, write_end) = create_error_pipe()?;

        trace!("Calling fork");
        // SAFETY: the child branch only runs async-signal-safe code (see `run_child`)
        let fork_result = unsafe { fork() }.map_err(|errno| SdbError::system_call(sys::FORK, errno))?;

        let pid = match fork_result {
            ForkResult::Child => run_child(&image, write_end.as_raw_fd()),
            ForkResult::Parent { child } => child,
        };

        // Only the child may hold the write end, or we would never see EOF
        drop(write_end);

        let mut report = Vec::with_capacity(REPORT_LEN);
        let read_result = File::from(read_end).read_to_end(&mut report);

        let outcome = match read_result {
            Ok(_) => decode_report(&report),
            Err(err) => Err(SdbError::system_call(
                "read",
                err.raw_os_error().map_or(Errno::UnknownErrno, Errno::from_raw),
            )),
        };

        if let Err(err) = outcome {
            debug!(%pid, error = %err, "Child failed before exec, reaping it");
            reap_failed_child(pid);
            return Err(err);
        }

        info!("Successfully spawned process with PID: {}", pid);
        Ok(pid)
    }
}

/// Collect a child that is exiting (or must be made to exit) after a failed launch.
fn reap_failed_child(pid: Pid)
{
    // If the pipe read itself failed the child may still be alive
    let _ = sys::kill(pid, nix::sys::signal::Signal::SIGKILL);
    let _ = sys::waitpid_uninterrupted(pid);
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_decode_report_names_the_failing_call()
    {
        let report = encode_report(ChildStep::Exec, libc::ENOENT);
        let err = decode_report(&report).unwrap_err();
        assert_eq!(err, SdbError::system_call(sys::EXECVP, Errno::ENOENT));

        let report = encode_report(ChildStep::TraceMe, libc::EPERM);
        let err = decode_report(&report).unwrap_err();
        assert_eq!(err, SdbError::system_call(sys::PTRACE_TRACEME, Errno::EPERM));
    }

    #[test]
    fn test_empty_report_means_exec_succeeded()
    {
        assert!(decode_report(&[]).is_ok());
    }

    #[test]
    fn test_truncated_report_is_still_a_failure()
    {
        let err = decode_report(&[ChildStep::Exec as u8, 0]).unwrap_err();
        assert!(matches!(err, SdbError::SystemCall { call: "execvp", .. }));
    }

    #[test]
    fn test_exec_image_rejects_bad_input()
    {
        assert!(matches!(ExecImage::new("", &[]), Err(SdbError::InvalidArgument(_))));
        assert!(matches!(ExecImage::new("a\0b", &[]), Err(SdbError::InvalidArgument(_))));
        assert!(matches!(ExecImage::new("true", &["x\0"]), Err(SdbError::InvalidArgument(_))));
    }

    #[test]
    fn test_exec_image_argv_starts_with_program()
    {
        let image = ExecImage::new("sleep", &["5"]).unwrap();
        assert_eq!(image.argv.len(), 3);
        assert!(image.argv[2].is_null());
        // SAFETY: argv[0] points into `image._args`, which is alive
        let argv0 = unsafe { std::ffi::CStr::from_ptr(image.argv[0]) };
        assert_eq!(argv0.to_str().unwrap(), "sleep");
    }
}
