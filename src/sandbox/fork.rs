// Copyright 2021 - 2025 Martin Pool

//! The fork sandbox (`spec.md` §4.6): the authoritative sandbox variant,
//! grounded directly in the fork/timer/shared-memory protocol the
//! original implementation's `ForkProcessSandbox` used.

use std::ffi::c_void;
use std::io::Read;
use std::os::unix::io::AsRawFd;
use std::ptr;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult};

use super::{ExecutionResult, Sandbox, Status};
use crate::exit_code::{NORMAL_EXIT_CODE, TIMEOUT_EXIT_CODE};
use crate::Result;

/// One word of memory shared between parent and child across `fork()`,
/// used to carry the child's `Status` back since the child's address
/// space otherwise disappears with it.
struct SharedStatusWord {
    ptr: *mut i32,
}

// SAFETY: the pointer is backed by an anonymous `MAP_SHARED` mapping, not
// process-local memory, so it's valid to read and write from whichever
// process holds this handle.
unsafe impl Send for SharedStatusWord {}

impl SharedStatusWord {
    fn allocate() -> Result<SharedStatusWord> {
        let size = std::mem::size_of::<i32>();
        // SAFETY: fixed-size anonymous shared mapping, no file backing.
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            bail!("mmap failed: {}", std::io::Error::last_os_error());
        }
        let word = SharedStatusWord { ptr: addr as *mut i32 };
        word.set(-1);
        Ok(word)
    }

    fn set(&self, value: i32) {
        // SAFETY: `ptr` points at a live `size_of::<i32>()` shared mapping
        // for the lifetime of `self`.
        unsafe { ptr::write_volatile(self.ptr, value) }
    }

    fn get(&self) -> i32 {
        // SAFETY: see `set`.
        unsafe { ptr::read_volatile(self.ptr) }
    }
}

impl Drop for SharedStatusWord {
    fn drop(&mut self) {
        // SAFETY: matches the `mmap` call in `allocate`.
        unsafe {
            libc::munmap(self.ptr as *mut c_void, std::mem::size_of::<i32>());
        }
    }
}

fn status_to_raw(status: Status) -> i32 {
    match status {
        Status::Passed => 0,
        Status::Failed => 1,
        // The remaining variants are never written by the child directly;
        // they're produced by the parent's exit-code classification.
        Status::Timedout | Status::Crashed | Status::AbnormalExit | Status::Invalid | Status::DryRun => -1,
    }
}

fn raw_to_status(raw: i32) -> Status {
    match raw {
        0 => Status::Passed,
        _ => Status::Failed,
    }
}

extern "C" fn alarm_handler(_signum: libc::c_int) {
    // Async-signal-safe exit only: no allocation, no locking.
    unsafe { libc::_exit(TIMEOUT_EXIT_CODE) }
}

fn install_alarm_handler_and_arm_timer(timeout: Duration) -> Result<()> {
    // SAFETY: installs a plain C function pointer handler for SIGALRM;
    // no Rust closures or captured state cross the signal boundary.
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = alarm_handler as usize;
        libc::sigemptyset(&mut action.sa_mask);
        action.sa_flags = 0;
        if libc::sigaction(libc::SIGALRM, &action, ptr::null_mut()) != 0 {
            bail!("sigaction failed: {}", std::io::Error::last_os_error());
        }

        let micros = timeout.as_micros().min(i64::MAX as u128) as i64;
        let it = libc::itimerval {
            it_interval: libc::timeval { tv_sec: 0, tv_usec: 0 },
            it_value: libc::timeval { tv_sec: micros / 1_000_000, tv_usec: micros % 1_000_000 },
        };
        if libc::setitimer(libc::ITIMER_REAL, &it, ptr::null_mut()) != 0 {
            bail!("setitimer failed: {}", std::io::Error::last_os_error());
        }
    }
    Ok(())
}

fn redirect_fd(from: impl AsRawFd, to: libc::c_int) -> Result<()> {
    // SAFETY: `dup2` with both arguments valid, open file descriptors.
    let rc = unsafe { libc::dup2(from.as_raw_fd(), to) };
    if rc < 0 {
        bail!("dup2 failed: {}", std::io::Error::last_os_error());
    }
    Ok(())
}

/// The authoritative sandbox: forks a child for each invocation, runs the
/// test function in the child (no `exec`, matching the protocol's
/// "run the test function" step), and classifies the result in the
/// parent (`spec.md` §4.6).
///
/// The child must not be multi-threaded at the point of `fork`: only the
/// calling thread survives into the child, so any lock held by another
/// thread at fork time would deadlock the child forever. Callers are
/// expected to invoke this sandbox from a worker whose test-running path
/// does not itself spawn threads before calling in.
pub struct ForkSandbox;

impl Sandbox for ForkSandbox {
    fn run(&self, timeout: Duration, invoke: &(dyn Fn() -> Status + Send + Sync)) -> Result<ExecutionResult> {
        let shared = SharedStatusWord::allocate()?;
        let stdout_file = tempfile::NamedTempFile::new().context("creating stdout temp file")?;
        let stderr_file = tempfile::NamedTempFile::new().context("creating stderr temp file")?;

        let start = Instant::now();
        // SAFETY: child performs only async-signal-safe setup before
        // running `invoke` and exiting; no Rust destructors that assume
        // other threads still exist are run in the child's path.
        match unsafe { fork() }.context("fork failed")? {
            ForkResult::Child => {
                if redirect_fd(&stdout_file, libc::STDOUT_FILENO).is_err()
                    || redirect_fd(&stderr_file, libc::STDERR_FILENO).is_err()
                    || install_alarm_handler_and_arm_timer(timeout).is_err()
                {
                    unsafe { libc::_exit(crate::exit_code::SOFTWARE) }
                }
                let status = invoke();
                shared.set(status_to_raw(status));
                unsafe { libc::_exit(NORMAL_EXIT_CODE) }
            }
            ForkResult::Parent { child } => {
                let wait_status = loop {
                    match waitpid(child, None) {
                        Ok(s) => break s,
                        Err(nix::errno::Errno::EINTR) => continue,
                        Err(e) => return Err(e).context("waitpid failed"),
                    }
                };
                let wall_time = start.elapsed();

                let mut stdout = String::new();
                let mut stderr = String::new();
                let _ = std::fs::File::open(stdout_file.path()).and_then(|mut f| f.read_to_string(&mut stdout));
                let _ = std::fs::File::open(stderr_file.path()).and_then(|mut f| f.read_to_string(&mut stderr));

                let (status, exit_code) = classify(wait_status, shared.get());
                Ok(ExecutionResult { status, wall_time, stdout, stderr, exit_code })
            }
        }
    }
}

fn classify(wait_status: WaitStatus, raw_status: i32) -> (Status, Option<i32>) {
    match wait_status {
        WaitStatus::Signaled(_, _, _) => (Status::Crashed, None),
        WaitStatus::Exited(_, code) if code == TIMEOUT_EXIT_CODE => (Status::Timedout, Some(code)),
        WaitStatus::Exited(_, code) if code != NORMAL_EXIT_CODE => (Status::AbnormalExit, Some(code)),
        WaitStatus::Exited(_, code) => (raw_to_status(raw_status), Some(code)),
        _ => (Status::AbnormalExit, None),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classifies_signaled_exit_as_crashed() {
        let (status, code) = classify(WaitStatus::Signaled(nix::unistd::Pid::from_raw(1), nix::sys::signal::Signal::SIGSEGV, false), -1);
        assert_eq!(status, Status::Crashed);
        assert_eq!(code, None);
    }

    #[test]
    fn classifies_timeout_exit_code() {
        let (status, _) = classify(
            WaitStatus::Exited(nix::unistd::Pid::from_raw(1), TIMEOUT_EXIT_CODE),
            -1,
        );
        assert_eq!(status, Status::Timedout);
    }

    #[test]
    fn classifies_unrecognized_exit_code_as_abnormal() {
        let (status, _) = classify(WaitStatus::Exited(nix::unistd::Pid::from_raw(1), 17), -1);
        assert_eq!(status, Status::AbnormalExit);
    }

    #[test]
    fn passes_child_written_status_through_on_normal_exit() {
        let (status, _) = classify(
            WaitStatus::Exited(nix::unistd::Pid::from_raw(1), NORMAL_EXIT_CODE),
            status_to_raw(Status::Passed),
        );
        assert_eq!(status, Status::Passed);
    }

    #[test]
    fn fork_sandbox_runs_a_passing_test_end_to_end() {
        let sandbox = ForkSandbox;
        let result = sandbox
            .run(Duration::from_secs(5), &|| Status::Passed)
            .expect("fork sandbox run");
        assert_eq!(result.status, Status::Passed);
    }
}
