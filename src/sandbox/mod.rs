// Copyright 2021 - 2025 Martin Pool

//! Test execution sandboxes (`spec.md` §4.6): run one test invocation and
//! classify the outcome, isolating the driver from a test that crashes,
//! hangs, or otherwise misbehaves.

#[cfg(unix)]
mod fork;
mod null;

#[cfg(unix)]
pub use fork::ForkSandbox;
pub use null::NullSandbox;

use std::time::Duration;

use crate::Result;

/// The outcome of one test invocation, as classified by the sandbox
/// (`spec.md` §3).
#[derive(Clone, Copy, Eq, PartialEq, Debug, serde::Serialize)]
pub enum Status {
    /// Default/unset: no invocation has been recorded yet.
    Invalid,
    /// The test ran to completion and reported failure.
    Failed,
    /// The test ran to completion and reported success.
    Passed,
    /// The test's wall-clock budget was exceeded.
    Timedout,
    /// The test process was terminated by a signal.
    Crashed,
    /// The test process exited with neither the reserved normal-exit code
    /// nor a recognized failure code.
    AbnormalExit,
    /// The sandbox was asked to skip execution and report nothing, e.g.
    /// for a `--dry-run` listing.
    DryRun,
}

/// One test invocation's full result: the classification plus whatever
/// diagnostics a report formatter might want to show.
#[derive(Clone, Debug)]
pub struct ExecutionResult {
    pub status: Status,
    pub wall_time: Duration,
    pub stdout: String,
    pub stderr: String,
    /// The raw process exit code, when the process exited normally rather
    /// than being killed by a signal.
    pub exit_code: Option<i32>,
}

/// Something that can run a single test invocation to completion (or
/// force it to stop) and classify the result. A test invocation is
/// represented here as an opaque closure rather than a `Test` value: by
/// the time a sandbox runs, the caller has already resolved `Test` down
/// to "run this compiled entry point with these arguments", which for the
/// fork sandbox means launching a subprocess and for the null sandbox
/// means calling the closure directly.
pub trait Sandbox: Send + Sync {
    fn run(&self, timeout: Duration, invoke: &(dyn Fn() -> Status + Send + Sync)) -> Result<ExecutionResult>;
}
