// Copyright 2021 - 2025 Martin Pool

//! The null sandbox (`spec.md` §4.6): runs the test function in-process,
//! with no crash or timeout containment. Useful for unit tests of the
//! engine itself and for quick dry-runs where isolation doesn't matter.

use std::time::{Duration, Instant};

use super::{ExecutionResult, Sandbox, Status};
use crate::Result;

pub struct NullSandbox;

impl Sandbox for NullSandbox {
    fn run(&self, _timeout: Duration, invoke: &(dyn Fn() -> Status + Send + Sync)) -> Result<ExecutionResult> {
        let start = Instant::now();
        let status = invoke();
        Ok(ExecutionResult {
            status,
            wall_time: start.elapsed(),
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn runs_the_closure_in_process() {
        let sandbox = NullSandbox;
        let result = sandbox.run(Duration::from_secs(1), &|| Status::Passed).unwrap();
        assert_eq!(result.status, Status::Passed);
    }
}
