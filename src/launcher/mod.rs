// Copyright 2021 - 2025 Martin Pool

//! Loads and runs a compiled test binary (`spec.md` §4.6, §9): the
//! collaborator that actually calls into code the `Toolchain` produced.
//!
//! Like `Toolchain` and `Sandbox`, `Engine` depends on this as a trait
//! rather than a private function, so tests can supply a fake and
//! `main.rs` supplies a concrete default. An implementation is only ever
//! called from inside a `Sandbox`-managed invocation: crash and timeout
//! containment is the sandbox's job, not this trait's.

#[cfg(unix)]
mod dlopen;
mod null;

#[cfg(unix)]
pub use dlopen::DlopenLauncher;
pub use null::NullLauncher;

use camino::Utf8Path;

use crate::sandbox::Status;
use crate::test_case::TestCase;
use crate::Result;

/// Runs one test invocation against one compiled binary.
pub trait Launcher: Send + Sync {
    /// Call `entry_symbol` (a framework test) or spawn the test's own
    /// program (a custom test) against the binary at `binary`, with
    /// `env_var` exported for the duration of the call if given
    /// (`spec.md` §6: mutant activation via environment variable).
    fn run_test(
        &self,
        binary: &Utf8Path,
        entry_symbol: &str,
        test: &TestCase,
        env_var: Option<&str>,
    ) -> Result<Status>;

    /// Run `test`'s entry point once with call-tree instrumentation
    /// active, and write the resulting mapping table (`mapping_len`
    /// 64-bit words, little-endian) to `dump_path` (`spec.md` §4.4).
    fn run_for_mapping(
        &self,
        binary: &Utf8Path,
        entry_symbol: &str,
        test: &TestCase,
        mapping_len: usize,
        dump_path: &Utf8Path,
    ) -> Result<()>;
}
