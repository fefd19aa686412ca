// Copyright 2021 - 2025 Martin Pool

//! A `Launcher` stub for non-unix targets, where `dlopen` isn't available
//! (`DlopenLauncher` is `cfg(unix)`-only, the same way `sandbox::fork` is).
//! Exists only so the crate still compiles on a non-unix host; it cannot
//! actually run a compiled test there.

use camino::Utf8Path;

use super::Launcher;
use crate::sandbox::Status;
use crate::test_case::TestCase;
use crate::Result;

pub struct NullLauncher;

impl Launcher for NullLauncher {
    fn run_test(
        &self,
        _binary: &Utf8Path,
        _entry_symbol: &str,
        _test: &TestCase,
        _env_var: Option<&str>,
    ) -> Result<Status> {
        anyhow::bail!("no Launcher is available on this platform")
    }

    fn run_for_mapping(
        &self,
        _binary: &Utf8Path,
        _entry_symbol: &str,
        _test: &TestCase,
        _mapping_len: usize,
        _dump_path: &Utf8Path,
    ) -> Result<()> {
        anyhow::bail!("no Launcher is available on this platform")
    }
}
