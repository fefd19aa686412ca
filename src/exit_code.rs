// Copyright 2021 - 2025 Martin Pool

//! Exit codes for the driver binary, and the two reserved child exit codes
//! used by the fork sandbox (`spec.md` §6).
//!
//! These are assigned so that CI or other automation can distinguish
//! outcomes without parsing output.

/// Everything worked and all mutants were caught.
pub const SUCCESS: i32 = 0;

/// Bad arguments, unknown operator group, missing input: a configuration
/// error (`spec.md` §7).
pub const USAGE: i32 = 1;

/// One or more mutants survived the test suite.
pub const FOUND_PROBLEMS: i32 = 2;

/// One or more tests timed out.
pub const TIMEOUT: i32 = 3;

/// The baseline (unmutated) test run already failed.
pub const BASELINE_FAILED: i32 = 4;

/// Toolchain failure (compile or link) in strict mode.
pub const TOOLCHAIN_FAILED: i32 = 5;

/// An internal software error: an IR-structural assertion failed.
pub const SOFTWARE: i32 = 70;

/// Reserved exit code written by the fork-sandboxed child on ordinary
/// completion (`spec.md` §6). Chosen, as the spec allows, to be an
/// improbable value so that a test calling `exit(NORMAL_EXIT_CODE)`
/// directly is vanishingly unlikely to be mistaken for a clean exit; see
/// the Open Question in `spec.md` §9 and the decision recorded in
/// `DESIGN.md`.
pub const NORMAL_EXIT_CODE: i32 = 193;

/// Reserved exit code written by the SIGALRM handler when a test's
/// timeout fires.
pub const TIMEOUT_EXIT_CODE: i32 = 194;
