// Copyright 2021 - 2025 Martin Pool

//! A test under the engine's control (`spec.md` §3, "Test"): either a
//! framework-discovered test, whose entry point is a well-known body
//! symbol the instrumented binary exposes directly, or a custom test that
//! also needs a program name and argv to invoke.

use serde::{Deserialize, Serialize};

use crate::ir::FunctionIndex;

/// How a `TestCase`'s compiled binary is invoked.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Invocation {
    /// The entry function itself is the whole test; running it means
    /// calling straight into the instrumented/mutated binary's test
    /// runner with no extra process arguments.
    Framework,
    /// A specific external program and argument vector, for tests that
    /// are themselves a separate executable driving the library under
    /// test.
    Custom { program: String, argv: Vec<String> },
}

/// One test `{name, entryFunction, invocation}` (`spec.md` §3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub entry_function: FunctionIndex,
    pub invocation: Invocation,
}

impl TestCase {
    pub fn framework(name: impl Into<String>, entry_function: FunctionIndex) -> TestCase {
        TestCase { name: name.into(), entry_function, invocation: Invocation::Framework }
    }

    pub fn custom(
        name: impl Into<String>,
        entry_function: FunctionIndex,
        program: impl Into<String>,
        argv: Vec<String>,
    ) -> TestCase {
        TestCase {
            name: name.into(),
            entry_function,
            invocation: Invocation::Custom { program: program.into(), argv },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn framework_test_has_no_argv() {
        let t = TestCase::framework("sum_test", 3);
        assert!(matches!(t.invocation, Invocation::Framework));
    }

    #[test]
    fn custom_test_carries_program_and_argv() {
        let t = TestCase::custom("golden_file", 3, "./run.sh", vec!["--golden".into()]);
        match t.invocation {
            Invocation::Custom { program, argv } => {
                assert_eq!(program, "./run.sh");
                assert_eq!(argv, vec!["--golden".to_string()]);
            }
            other => panic!("expected Custom, got {other:?}"),
        }
    }
}
