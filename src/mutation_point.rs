// Copyright 2021 - 2025 Martin Pool

//! Mutation points: the serializable coordinate of a candidate mutation,
//! plus the diagnostic and source-location metadata attached to it
//! (`spec.md` §3).

use std::fmt;

use serde::Serialize;

use crate::bitcode::ModuleId;
use crate::ir::{BlockIndex, FunctionIndex, InstrIndex};
use crate::operators::OperatorId;

/// A `(moduleHandle, functionIndex)` pair: a stable handle to one function.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct FunctionHandle {
    pub module: ModuleId,
    pub function_index: FunctionIndex,
}

/// The serializable coordinate of a mutation: a triple of ordinals that is
/// stable across processes, as opposed to an in-memory instruction
/// pointer.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub struct Address {
    pub function_index: FunctionIndex,
    pub basic_block_index: BlockIndex,
    pub instruction_index: InstrIndex,
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fn{}:bb{}:i{}",
            self.function_index, self.basic_block_index, self.instruction_index
        )
    }
}

/// A source location, when debug info is available.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub struct SourceLocation {
    pub file_path: String,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file_path, self.line, self.column)
    }
}

impl From<&crate::ir::DebugLoc> for SourceLocation {
    fn from(loc: &crate::ir::DebugLoc) -> SourceLocation {
        SourceLocation {
            file_path: loc.file.clone(),
            line: loc.line,
            column: loc.column,
        }
    }
}

/// A concrete instance of an operator's match at a specific code address.
#[derive(Clone, Debug, Serialize)]
pub struct MutationPoint {
    pub operator_id: OperatorId,
    pub address: Address,
    pub module: ModuleId,
    /// Human-readable description, e.g. "replace + with -".
    pub diagnostic: String,
    /// The replacement instruction, serialized for display purposes; the
    /// actual rewrite is performed by the operator's `apply`.
    pub replacement: String,
    pub source_location: Option<SourceLocation>,
}

impl MutationPoint {
    /// `"operatorId:filePath:line:column"`, stable across runs for a given
    /// source location and operator id (testable property 1, `spec.md`
    /// §8), and used as the environment-variable key that activates this
    /// mutant at runtime (`spec.md` §6).
    ///
    /// When two operators would otherwise collide on the same
    /// `(operatorId, location)` pair — e.g. a compound-assignment variant
    /// and its plain sibling both matching the same column — the operator
    /// id itself is already part of the key, which is the "stable
    /// disambiguation by operator-id suffix" the spec's Open Question
    /// (`spec.md` §9) asks for; see `DESIGN.md`.
    pub fn user_identifier(&self) -> String {
        match &self.source_location {
            Some(loc) => format!("{}:{}", self.operator_id, loc),
            None => format!("{}:{}", self.operator_id, self.address),
        }
    }

    /// The environment variable name used to activate this mutant. Valid
    /// shell/OS environment variable names can't contain `:`, so the
    /// identifier is transliterated; this is purely a runtime encoding
    /// detail and is not itself the stable identifier.
    pub fn env_var_name(&self) -> String {
        format!(
            "BCMUTANTS_MUTANT_{}",
            self.user_identifier()
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect::<String>()
                .to_ascii_uppercase()
        )
    }

    /// Whether this mutant's environment variable is set in the current
    /// process's environment (any non-null value activates it, per
    /// `spec.md` §6).
    pub fn is_activated(&self) -> bool {
        std::env::var_os(self.env_var_name()).is_some()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bitcode::ModuleId;
    use crate::test_util::{single_threaded_remove_env_var, single_threaded_set_env_var};
    use rusty_fork::rusty_fork_test;

    fn point(op: OperatorId, line: u32) -> MutationPoint {
        MutationPoint {
            operator_id: op,
            address: Address {
                function_index: 0,
                basic_block_index: 0,
                instruction_index: 0,
            },
            module: ModuleId::from_hex("deadbeef".into()),
            diagnostic: "replace + with -".into(),
            replacement: "-".into(),
            source_location: Some(SourceLocation {
                file_path: "sum.cpp".into(),
                line,
                column: 21,
            }),
        }
    }

    #[test]
    fn user_identifier_is_stable_function_of_operator_and_location() {
        let a = point(OperatorId::AddToSub, 1);
        let b = point(OperatorId::AddToSub, 1);
        assert_eq!(a.user_identifier(), b.user_identifier());
        assert_eq!(a.user_identifier(), "add_to_sub:sum.cpp:1:21");
    }

    #[test]
    fn different_operators_at_same_location_do_not_collide() {
        let a = point(OperatorId::AddToSub, 1);
        let b = point(OperatorId::MulToDiv, 1);
        assert_ne!(a.user_identifier(), b.user_identifier());
    }

    rusty_fork_test! {
        #[test]
        fn env_var_round_trips_activation() {
            let p = point(OperatorId::AddToSub, 42);
            let var = p.env_var_name();
            single_threaded_remove_env_var(&var);
            assert!(!p.is_activated());
            single_threaded_set_env_var(&var, "1");
            assert!(p.is_activated());
            single_threaded_remove_env_var(&var);
            assert!(!p.is_activated());
        }
    }
}
