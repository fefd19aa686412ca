// Copyright 2021 - 2025 Martin Pool

//! Junk-mutant filtering (`spec.md` §4.2): a hook the planner consults
//! after an operator offers a candidate, so uninteresting mutants (those
//! syntactically generated but known ahead of time to be equivalent or
//! untestable) never reach compilation.

use crate::ir::Function;
use crate::mutation_point::MutationPoint;

/// Decides whether a candidate mutation point is worth keeping.
pub trait JunkFilter: Send + Sync {
    /// Returns `true` if `point` should be kept.
    fn keep(&self, function: &Function, point: &MutationPoint) -> bool;
}

/// The default filter: keeps everything. Real junk heuristics (e.g.
/// skipping mutations inside generated accessors, or inside code already
/// marked with `#[mutants::skip]`-equivalent annotations for the source
/// language) are a matter of policy, not of this engine's core semantics,
/// so callers compose their own `JunkFilter` rather than this crate trying
/// to guess which mutants are "boring" on their behalf.
pub struct NullJunkFilter;

impl JunkFilter for NullJunkFilter {
    fn keep(&self, _function: &Function, _point: &MutationPoint) -> bool {
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn null_junk_filter_keeps_everything() {
        let f = Function::new("f", 0, false);
        let point = MutationPoint {
            operator_id: crate::operators::OperatorId::AddToSub,
            address: crate::mutation_point::Address {
                function_index: 0,
                basic_block_index: 0,
                instruction_index: 0,
            },
            module: crate::bitcode::ModuleId::from_hex("a".into()),
            diagnostic: String::new(),
            replacement: String::new(),
            source_location: None,
        };
        assert!(NullJunkFilter.keep(&f, &point));
    }
}
