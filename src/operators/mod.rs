// Copyright 2021 - 2025 Martin Pool

//! The mutation-operator catalog (`spec.md` §4.1): a closed, enumerated
//! set of operators, each able to locate candidate instructions in a
//! function and apply its rewrite in place on a cloned function body.

mod arithmetic;
mod bitwise;
mod call;
mod constant;
mod control;
mod logical;
mod relational;

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use strum::{Display, EnumIter, EnumString};

use crate::bitcode::ModuleId;
use crate::ir::{Function, FunctionIndex};
use crate::mutation_point::{Address, MutationPoint};
use crate::Result;

/// The closed set of mutation operators. The string form (via `strum`) is
/// also the `operatorId` that appears in a mutation point's
/// `userIdentifier` (`spec.md` §3) and is therefore part of the engine's
/// stable, user-facing vocabulary: renaming a variant is a breaking
/// change to every previously-recorded mutant id.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, EnumString, EnumIter, serde::Serialize)]
#[strum(serialize_all = "snake_case")]
pub enum OperatorId {
    AddToSub,
    MulToDiv,
    RemToDiv,
    ShlToShr,
    AndToOr,
    XorToOr,
    LtToLe,
    GtToGe,
    LtToGe,
    GtToLe,
    EqToNe,
    #[strum(serialize = "cxx_logical_or_to_and")]
    LogicalOrToAnd,
    #[strum(serialize = "cxx_logical_and_to_or")]
    LogicalAndToOr,
    NegateBranchCondition,
    ReplaceCallWithConstant,
    RemoveVoidCall,
    ScalarValueReplacement,
    NumberInitConst,
    NumberAssignConst,
}

/// The stable, user-facing operator group names (`spec.md` §4.1).
#[derive(Clone, Copy, Eq, PartialEq, Debug, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Group {
    Arithmetic,
    Bitwise,
    #[strum(serialize = "relational_boundary")]
    RelationalBoundary,
    #[strum(serialize = "relational_negation")]
    RelationalNegation,
    #[strum(serialize = "logical_connective")]
    LogicalConnective,
    Control,
    Call,
    Constant,
}

impl Group {
    fn operators(self) -> &'static [OperatorId] {
        use OperatorId::*;
        match self {
            Group::Arithmetic => &[AddToSub, MulToDiv, RemToDiv],
            Group::Bitwise => &[ShlToShr, AndToOr, XorToOr],
            Group::RelationalBoundary => &[LtToLe, GtToGe],
            Group::RelationalNegation => &[LtToGe, GtToLe, EqToNe],
            Group::LogicalConnective => &[LogicalOrToAnd, LogicalAndToOr],
            Group::Control => &[NegateBranchCondition],
            Group::Call => &[ReplaceCallWithConstant, RemoveVoidCall],
            Group::Constant => &[ScalarValueReplacement, NumberInitConst, NumberAssignConst],
        }
    }
}

/// One entry in a named-group expansion: either a concrete operator, or a
/// reference to another named group (resolved by fixed-point expansion,
/// `spec.md` §4.1).
enum Entry {
    Op(OperatorId),
    NamedGroup(&'static str),
}

/// Named groups resolve, by fixed-point expansion over `Entry::NamedGroup`
/// references, to a set of operator ids. `"default"` covers the operators
/// safe to enable without extra configuration; `"cxx"` covers the
/// control-flow-rewriting logical-connective operators and the bitwise
/// `xor_to_or` operator, which only make sense for C-family source
/// (matching the grouping in `original_source`'s `MutatorsFactory.cpp`,
/// which keeps "cxx" mutators behind their own flag); `"experimental"`
/// covers operators whose rewrite is riskier to apply blindly
/// (call-replacement, branch negation); `"all"` is everything.
static NAMED_GROUPS: Lazy<std::collections::HashMap<&'static str, Vec<Entry>>> = Lazy::new(|| {
    use OperatorId::*;
    let mut m = std::collections::HashMap::new();
    m.insert(
        "default",
        vec![
            Entry::NamedGroup("arithmetic"),
            Entry::NamedGroup("relational_boundary"),
            Entry::NamedGroup("relational_negation"),
            Entry::Op(ShlToShr),
            Entry::Op(AndToOr),
            Entry::NamedGroup("constant"),
        ],
    );
    m.insert(
        "experimental",
        vec![
            Entry::Op(NegateBranchCondition),
            Entry::Op(ReplaceCallWithConstant),
            Entry::Op(RemoveVoidCall),
        ],
    );
    m.insert(
        "cxx",
        vec![
            Entry::Op(XorToOr),
            Entry::NamedGroup("logical_connective"),
        ],
    );
    m.insert(
        "all",
        vec![
            Entry::NamedGroup("default"),
            Entry::NamedGroup("experimental"),
            Entry::NamedGroup("cxx"),
        ],
    );
    m
});

/// Expand a named group (or a bare operator-group name like `"arithmetic"`)
/// into its concrete operator ids, recursively resolving nested group
/// references to a fixed point.
pub fn expand_group(name: &str) -> Result<BTreeSet<OperatorId>> {
    let mut out = BTreeSet::new();
    expand_into(name, &mut out, &mut BTreeSet::new())?;
    Ok(out)
}

fn expand_into(
    name: &str,
    out: &mut BTreeSet<OperatorId>,
    seen: &mut BTreeSet<String>,
) -> Result<()> {
    if !seen.insert(name.to_owned()) {
        return Ok(()); // already expanded; fixed point reached for this branch
    }
    if let Ok(group) = name.parse::<Group>() {
        out.extend(group.operators());
        return Ok(());
    }
    if let Some(entries) = NAMED_GROUPS.get(name) {
        for entry in entries {
            match entry {
                Entry::Op(id) => {
                    out.insert(*id);
                }
                Entry::NamedGroup(inner) => expand_into(inner, out, seen)?,
            }
        }
        return Ok(());
    }
    anyhow::bail!("unknown operator group {name:?}");
}

/// Build a `MutationPoint` for an instruction at `(bb, i)`, filling in the
/// source location from the function's debug info when present. Shared by
/// every operator's `find_candidates` so the address/location bookkeeping
/// lives in one place.
fn mutation_point(
    module: &ModuleId,
    function_index: FunctionIndex,
    function: &Function,
    operator_id: OperatorId,
    bb: crate::ir::BlockIndex,
    i: crate::ir::InstrIndex,
    diagnostic: impl Into<String>,
    replacement: impl Into<String>,
) -> MutationPoint {
    MutationPoint {
        operator_id,
        address: Address {
            function_index,
            basic_block_index: bb,
            instruction_index: i,
        },
        module: module.clone(),
        diagnostic: diagnostic.into(),
        replacement: replacement.into(),
        source_location: function.debug_loc_at(bb, i).map(Into::into),
    }
}

/// `findCandidates(fn) -> list<MutationPoint>` / `apply(fn, address)`
/// (`spec.md` §4.1).
pub trait MutationOperator: Send + Sync {
    fn id(&self) -> OperatorId;

    fn find_candidates(
        &self,
        module: &ModuleId,
        function_index: FunctionIndex,
        function: &Function,
    ) -> Vec<MutationPoint>;

    /// Mutate the instruction at `address` in place. Callers are required
    /// by `spec.md` §3's invariant to only ever call this on a cloned
    /// function body, never on the function still referenced by the
    /// bitcode store.
    fn apply(&self, function: &mut Function, address: Address) -> Result<()>;
}

/// Construct the concrete operator implementation for an id.
pub fn operator_for(id: OperatorId) -> Box<dyn MutationOperator> {
    use OperatorId::*;
    match id {
        AddToSub => Box::new(arithmetic::AddToSub),
        MulToDiv => Box::new(arithmetic::MulToDiv),
        RemToDiv => Box::new(arithmetic::RemToDiv),
        ShlToShr => Box::new(bitwise::ShlToShr),
        AndToOr => Box::new(bitwise::AndToOr),
        XorToOr => Box::new(bitwise::XorToOr),
        LtToLe => Box::new(relational::LtToLe),
        GtToGe => Box::new(relational::GtToGe),
        LtToGe => Box::new(relational::LtToGe),
        GtToLe => Box::new(relational::GtToLe),
        EqToNe => Box::new(relational::EqToNe),
        LogicalOrToAnd => Box::new(logical::LogicalOrToAnd),
        LogicalAndToOr => Box::new(logical::LogicalAndToOr),
        NegateBranchCondition => Box::new(control::NegateBranchCondition),
        ReplaceCallWithConstant => Box::new(call::ReplaceCallWithConstant),
        RemoveVoidCall => Box::new(call::RemoveVoidCall),
        ScalarValueReplacement => Box::new(constant::ScalarValueReplacement),
        NumberInitConst => Box::new(constant::NumberInitConst),
        NumberAssignConst => Box::new(constant::NumberAssignConst),
    }
}

/// Build the concrete operator list for a set of ids, in a stable order
/// (enum declaration order), so that candidate collection in the planner
/// is deterministic regardless of the order the caller listed operators
/// in configuration.
pub fn catalog_for(ids: &BTreeSet<OperatorId>) -> Vec<Box<dyn MutationOperator>> {
    use strum::IntoEnumIterator;
    OperatorId::iter()
        .filter(|id| ids.contains(id))
        .map(operator_for)
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_group_excludes_cxx_only_operators() {
        let ops = expand_group("default").unwrap();
        assert!(!ops.contains(&OperatorId::LogicalOrToAnd));
        assert!(ops.contains(&OperatorId::AddToSub));
    }

    #[test]
    fn all_group_is_the_union_of_every_other_group() {
        let all = expand_group("all").unwrap();
        for g in ["default", "experimental", "cxx"] {
            for op in expand_group(g).unwrap() {
                assert!(all.contains(&op), "{g} operator {op} missing from all");
            }
        }
    }

    #[test]
    fn unknown_group_is_an_error() {
        assert!(expand_group("no_such_group").is_err());
    }

    #[test]
    fn operator_id_round_trips_through_display_and_parse() {
        for id in [OperatorId::AddToSub, OperatorId::LogicalOrToAnd] {
            let s = id.to_string();
            let parsed: OperatorId = s.parse().unwrap();
            assert_eq!(parsed, id);
        }
    }
}
