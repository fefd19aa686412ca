// Copyright 2021 - 2025 Martin Pool

//! The mutation planner (`spec.md` §4.2): for each selected function,
//! offer every instruction to every enabled operator, gate the results
//! through the junk filter, and deduplicate by `userIdentifier`.

use std::collections::{HashMap, HashSet};

use crate::bitcode::ModuleId;
use crate::ir::{FunctionIndex, Module};
use crate::junk::JunkFilter;
use crate::mutation_point::MutationPoint;
use crate::operators::MutationOperator;
use crate::Result;

/// The planner's output: a flat, deduplicated list of mutation points plus
/// the per-function index the rest of the pipeline (call-tree filtering,
/// the trampoline rewriter) iterates over.
#[derive(Default)]
pub struct MutationPlan {
    pub points: Vec<MutationPoint>,
    pub by_function: HashMap<FunctionIndex, Vec<usize>>,
}

impl MutationPlan {
    pub fn points_for_function(&self, function_index: FunctionIndex) -> impl Iterator<Item = &MutationPoint> {
        self.by_function
            .get(&function_index)
            .into_iter()
            .flatten()
            .map(move |&i| &self.points[i])
    }

    pub fn function_has_points(&self, function_index: FunctionIndex) -> bool {
        self.by_function
            .get(&function_index)
            .is_some_and(|v| !v.is_empty())
    }
}

/// Plan mutations for every function in `module`, in program order
/// (`spec.md` §4.2: "function ordinal, basic-block ordinal, instruction
/// ordinal").
///
/// Candidate discovery is data-parallel over functions (`spec.md` §4.2),
/// using up to `workers` threads; the per-function candidate lists are
/// then merged back in function order below, so the final point list is
/// deterministic regardless of how the worker pool happened to schedule
/// them.
pub fn plan(
    module_id: &ModuleId,
    module: &Module,
    operators: &[Box<dyn MutationOperator>],
    junk_filter: &dyn JunkFilter,
    workers: usize,
) -> Result<MutationPlan> {
    let indexed: Vec<(FunctionIndex, &crate::ir::Function)> = module.functions.iter().enumerate().collect();

    let per_function: Vec<Vec<MutationPoint>> = crate::executor::execute(
        &indexed,
        workers,
        false,
        |_worker, &(function_index, function)| {
            let mut candidates = Vec::new();
            for operator in operators {
                for point in operator.find_candidates(module_id, function_index, function) {
                    if junk_filter.keep(function, &point) {
                        candidates.push(point);
                    }
                }
            }
            candidates
        },
    )?;

    let mut plan = MutationPlan::default();
    let mut seen_identifiers = HashSet::new();

    for (function_index, candidates) in per_function.into_iter().enumerate() {
        let mut indices_for_function = Vec::new();
        for point in candidates {
            if !seen_identifiers.insert(point.user_identifier()) {
                continue; // duplicate userIdentifier: collapse (spec.md §4.2)
            }
            let index = plan.points.len();
            plan.points.push(point);
            indices_for_function.push(index);
        }
        plan.by_function.insert(function_index, indices_for_function);
    }

    Ok(plan)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::{BasicBlock, BinOp, Function, Instruction, Value, ValueId};
    use crate::junk::NullJunkFilter;
    use crate::operators::{catalog_for, expand_group};

    fn sample_module() -> Module {
        let mut module = Module::new("m");
        let mut f = Function::new("add_one", 1, true);
        f.blocks.push(BasicBlock {
            instructions: vec![
                Instruction::BinOp {
                    dest: ValueId(0),
                    op: BinOp::Add,
                    lhs: Value::Arg(0),
                    rhs: Value::Const(crate::ir::ConstVal::Int(1)),
                    compound_target: None,
                },
                Instruction::Ret {
                    value: Some(Value::Local(ValueId(0))),
                },
            ],
        });
        module.functions.push(f);
        module
    }

    #[test]
    fn plans_one_point_per_matching_operator() {
        let module_id = ModuleId::from_hex("a".into());
        let module = sample_module();
        let ids = expand_group("default").unwrap();
        let operators = catalog_for(&ids);
        let plan = plan(&module_id, &module, &operators, &NullJunkFilter, 2).unwrap();
        assert!(plan.function_has_points(0));
        assert!(plan
            .points
            .iter()
            .any(|p| p.operator_id == crate::operators::OperatorId::AddToSub));
    }

    #[test]
    fn deduplicates_by_user_identifier() {
        let module_id = ModuleId::from_hex("a".into());
        let module = sample_module();
        let ids = expand_group("default").unwrap();
        // Build the catalog twice over so the same operator is offered
        // twice; the planner must still only keep one point per identifier.
        let mut operators = catalog_for(&ids);
        operators.extend(catalog_for(&ids));
        let plan = plan(&module_id, &module, &operators, &NullJunkFilter, 2).unwrap();
        let identifiers: HashSet<_> = plan.points.iter().map(|p| p.user_identifier()).collect();
        assert_eq!(identifiers.len(), plan.points.len());
    }
}
