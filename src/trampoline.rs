// Copyright 2021 - 2025 Martin Pool

//! The trampoline rewriter (`spec.md` §4.3): turns one function with N
//! mutation points into N+2 functions — N mutant bodies, the original
//! body under a new symbol, and a dispatcher under the original symbol
//! that forwards to whichever of those the active mutant's environment
//! variable selects.
//!
//! This engine's IR has no first-class function-pointer value, so the
//! dispatcher's call block calls the selected symbol directly rather than
//! loading a stored pointer and calling through it. The check chain is
//! built in reverse mutant order, so if more than one mutant's
//! environment variable is set at once (which should not occur), the
//! *last*-listed mutant's check runs first and wins, matching `spec.md`
//! §4.3's chain-order invariant.

use anyhow::Context;

use crate::ir::{BasicBlock, Function, Instruction, Linkage, Value, ValueId};
use crate::mutation_point::MutationPoint;
use crate::operators::operator_for;
use crate::Result;

/// The external symbol the dispatcher calls to test whether a mutant's
/// environment variable is set; analogous to `getenv(name) != NULL`.
pub const ENV_PROBE_SYMBOL: &str = "__bcmutants_env_is_set";

/// The three function bodies a single trampoline rewrite produces for one
/// original function.
pub struct TrampolineOutput {
    /// Replaces the original function under its original symbol.
    pub dispatcher: Function,
    /// One internal-linkage clone per mutation point, paired with the
    /// point it implements.
    pub mutants: Vec<(MutationPoint, Function)>,
    /// The unmutated body, preserved under a new symbol so the dispatcher
    /// can still fall through to original behavior.
    pub original: Function,
}

fn sanitize_symbol(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn mutant_symbol(base: &str, point: &MutationPoint) -> String {
    format!("{base}.bcmutants_mutant.{}", sanitize_symbol(&point.user_identifier()))
}

fn original_symbol(base: &str) -> String {
    format!("{base}.bcmutants_original")
}

/// Apply the trampoline rewrite to `function`, given the mutation points
/// planned for it. An empty `points` list is a no-op: the dispatcher is
/// `function` itself, unrenamed and unmutated, and there is no separate
/// "original" body to fall back to (testable property 2, `spec.md` §8:
/// "trampoline-rewriting `m` with an empty mutation list is a no-op").
pub fn rewrite(function: &Function, points: &[MutationPoint]) -> Result<TrampolineOutput> {
    if points.is_empty() {
        return Ok(TrampolineOutput {
            dispatcher: function.clone(),
            mutants: Vec::new(),
            original: function.clone(),
        });
    }

    let mut mutants = Vec::with_capacity(points.len());
    for point in points {
        let mut clone = function.clone();
        clone.name = mutant_symbol(&function.name, point);
        clone.linkage = Linkage::Internal;
        let operator = operator_for(point.operator_id);
        operator
            .apply(&mut clone, point.address)
            .with_context(|| format!("applying {} to {}", point.user_identifier(), function.name))?;
        mutants.push((point.clone(), clone));
    }

    let mut original = function.clone();
    original.name = original_symbol(&function.name);
    original.linkage = Linkage::Internal;

    let dispatcher = build_dispatcher(function, &mutants, &original);

    Ok(TrampolineOutput { dispatcher, mutants, original })
}

/// Forward every argument positionally, matching the function's own
/// parameter list.
fn forwarded_args(arg_count: u32) -> Vec<Value> {
    (0..arg_count).map(Value::Arg).collect()
}

fn build_dispatcher(
    original_shape: &Function,
    mutants: &[(MutationPoint, Function)],
    fallback: &Function,
) -> Function {
    let mut dispatcher = Function::new(
        original_shape.name.clone(),
        original_shape.arg_count,
        original_shape.returns_value,
    );
    dispatcher.linkage = original_shape.linkage;

    let args = forwarded_args(original_shape.arg_count);
    let mut next_value_id = 0u32;
    let mut fresh = || {
        let id = ValueId(next_value_id);
        next_value_id += 1;
        id
    };

    // Built in reverse so the last-listed mutant's check block comes
    // first at runtime and so wins if two env vars are set at once
    // (`spec.md` §4.3); `TrampolineOutput.mutants` itself keeps its
    // original order, since callers zip it against `points`.
    for (point, mutant) in mutants.iter().rev() {
        let check_bb = dispatcher.blocks.len();
        let call_bb = check_bb + 1;
        let next_bb = check_bb + 2; // next check block, or the fallback block for the last point

        let flag = fresh();
        dispatcher.blocks.push(BasicBlock {
            instructions: vec![
                Instruction::Call {
                    dest: Some(flag),
                    callee: ENV_PROBE_SYMBOL.to_owned(),
                    args: vec![Value::Global(point.env_var_name())],
                },
                Instruction::CondBr {
                    cond: Value::Local(flag),
                    then_bb: call_bb,
                    else_bb: next_bb,
                },
            ],
        });

        let result = if dispatcher.returns_value { Some(fresh()) } else { None };
        dispatcher.blocks.push(BasicBlock {
            instructions: vec![
                Instruction::Call {
                    dest: result,
                    callee: mutant.name.clone(),
                    args: args.clone(),
                },
                Instruction::Ret { value: result.map(Value::Local) },
            ],
        });
    }

    let fallback_result = if dispatcher.returns_value { Some(fresh()) } else { None };
    dispatcher.blocks.push(BasicBlock {
        instructions: vec![
            Instruction::Call {
                dest: fallback_result,
                callee: fallback.name.clone(),
                args,
            },
            Instruction::Ret { value: fallback_result.map(Value::Local) },
        ],
    });

    dispatcher
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bitcode::ModuleId;
    use crate::ir::{BinOp, ConstVal, Instruction as I};
    use crate::mutation_point::Address;
    use crate::operators::OperatorId;

    fn sample_function() -> Function {
        let mut f = Function::new("add_one", 1, true);
        f.blocks.push(BasicBlock {
            instructions: vec![
                I::BinOp {
                    dest: ValueId(0),
                    op: BinOp::Add,
                    lhs: Value::Arg(0),
                    rhs: Value::Const(ConstVal::Int(1)),
                    compound_target: None,
                },
                I::Ret { value: Some(Value::Local(ValueId(0))) },
            ],
        });
        f
    }

    fn point() -> MutationPoint {
        MutationPoint {
            operator_id: OperatorId::AddToSub,
            address: Address {
                function_index: 0,
                basic_block_index: 0,
                instruction_index: 0,
            },
            module: ModuleId::from_hex("a".into()),
            diagnostic: "replace + with -".into(),
            replacement: "-".into(),
            source_location: None,
        }
    }

    #[test]
    fn dispatcher_has_one_check_block_per_mutant_plus_fallback() {
        let f = sample_function();
        let p = point();
        let output = rewrite(&f, std::slice::from_ref(&p)).unwrap();
        assert_eq!(output.dispatcher.blocks.len(), 3); // check, call, fallback
        assert_eq!(output.mutants.len(), 1);
        assert_eq!(output.original.linkage, Linkage::Internal);
        assert_eq!(output.mutants[0].1.linkage, Linkage::Internal);
    }

    #[test]
    fn mutant_body_has_the_operator_applied() {
        let f = sample_function();
        let p = point();
        let output = rewrite(&f, std::slice::from_ref(&p)).unwrap();
        assert!(matches!(
            output.mutants[0].1.blocks[0].instructions[0],
            I::BinOp { op: BinOp::Sub, .. }
        ));
        // The original is untouched.
        assert!(matches!(
            output.original.blocks[0].instructions[0],
            I::BinOp { op: BinOp::Add, .. }
        ));
    }

    #[test]
    fn last_listed_mutant_is_checked_first() {
        let f = sample_function();
        let mut first = point();
        first.address.instruction_index = 0;
        let mut second = point();
        second.address.instruction_index = 1;
        let output = rewrite(&f, &[first.clone(), second.clone()]).unwrap();

        // Two checks, two calls, one fallback.
        assert_eq!(output.dispatcher.blocks.len(), 5);
        let I::Call { args, .. } = &output.dispatcher.blocks[0].instructions[0] else {
            panic!("expected the first block to be a check block");
        };
        assert_eq!(args, &[Value::Global(second.env_var_name())]);

        // `output.mutants` still lists points in the order they were
        // given, regardless of the dispatcher's internal check order.
        assert_eq!(output.mutants[0].0.address, first.address);
        assert_eq!(output.mutants[1].0.address, second.address);
    }

    #[test]
    fn empty_points_is_a_no_op() {
        let f = sample_function();
        let output = rewrite(&f, &[]).unwrap();
        assert!(output.mutants.is_empty());
        assert_eq!(output.dispatcher.name, f.name);
        assert_eq!(output.dispatcher.blocks.len(), f.blocks.len());
        assert_eq!(output.dispatcher.linkage, f.linkage);
    }
}
