// Copyright 2021 - 2025 Martin Pool

//! The `logical_connective` operator group (`spec.md` §4.1): `||`→`&&` and
//! `&&`→`||`. Unlike every other operator in the catalog these don't
//! rewrite a single instruction's opcode; short-circuit connectives are
//! compiled away into a pair of conditional branches and a `Phi` at the
//! point where the two control-flow paths rejoin, so "replacing the
//! operator" means recognizing that shape and rewriting the branch and its
//! `Phi` together.
//!
//! Three shapes reach the same rewrite (`spec.md` §4.1):
//!
//! - *Pattern 1*: the short-circuit arm is a trivial forwarding block that
//!   jumps straight to the merge block, and the other arm evaluates the
//!   second operand before reaching the same merge block.
//! - *Pattern 2*: symmetric to pattern 1 with the arms swapped.
//! - *Pattern 3*: the short-circuit arm reaches the merge `Phi` with a
//!   constant boolean operand that itself encodes the short-circuited
//!   result, rather than via a visually distinct forwarding block.
//!
//! All three are rewritten the same way: swap the branch's `then`/`else`
//! targets, and flip the boolean constant the shortcut arm feeds into the
//! merge `Phi` (if any), so `a || b` is reshaped into `a && b` or vice
//! versa while keeping every other edge untouched.

use crate::bitcode::ModuleId;
use crate::ir::{BlockIndex, ConstVal, Function, FunctionIndex, Instruction, Value};
use crate::mutation_point::{Address, MutationPoint};
use crate::Result;

use super::{mutation_point, MutationOperator, OperatorId};

/// A block consisting of exactly one `Br` instruction: a pure forwarding
/// edge, the shape the shortcut arm of a compiled `||`/`&&` takes when it
/// doesn't carry a constant directly (pattern 1/2).
fn trivial_forward_target(function: &Function, bb: BlockIndex) -> Option<BlockIndex> {
    let block = function.blocks.get(bb)?;
    match block.instructions.as_slice() {
        [Instruction::Br { target }] => Some(*target),
        _ => None,
    }
}

/// Whether `bb` evaluates a second condition before reaching a merge: its
/// terminator is itself a `CondBr`, or it computes a value and forwards it
/// — either way, more than the single trivial `Br` of the other arm.
fn evaluates_second_operand(function: &Function, bb: BlockIndex) -> bool {
    match function.blocks.get(bb) {
        Some(block) => !matches!(block.instructions.as_slice(), [Instruction::Br { .. }]),
        None => false,
    }
}

/// Find a `Phi` reachable from `bb` (directly, or through exactly one
/// trivial forwarding block) with an incoming constant-bool entry
/// attributable to `bb`'s arm, returning the merge block, the `Phi`
/// instruction's index, and the index of that incoming entry.
fn find_constant_phi_incoming(
    function: &Function,
    bb: BlockIndex,
) -> Option<(BlockIndex, usize, usize)> {
    let candidate_predecessors = match trivial_forward_target(function, bb) {
        Some(target) => vec![bb, target],
        None => vec![bb],
    };
    for (block_idx, block) in function.blocks.iter().enumerate() {
        for (instr_idx, instr) in block.instructions.iter().enumerate() {
            if let Instruction::Phi { incoming, .. } = instr {
                for (entry_idx, (pred, value)) in incoming.iter().enumerate() {
                    if candidate_predecessors.contains(pred)
                        && matches!(value, Value::Const(ConstVal::Bool(_)))
                    {
                        return Some((block_idx, instr_idx, entry_idx));
                    }
                }
            }
        }
    }
    None
}

/// Recognize a logical-connective site at `bb`: a `CondBr` where one arm
/// is the shortcut path (trivial forward, possibly carrying a constant
/// bool into a `Phi`) and the other evaluates the second operand.
fn logical_site(function: &Function, bb: BlockIndex) -> Option<()> {
    let Instruction::CondBr { then_bb, else_bb, .. } = function.blocks.get(bb)?.terminator()?
    else {
        return None;
    };
    let then_trivial = trivial_forward_target(function, *then_bb).is_some()
        || find_constant_phi_incoming(function, *then_bb).is_some();
    let else_trivial = trivial_forward_target(function, *else_bb).is_some()
        || find_constant_phi_incoming(function, *else_bb).is_some();
    let then_evals = evaluates_second_operand(function, *then_bb);
    let else_evals = evaluates_second_operand(function, *else_bb);
    if (then_trivial && else_evals) || (else_trivial && then_evals) {
        Some(())
    } else {
        None
    }
}

fn apply_swap(function: &mut Function, address: Address) -> Result<()> {
    let bb = address.basic_block_index;
    let i = address.instruction_index;
    let (then_bb, else_bb) = match function.instruction_at(bb, i) {
        Some(Instruction::CondBr { then_bb, else_bb, .. }) => (*then_bb, *else_bb),
        other => anyhow::bail!("logical-connective rewrite expects a CondBr, found {other:?}"),
    };

    for arm in [then_bb, else_bb] {
        if let Some((merge_bb, phi_idx, entry_idx)) = find_constant_phi_incoming(function, arm) {
            if let Some(Instruction::Phi { incoming, .. }) =
                function.instruction_at_mut(merge_bb, phi_idx)
            {
                if let (_, Value::Const(ConstVal::Bool(b))) = &mut incoming[entry_idx] {
                    *b = !*b;
                }
            }
        }
    }

    if let Some(Instruction::CondBr { then_bb, else_bb, .. }) = function.instruction_at_mut(bb, i)
    {
        std::mem::swap(then_bb, else_bb);
    }
    Ok(())
}

pub struct LogicalOrToAnd;

impl MutationOperator for LogicalOrToAnd {
    fn id(&self) -> OperatorId {
        OperatorId::LogicalOrToAnd
    }

    fn find_candidates(
        &self,
        module: &ModuleId,
        function_index: FunctionIndex,
        function: &Function,
    ) -> Vec<MutationPoint> {
        let mut out = Vec::new();
        for (bb, block) in function.blocks.iter().enumerate() {
            let i = block.instructions.len().saturating_sub(1);
            if block.terminator().is_some() && logical_site(function, bb).is_some() {
                out.push(mutation_point(
                    module,
                    function_index,
                    function,
                    self.id(),
                    bb,
                    i,
                    "replace || with &&",
                    "&&",
                ));
            }
        }
        out
    }

    fn apply(&self, function: &mut Function, address: Address) -> Result<()> {
        apply_swap(function, address)
    }
}

pub struct LogicalAndToOr;

impl MutationOperator for LogicalAndToOr {
    fn id(&self) -> OperatorId {
        OperatorId::LogicalAndToOr
    }

    fn find_candidates(
        &self,
        module: &ModuleId,
        function_index: FunctionIndex,
        function: &Function,
    ) -> Vec<MutationPoint> {
        let mut out = Vec::new();
        for (bb, block) in function.blocks.iter().enumerate() {
            let i = block.instructions.len().saturating_sub(1);
            if block.terminator().is_some() && logical_site(function, bb).is_some() {
                out.push(mutation_point(
                    module,
                    function_index,
                    function,
                    self.id(),
                    bb,
                    i,
                    "replace && with ||",
                    "||",
                ));
            }
        }
        out
    }

    fn apply(&self, function: &mut Function, address: Address) -> Result<()> {
        apply_swap(function, address)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::{BasicBlock, Linkage, ValueId};

    /// Builds the CFG for `bool g(bool a, bool b) { return a || b; }`:
    /// bb0 evaluates `a` and branches; bb1 is the trivial shortcut-true
    /// forward to bb3; bb2 evaluates `b` and forwards to bb3; bb3 holds the
    /// merge `Phi` and returns it.
    fn or_function() -> Function {
        let mut f = Function::new("g", 2, true);
        f.linkage = Linkage::External;
        f.blocks = vec![
            BasicBlock {
                instructions: vec![Instruction::CondBr {
                    cond: Value::Arg(0),
                    then_bb: 1,
                    else_bb: 2,
                }],
            },
            BasicBlock {
                instructions: vec![Instruction::Br { target: 3 }],
            },
            BasicBlock {
                instructions: vec![Instruction::Br { target: 3 }],
            },
            BasicBlock {
                instructions: vec![
                    Instruction::Phi {
                        dest: ValueId(0),
                        incoming: vec![
                            (1, Value::Const(ConstVal::Bool(true))),
                            (2, Value::Arg(1)),
                        ],
                    },
                    Instruction::Ret {
                        value: Some(Value::Local(ValueId(0))),
                    },
                ],
            },
        ];
        f
    }

    #[test]
    fn finds_pattern_one_shortcut_site() {
        let module = ModuleId::from_hex("a".into());
        let f = or_function();
        let points = LogicalOrToAnd.find_candidates(&module, 0, &f);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].address.basic_block_index, 0);
    }

    #[test]
    fn apply_swaps_branch_targets_and_flips_phi_constant() {
        let module = ModuleId::from_hex("a".into());
        let f = or_function();
        let points = LogicalOrToAnd.find_candidates(&module, 0, &f);
        let mut mutated = f.clone();
        LogicalOrToAnd.apply(&mut mutated, points[0].address).unwrap();

        match &mutated.blocks[0].instructions[0] {
            Instruction::CondBr { then_bb, else_bb, .. } => {
                assert_eq!(*then_bb, 2);
                assert_eq!(*else_bb, 1);
            }
            other => panic!("expected CondBr, got {other:?}"),
        }
        match &mutated.blocks[3].instructions[0] {
            Instruction::Phi { incoming, .. } => {
                assert_eq!(incoming[0], (1, Value::Const(ConstVal::Bool(false))));
            }
            other => panic!("expected Phi, got {other:?}"),
        }
    }
}
