// Copyright 2021 - 2025 Martin Pool

//! The `bitwise` operator group (`spec.md` §4.1): `shl_to_shr`,
//! `and_to_or`, `xor_to_or`.

use anyhow::bail;

use crate::bitcode::ModuleId;
use crate::ir::{BinOp, Function, FunctionIndex, Instruction};
use crate::mutation_point::{Address, MutationPoint};
use crate::Result;

use super::{mutation_point, MutationOperator, OperatorId};

macro_rules! toggle_operator {
    ($name:ident, $id:ident, $a:ident, $b:ident, $a_sym:literal, $b_sym:literal) => {
        pub struct $name;

        impl MutationOperator for $name {
            fn id(&self) -> OperatorId {
                OperatorId::$id
            }

            fn find_candidates(
                &self,
                module: &ModuleId,
                function_index: FunctionIndex,
                function: &Function,
            ) -> Vec<MutationPoint> {
                let mut out = Vec::new();
                function.for_each_instruction(|bb, i, instr| match instr {
                    Instruction::BinOp { op: BinOp::$a, .. } => out.push(mutation_point(
                        module,
                        function_index,
                        function,
                        self.id(),
                        bb,
                        i,
                        concat!("replace ", $a_sym, " with ", $b_sym),
                        $b_sym,
                    )),
                    Instruction::BinOp { op: BinOp::$b, .. } => out.push(mutation_point(
                        module,
                        function_index,
                        function,
                        self.id(),
                        bb,
                        i,
                        concat!("replace ", $b_sym, " with ", $a_sym),
                        $a_sym,
                    )),
                    _ => {}
                });
                out
            }

            fn apply(&self, function: &mut Function, address: Address) -> Result<()> {
                let instr = function
                    .instruction_at_mut(address.basic_block_index, address.instruction_index)
                    .ok_or_else(|| anyhow::anyhow!("no instruction at {address}"))?;
                match instr {
                    Instruction::BinOp { op: op @ BinOp::$a, .. } => *op = BinOp::$b,
                    Instruction::BinOp { op: op @ BinOp::$b, .. } => *op = BinOp::$a,
                    other => bail!(concat!(stringify!($id), " cannot apply to {:?}"), other),
                }
                Ok(())
            }
        }
    };
}

toggle_operator!(ShlToShr, ShlToShr, Shl, Shr, "<<", ">>");
toggle_operator!(AndToOr, AndToOr, And, Or, "&", "|");

/// `^` -> `|`. One-directional, mirroring `rem_to_div`: there is no single
/// well-defined reverse rewrite from `|` back to `^`.
pub struct XorToOr;

impl MutationOperator for XorToOr {
    fn id(&self) -> OperatorId {
        OperatorId::XorToOr
    }

    fn find_candidates(
        &self,
        module: &ModuleId,
        function_index: FunctionIndex,
        function: &Function,
    ) -> Vec<MutationPoint> {
        let mut out = Vec::new();
        function.for_each_instruction(|bb, i, instr| {
            if let Instruction::BinOp { op: BinOp::Xor, .. } = instr {
                out.push(mutation_point(
                    module,
                    function_index,
                    function,
                    self.id(),
                    bb,
                    i,
                    "replace ^ with |",
                    "|",
                ));
            }
        });
        out
    }

    fn apply(&self, function: &mut Function, address: Address) -> Result<()> {
        let instr = function
            .instruction_at_mut(address.basic_block_index, address.instruction_index)
            .ok_or_else(|| anyhow::anyhow!("no instruction at {address}"))?;
        match instr {
            Instruction::BinOp { op: op @ BinOp::Xor, .. } => *op = BinOp::Or,
            other => bail!("xor_to_or cannot apply to {other:?}"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::{BasicBlock, Value, ValueId};

    fn func_with(op: BinOp) -> Function {
        let mut f = Function::new("f", 2, true);
        f.blocks.push(BasicBlock {
            instructions: vec![
                Instruction::BinOp {
                    dest: ValueId(0),
                    op,
                    lhs: Value::Arg(0),
                    rhs: Value::Arg(1),
                    compound_target: None,
                },
                Instruction::Ret {
                    value: Some(Value::Local(ValueId(0))),
                },
            ],
        });
        f
    }

    #[test]
    fn shl_to_shr_toggles_both_ways() {
        let module = ModuleId::from_hex("a".into());
        let shl = func_with(BinOp::Shl);
        let mut mutated = shl.clone();
        let points = ShlToShr.find_candidates(&module, 0, &shl);
        ShlToShr.apply(&mut mutated, points[0].address).unwrap();
        assert!(matches!(
            mutated.blocks[0].instructions[0],
            Instruction::BinOp { op: BinOp::Shr, .. }
        ));
    }

    #[test]
    fn xor_to_or_does_not_match_or() {
        let module = ModuleId::from_hex("a".into());
        let or_fn = func_with(BinOp::Or);
        assert!(XorToOr.find_candidates(&module, 0, &or_fn).is_empty());
    }
}
