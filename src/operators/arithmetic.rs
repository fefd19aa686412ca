// Copyright 2021 - 2025 Martin Pool

//! The `arithmetic` operator group (`spec.md` §4.1): `add_to_sub`,
//! `mul_to_div`, `rem_to_div`, each also matching the compound-assignment
//! and pre/post-inc/dec siblings of their plain binary form.

use anyhow::bail;

use crate::bitcode::ModuleId;
use crate::ir::{BinOp, Function, FunctionIndex, IncDecOp, Instruction};
use crate::mutation_point::{Address, MutationPoint};
use crate::Result;

use super::{mutation_point, MutationOperator, OperatorId};

/// `+` <-> `-`, including `+=`/`-=` and `++`/`--`.
pub struct AddToSub;

impl MutationOperator for AddToSub {
    fn id(&self) -> OperatorId {
        OperatorId::AddToSub
    }

    fn find_candidates(
        &self,
        module: &ModuleId,
        function_index: FunctionIndex,
        function: &Function,
    ) -> Vec<MutationPoint> {
        let mut out = Vec::new();
        function.for_each_instruction(|bb, i, instr| match instr {
            Instruction::BinOp { op: BinOp::Add, .. } => out.push(mutation_point(
                module,
                function_index,
                function,
                self.id(),
                bb,
                i,
                "replace + with -",
                "-",
            )),
            Instruction::BinOp { op: BinOp::Sub, .. } => out.push(mutation_point(
                module,
                function_index,
                function,
                self.id(),
                bb,
                i,
                "replace - with +",
                "+",
            )),
            Instruction::IncDec { op, .. } => {
                let (diag, repl) = match op {
                    IncDecOp::Inc => ("replace ++ with --", "--"),
                    IncDecOp::Dec => ("replace -- with ++", "++"),
                };
                out.push(mutation_point(
                    module,
                    function_index,
                    function,
                    self.id(),
                    bb,
                    i,
                    diag,
                    repl,
                ));
            }
            _ => {}
        });
        out
    }

    fn apply(&self, function: &mut Function, address: Address) -> Result<()> {
        let instr = function
            .instruction_at_mut(address.basic_block_index, address.instruction_index)
            .ok_or_else(|| anyhow::anyhow!("no instruction at {address}"))?;
        match instr {
            Instruction::BinOp { op: op @ BinOp::Add, .. } => *op = BinOp::Sub,
            Instruction::BinOp { op: op @ BinOp::Sub, .. } => *op = BinOp::Add,
            Instruction::IncDec { op: op @ IncDecOp::Inc, .. } => *op = IncDecOp::Dec,
            Instruction::IncDec { op: op @ IncDecOp::Dec, .. } => *op = IncDecOp::Inc,
            other => bail!("add_to_sub cannot apply to {other:?}"),
        }
        Ok(())
    }
}

/// `*` <-> `/`.
pub struct MulToDiv;

impl MutationOperator for MulToDiv {
    fn id(&self) -> OperatorId {
        OperatorId::MulToDiv
    }

    fn find_candidates(
        &self,
        module: &ModuleId,
        function_index: FunctionIndex,
        function: &Function,
    ) -> Vec<MutationPoint> {
        let mut out = Vec::new();
        function.for_each_instruction(|bb, i, instr| match instr {
            Instruction::BinOp { op: BinOp::Mul, .. } => out.push(mutation_point(
                module,
                function_index,
                function,
                self.id(),
                bb,
                i,
                "replace * with /",
                "/",
            )),
            Instruction::BinOp { op: BinOp::Div, .. } => out.push(mutation_point(
                module,
                function_index,
                function,
                self.id(),
                bb,
                i,
                "replace / with *",
                "*",
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
            Instruction::BinOp { op: op @ BinOp::Mul, .. } => *op = BinOp::Div,
            Instruction::BinOp { op: op @ BinOp::Div, .. } => *op = BinOp::Mul,
            other => bail!("mul_to_div cannot apply to {other:?}"),
        }
        Ok(())
    }
}

/// `%` -> `/`. One-directional: dividing where the original remaindered is
/// a meaningful mutation, but the reverse has no single well-defined
/// rewrite, so this operator (unlike its siblings) only matches `Rem`.
pub struct RemToDiv;

impl MutationOperator for RemToDiv {
    fn id(&self) -> OperatorId {
        OperatorId::RemToDiv
    }

    fn find_candidates(
        &self,
        module: &ModuleId,
        function_index: FunctionIndex,
        function: &Function,
    ) -> Vec<MutationPoint> {
        let mut out = Vec::new();
        function.for_each_instruction(|bb, i, instr| {
            if let Instruction::BinOp { op: BinOp::Rem, .. } = instr {
                out.push(mutation_point(
                    module,
                    function_index,
                    function,
                    self.id(),
                    bb,
                    i,
                    "replace % with /",
                    "/",
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
            Instruction::BinOp { op: op @ BinOp::Rem, .. } => *op = BinOp::Div,
            other => bail!("rem_to_div cannot apply to {other:?}"),
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
    fn add_to_sub_finds_and_flips_add() {
        let module = ModuleId::from_hex("a".into());
        let f = func_with(BinOp::Add);
        let op = AddToSub;
        let points = op.find_candidates(&module, 0, &f);
        assert_eq!(points.len(), 1);
        let mut mutated = f.clone();
        op.apply(&mut mutated, points[0].address).unwrap();
        assert!(matches!(
            mutated.blocks[0].instructions[0],
            Instruction::BinOp { op: BinOp::Sub, .. }
        ));
    }

    #[test]
    fn mul_to_div_does_not_match_add() {
        let module = ModuleId::from_hex("a".into());
        let f = func_with(BinOp::Add);
        assert!(MulToDiv.find_candidates(&module, 0, &f).is_empty());
    }

    #[test]
    fn rem_to_div_is_one_directional() {
        let module = ModuleId::from_hex("a".into());
        let rem_fn = func_with(BinOp::Rem);
        assert_eq!(RemToDiv.find_candidates(&module, 0, &rem_fn).len(), 1);
        let div_fn = func_with(BinOp::Div);
        assert!(RemToDiv.find_candidates(&module, 0, &div_fn).is_empty());
    }
}
