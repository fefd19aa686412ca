// Copyright 2021 - 2025 Martin Pool

//! The `control` operator group (`spec.md` §4.1): negate a branch
//! condition by swapping its two successors, independent of what the
//! branch's source expression was.

use crate::bitcode::ModuleId;
use crate::ir::{Function, FunctionIndex, Instruction};
use crate::mutation_point::{Address, MutationPoint};
use crate::Result;

use super::{mutation_point, MutationOperator, OperatorId};

pub struct NegateBranchCondition;

impl MutationOperator for NegateBranchCondition {
    fn id(&self) -> OperatorId {
        OperatorId::NegateBranchCondition
    }

    fn find_candidates(
        &self,
        module: &ModuleId,
        function_index: FunctionIndex,
        function: &Function,
    ) -> Vec<MutationPoint> {
        let mut out = Vec::new();
        function.for_each_instruction(|bb, i, instr| {
            if matches!(instr, Instruction::CondBr { .. }) {
                out.push(mutation_point(
                    module,
                    function_index,
                    function,
                    self.id(),
                    bb,
                    i,
                    "negate branch condition",
                    "!cond",
                ));
            }
        });
        out
    }

    fn apply(&self, function: &mut Function, address: Address) -> Result<()> {
        match function.instruction_at_mut(address.basic_block_index, address.instruction_index) {
            Some(Instruction::CondBr { then_bb, else_bb, .. }) => {
                std::mem::swap(then_bb, else_bb);
                Ok(())
            }
            other => anyhow::bail!("negate_branch_condition cannot apply to {other:?}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::{BasicBlock, Value};

    #[test]
    fn negates_by_swapping_successors() {
        let module = ModuleId::from_hex("a".into());
        let mut f = Function::new("f", 1, false);
        f.blocks.push(BasicBlock {
            instructions: vec![Instruction::CondBr {
                cond: Value::Arg(0),
                then_bb: 1,
                else_bb: 2,
            }],
        });
        let points = NegateBranchCondition.find_candidates(&module, 0, &f);
        assert_eq!(points.len(), 1);
        NegateBranchCondition.apply(&mut f, points[0].address).unwrap();
        match &f.blocks[0].instructions[0] {
            Instruction::CondBr { then_bb, else_bb, .. } => {
                assert_eq!(*then_bb, 2);
                assert_eq!(*else_bb, 1);
            }
            other => panic!("expected CondBr, got {other:?}"),
        }
    }
}
