// Copyright 2021 - 2025 Martin Pool

//! The `relational_boundary` and `relational_negation` operator groups
//! (`spec.md` §4.1): `lt_to_le`, `gt_to_ge` shift a comparison's boundary
//! by one; `lt_to_ge`, `gt_to_le`, `eq_to_ne` replace a comparison with its
//! logical negation.

use anyhow::bail;

use crate::bitcode::ModuleId;
use crate::ir::{Function, FunctionIndex, Instruction, RelOp};
use crate::mutation_point::{Address, MutationPoint};
use crate::Result;

use super::{mutation_point, MutationOperator, OperatorId};

macro_rules! toggle_rel_operator {
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
                    Instruction::Cmp { op: RelOp::$a, .. } => out.push(mutation_point(
                        module,
                        function_index,
                        function,
                        self.id(),
                        bb,
                        i,
                        concat!("replace ", $a_sym, " with ", $b_sym),
                        $b_sym,
                    )),
                    Instruction::Cmp { op: RelOp::$b, .. } => out.push(mutation_point(
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
                    Instruction::Cmp { op: op @ RelOp::$a, .. } => *op = RelOp::$b,
                    Instruction::Cmp { op: op @ RelOp::$b, .. } => *op = RelOp::$a,
                    other => bail!(concat!(stringify!($id), " cannot apply to {:?}"), other),
                }
                Ok(())
            }
        }
    };
}

toggle_rel_operator!(LtToLe, LtToLe, Lt, Le, "<", "<=");
toggle_rel_operator!(GtToGe, GtToGe, Gt, Ge, ">", ">=");
toggle_rel_operator!(LtToGe, LtToGe, Lt, Ge, "<", ">=");
toggle_rel_operator!(GtToLe, GtToLe, Gt, Le, ">", "<=");
toggle_rel_operator!(EqToNe, EqToNe, Eq, Ne, "==", "!=");

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::{BasicBlock, Value, ValueId};

    fn func_with(op: RelOp) -> Function {
        let mut f = Function::new("f", 2, true);
        f.blocks.push(BasicBlock {
            instructions: vec![
                Instruction::Cmp {
                    dest: ValueId(0),
                    op,
                    lhs: Value::Arg(0),
                    rhs: Value::Arg(1),
                },
                Instruction::Ret {
                    value: Some(Value::Local(ValueId(0))),
                },
            ],
        });
        f
    }

    #[test]
    fn lt_to_le_toggles_boundary() {
        let module = ModuleId::from_hex("a".into());
        let f = func_with(RelOp::Lt);
        let mut mutated = f.clone();
        let points = LtToLe.find_candidates(&module, 0, &f);
        LtToLe.apply(&mut mutated, points[0].address).unwrap();
        assert!(matches!(
            mutated.blocks[0].instructions[0],
            Instruction::Cmp { op: RelOp::Le, .. }
        ));
    }

    #[test]
    fn eq_to_ne_does_not_match_lt() {
        let module = ModuleId::from_hex("a".into());
        let f = func_with(RelOp::Lt);
        assert!(EqToNe.find_candidates(&module, 0, &f).is_empty());
    }

    #[test]
    fn lt_to_ge_is_logical_negation() {
        let module = ModuleId::from_hex("a".into());
        let f = func_with(RelOp::Ge);
        let mut mutated = f.clone();
        let points = LtToGe.find_candidates(&module, 0, &f);
        LtToGe.apply(&mut mutated, points[0].address).unwrap();
        assert!(matches!(
            mutated.blocks[0].instructions[0],
            Instruction::Cmp { op: RelOp::Lt, .. }
        ));
    }
}
