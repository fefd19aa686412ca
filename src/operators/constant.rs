// Copyright 2021 - 2025 Martin Pool

//! The `constant` operator group (`spec.md` §4.1): `scalar_value_replacement`
//! toggles a numeric literal used as an operand between zero and 42;
//! `number_init_const` and `number_assign_const` do the same for a
//! variable's initializer and a later plain assignment respectively — the
//! same rewrite, kept as distinct operators because they're reported under
//! different diagnostics and can be enabled independently.

use crate::bitcode::ModuleId;
use crate::ir::{ConstVal, Function, FunctionIndex, Instruction, Value};
use crate::mutation_point::{Address, MutationPoint};
use crate::Result;

use super::{mutation_point, MutationOperator, OperatorId};

const REPLACEMENT_INT: i64 = 42;
const REPLACEMENT_FLOAT: f64 = 42.0;

fn toggle(value: &ConstVal) -> Option<ConstVal> {
    match value {
        ConstVal::Int(0) => Some(ConstVal::Int(REPLACEMENT_INT)),
        ConstVal::Int(_) => Some(ConstVal::Int(0)),
        ConstVal::Float(f) if *f == 0.0 => Some(ConstVal::Float(REPLACEMENT_FLOAT)),
        ConstVal::Float(_) => Some(ConstVal::Float(0.0)),
        ConstVal::Bool(_) => None,
    }
}

pub struct ScalarValueReplacement;

impl MutationOperator for ScalarValueReplacement {
    fn id(&self) -> OperatorId {
        OperatorId::ScalarValueReplacement
    }

    fn find_candidates(
        &self,
        module: &ModuleId,
        function_index: FunctionIndex,
        function: &Function,
    ) -> Vec<MutationPoint> {
        let mut out = Vec::new();
        function.for_each_instruction(|bb, i, instr| {
            let operand = match instr {
                Instruction::BinOp { lhs, rhs, .. } | Instruction::Cmp { lhs, rhs, .. } => {
                    match lhs {
                        Value::Const(c) => Some(c),
                        _ => match rhs {
                            Value::Const(c) => Some(c),
                            _ => None,
                        },
                    }
                }
                _ => None,
            };
            if let Some(c) = operand {
                if let Some(replacement) = toggle(c) {
                    out.push(mutation_point(
                        module,
                        function_index,
                        function,
                        self.id(),
                        bb,
                        i,
                        format!("replace constant {c} with {replacement}"),
                        replacement.to_string(),
                    ));
                }
            }
        });
        out
    }

    fn apply(&self, function: &mut Function, address: Address) -> Result<()> {
        let instr = function
            .instruction_at_mut(address.basic_block_index, address.instruction_index)
            .ok_or_else(|| anyhow::anyhow!("no instruction at {address}"))?;
        let (lhs, rhs) = match instr {
            Instruction::BinOp { lhs, rhs, .. } | Instruction::Cmp { lhs, rhs, .. } => (lhs, rhs),
            other => anyhow::bail!("scalar_value_replacement cannot apply to {other:?}"),
        };
        if let Value::Const(c) = lhs {
            if let Some(replacement) = toggle(c) {
                *lhs = Value::Const(replacement);
                return Ok(());
            }
        }
        if let Value::Const(c) = rhs {
            if let Some(replacement) = toggle(c) {
                *rhs = Value::Const(replacement);
                return Ok(());
            }
        }
        anyhow::bail!("no replaceable constant operand at {address}")
    }
}

fn assign_operator(
    id: OperatorId,
    module: &ModuleId,
    function_index: FunctionIndex,
    function: &Function,
    want_init: bool,
) -> Vec<MutationPoint> {
    let mut out = Vec::new();
    function.for_each_instruction(|bb, i, instr| {
        if let Instruction::Assign { value: Value::Const(c), is_init, .. } = instr {
            if *is_init == want_init {
                if let Some(replacement) = toggle(c) {
                    out.push(mutation_point(
                        module,
                        function_index,
                        function,
                        id,
                        bb,
                        i,
                        format!("replace constant {c} with {replacement}"),
                        replacement.to_string(),
                    ));
                }
            }
        }
    });
    out
}

fn apply_assign(function: &mut Function, address: Address, want_init: bool) -> Result<()> {
    let instr = function
        .instruction_at_mut(address.basic_block_index, address.instruction_index)
        .ok_or_else(|| anyhow::anyhow!("no instruction at {address}"))?;
    match instr {
        Instruction::Assign { value: Value::Const(c), is_init, .. } if *is_init == want_init => {
            let replacement = toggle(c).ok_or_else(|| anyhow::anyhow!("constant not replaceable"))?;
            *c = replacement;
            Ok(())
        }
        other => anyhow::bail!("assign-constant operator cannot apply to {other:?}"),
    }
}

/// Mutates a variable's initializer, e.g. `int x = 0;`.
pub struct NumberInitConst;

impl MutationOperator for NumberInitConst {
    fn id(&self) -> OperatorId {
        OperatorId::NumberInitConst
    }

    fn find_candidates(
        &self,
        module: &ModuleId,
        function_index: FunctionIndex,
        function: &Function,
    ) -> Vec<MutationPoint> {
        assign_operator(self.id(), module, function_index, function, true)
    }

    fn apply(&self, function: &mut Function, address: Address) -> Result<()> {
        apply_assign(function, address, true)
    }
}

/// Mutates a later plain assignment, e.g. `x = 0;` after declaration.
pub struct NumberAssignConst;

impl MutationOperator for NumberAssignConst {
    fn id(&self) -> OperatorId {
        OperatorId::NumberAssignConst
    }

    fn find_candidates(
        &self,
        module: &ModuleId,
        function_index: FunctionIndex,
        function: &Function,
    ) -> Vec<MutationPoint> {
        assign_operator(self.id(), module, function_index, function, false)
    }

    fn apply(&self, function: &mut Function, address: Address) -> Result<()> {
        apply_assign(function, address, false)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::{BasicBlock, BinOp, ValueId};

    #[test]
    fn scalar_value_replacement_toggles_zero_to_42() {
        let module = ModuleId::from_hex("a".into());
        let mut f = Function::new("f", 1, true);
        f.blocks.push(BasicBlock {
            instructions: vec![
                Instruction::BinOp {
                    dest: ValueId(0),
                    op: BinOp::Add,
                    lhs: Value::Arg(0),
                    rhs: Value::Const(ConstVal::Int(0)),
                    compound_target: None,
                },
                Instruction::Ret {
                    value: Some(Value::Local(ValueId(0))),
                },
            ],
        });
        let points = ScalarValueReplacement.find_candidates(&module, 0, &f);
        assert_eq!(points.len(), 1);
        ScalarValueReplacement.apply(&mut f, points[0].address).unwrap();
        assert!(matches!(
            f.blocks[0].instructions[0],
            Instruction::BinOp { rhs: Value::Const(ConstVal::Int(42)), .. }
        ));
    }

    #[test]
    fn number_init_const_ignores_plain_assignment() {
        let module = ModuleId::from_hex("a".into());
        let mut f = Function::new("f", 0, false);
        f.blocks.push(BasicBlock {
            instructions: vec![Instruction::Assign {
                dest: ValueId(0),
                value: Value::Const(ConstVal::Int(0)),
                is_init: false,
            }],
        });
        assert!(NumberInitConst.find_candidates(&module, 0, &f).is_empty());
        let points = NumberAssignConst.find_candidates(&module, 0, &f);
        assert_eq!(points.len(), 1);
    }
}
