// Copyright 2021 - 2025 Martin Pool

//! The `call` operator group (`spec.md` §4.1): `replace_call_with_constant`
//! replaces a value-producing call with a fixed constant, and
//! `remove_void_call` deletes a call made purely for its side effect.

use crate::bitcode::ModuleId;
use crate::ir::{ConstVal, Function, FunctionIndex, Instruction, Value};
use crate::mutation_point::{Address, MutationPoint};
use crate::Result;

use super::{mutation_point, MutationOperator, OperatorId};

/// The constant every replaced call is pinned to. Zero is the conventional
/// choice (`scalar_value_replacement` already covers the zero/42 pairing
/// for literals, so this operator doesn't need a second value to be
/// interesting: any wrong constant kills a test that depends on the real
/// return value).
const REPLACEMENT: i64 = 0;

pub struct ReplaceCallWithConstant;

impl MutationOperator for ReplaceCallWithConstant {
    fn id(&self) -> OperatorId {
        OperatorId::ReplaceCallWithConstant
    }

    fn find_candidates(
        &self,
        module: &ModuleId,
        function_index: FunctionIndex,
        function: &Function,
    ) -> Vec<MutationPoint> {
        let mut out = Vec::new();
        function.for_each_instruction(|bb, i, instr| {
            if let Instruction::Call { dest: Some(_), callee, .. } = instr {
                out.push(mutation_point(
                    module,
                    function_index,
                    function,
                    self.id(),
                    bb,
                    i,
                    format!("replace call to {callee} with constant {REPLACEMENT}"),
                    REPLACEMENT.to_string(),
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
            Instruction::Call { dest: Some(dest), .. } => {
                *instr = Instruction::Assign {
                    dest: *dest,
                    value: Value::Const(ConstVal::Int(REPLACEMENT)),
                    is_init: false,
                };
                Ok(())
            }
            other => anyhow::bail!("replace_call_with_constant cannot apply to {other:?}"),
        }
    }
}

pub struct RemoveVoidCall;

impl MutationOperator for RemoveVoidCall {
    fn id(&self) -> OperatorId {
        OperatorId::RemoveVoidCall
    }

    fn find_candidates(
        &self,
        module: &ModuleId,
        function_index: FunctionIndex,
        function: &Function,
    ) -> Vec<MutationPoint> {
        let mut out = Vec::new();
        function.for_each_instruction(|bb, i, instr| {
            if let Instruction::Call { dest: None, callee, .. } = instr {
                out.push(mutation_point(
                    module,
                    function_index,
                    function,
                    self.id(),
                    bb,
                    i,
                    format!("remove void call to {callee}"),
                    "<removed>",
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
            Instruction::Call { dest: None, .. } => {
                *instr = Instruction::Nop;
                Ok(())
            }
            other => anyhow::bail!("remove_void_call cannot apply to {other:?}"),
        }
    }
}
