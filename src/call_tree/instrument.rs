// Copyright 2021 - 2025 Martin Pool

//! Injects the `enter(i)`/`leave(i)` probes a compiled function body needs
//! to participate in call-tree recording (`spec.md` §4.4). The probes are
//! emitted as ordinary calls to two external symbols the driver's runtime
//! support object defines; this module never executes them, it only
//! rewrites the IR to call them.

use crate::ir::{ConstVal, Function, Instruction, Value};

/// Name of the external symbol called on function entry, with the
/// function's assigned probe index as its sole argument.
pub const ENTER_SYMBOL: &str = "__bcmutants_enter";

/// Name of the external symbol called immediately before each return.
pub const LEAVE_SYMBOL: &str = "__bcmutants_leave";

/// Name of the `1 + numberOfInstrumentedFunctions`-element `u64` array the
/// driver's runtime support object exports for `enter`/`leave` to tally
/// into; read back by a `Launcher` after a run to reconstruct the call
/// tree (`spec.md` §4.4).
pub const MAPPING_TABLE_SYMBOL: &str = "__bcmutants_mapping_table";

/// Probe indices are 1-based; 0 is reserved for the call tree's sentinel
/// root (`spec.md` §4.4).
pub fn probe_index(function_index: usize) -> i64 {
    function_index as i64 + 1
}

/// Clone `function` with `enter`/`leave` probes inserted: one `enter` call
/// at the top of the entry block, and one `leave` call immediately before
/// every `Ret` instruction in the function (a function may return from
/// more than one block).
pub fn instrument_function(function: &Function, function_index: usize) -> Function {
    let mut instrumented = function.clone();
    let index = probe_index(function_index);

    if let Some(entry) = instrumented.blocks.first_mut() {
        entry.instructions.insert(
            0,
            Instruction::Call {
                dest: None,
                callee: ENTER_SYMBOL.to_owned(),
                args: vec![Value::Const(ConstVal::Int(index))],
            },
        );
    }

    for block in &mut instrumented.blocks {
        let mut insert_at: Vec<usize> = Vec::new();
        for (i, instr) in block.instructions.iter().enumerate() {
            if matches!(instr, Instruction::Ret { .. }) {
                insert_at.push(i);
            }
        }
        for offset in insert_at.into_iter().rev() {
            block.instructions.insert(
                offset,
                Instruction::Call {
                    dest: None,
                    callee: LEAVE_SYMBOL.to_owned(),
                    args: vec![Value::Const(ConstVal::Int(index))],
                },
            );
        }
    }

    instrumented
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::{BasicBlock, Value as V};

    #[test]
    fn inserts_enter_at_top_and_leave_before_each_return() {
        let mut f = Function::new("f", 0, true);
        f.blocks.push(BasicBlock {
            instructions: vec![Instruction::CondBr {
                cond: V::Arg(0),
                then_bb: 1,
                else_bb: 2,
            }],
        });
        f.blocks.push(BasicBlock {
            instructions: vec![Instruction::Ret {
                value: Some(V::Arg(0)),
            }],
        });
        f.blocks.push(BasicBlock {
            instructions: vec![Instruction::Ret { value: None }],
        });

        let instrumented = instrument_function(&f, 3);

        match &instrumented.blocks[0].instructions[0] {
            Instruction::Call { callee, args, .. } => {
                assert_eq!(callee, ENTER_SYMBOL);
                assert_eq!(args, &[Value::Const(ConstVal::Int(4))]);
            }
            other => panic!("expected enter call, got {other:?}"),
        }
        assert!(matches!(
            instrumented.blocks[1].instructions[0],
            Instruction::Call { .. }
        ));
        assert!(matches!(
            instrumented.blocks[2].instructions[0],
            Instruction::Call { .. }
        ));
        assert_eq!(instrumented.blocks[1].instructions.len(), 2);
    }
}
