// Copyright 2021 - 2025 Martin Pool

//! A minimal in-memory intermediate representation.
//!
//! The real bitcode/IR reader is an external collaborator (see the crate's
//! top-level docs): this module only defines the shape that mutation
//! operators match against and that the trampoline rewriter clones and
//! rewrites. It is deliberately small — just rich enough to host the
//! operator catalog (`crate::operators`) and the dispatcher control flow
//! built by `crate::trampoline` — not a general compiler IR.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Index of a basic block within a function's block list.
pub type BlockIndex = usize;

/// Index of an instruction within a basic block's instruction list.
///
/// The block's terminator (`Br`, `CondBr`, `Ret`) is stored as the last
/// instruction in the list, so it has a valid index like any other
/// instruction.
pub type InstrIndex = usize;

/// Index of a function within a module's function list. Stable for the
/// lifetime of the module (see `spec.md` §3).
pub type FunctionIndex = usize;

/// A local SSA-style value produced by some instruction in the function.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct ValueId(pub u32);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// A literal constant operand.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub enum ConstVal {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for ConstVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstVal::Int(v) => write!(f, "{v}"),
            ConstVal::Float(v) => write!(f, "{v}"),
            ConstVal::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// An operand to an instruction: either a literal or a reference to a
/// previously-defined value, function argument, or global symbol.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum Value {
    Const(ConstVal),
    Local(ValueId),
    Arg(u32),
    Global(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Const(c) => write!(f, "{c}"),
            Value::Local(id) => write!(f, "{id}"),
            Value::Arg(n) => write!(f, "arg{n}"),
            Value::Global(name) => write!(f, "@{name}"),
        }
    }
}

/// Arithmetic and bitwise binary operators, the shared core of the
/// `arithmetic` and `bitwise` operator groups (`spec.md` §4.1).
#[derive(Clone, Copy, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    And,
    Or,
    Xor,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::And => "&",
            BinOp::Or => "|",
            BinOp::Xor => "^",
        };
        f.write_str(s)
    }
}

/// Relational comparison operators (`relational — boundary` and
/// `relational — negation` groups).
#[derive(Clone, Copy, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum RelOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl fmt::Display for RelOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelOp::Lt => "<",
            RelOp::Le => "<=",
            RelOp::Gt => ">",
            RelOp::Ge => ">=",
            RelOp::Eq => "==",
            RelOp::Ne => "!=",
        };
        f.write_str(s)
    }
}

/// Pre/post increment or decrement, siblings of the arithmetic operators.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum IncDecOp {
    Inc,
    Dec,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum IncDecPosition {
    Pre,
    Post,
}

/// One instruction. A basic block's terminator (`Br`/`CondBr`/`Ret`) is
/// just the last `Instruction` in its list.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum Instruction {
    /// `dest = lhs op rhs`. `compound_target` is `Some(var)` for `x += y`
    /// style forms, where the result is also written back to `var`.
    BinOp {
        dest: ValueId,
        op: BinOp,
        lhs: Value,
        rhs: Value,
        compound_target: Option<ValueId>,
    },
    /// `dest = var++` / `dest = --var`, etc.
    IncDec {
        dest: ValueId,
        var: ValueId,
        op: IncDecOp,
        position: IncDecPosition,
    },
    /// `dest = lhs op rhs` for a relational comparison, producing a bool.
    Cmp {
        dest: ValueId,
        op: RelOp,
        lhs: Value,
        rhs: Value,
    },
    /// A direct call. `dest` is `None` for a void call.
    Call {
        dest: Option<ValueId>,
        callee: String,
        args: Vec<Value>,
    },
    /// `dest = value`. `is_init` distinguishes a variable's initializer
    /// (`number-init-const`) from a later plain assignment
    /// (`number-assign-const`); both match the same `constant` operator
    /// family but are reported under different diagnostics.
    Assign {
        dest: ValueId,
        value: Value,
        is_init: bool,
    },
    /// Join point for values coming from different predecessors.
    Phi {
        dest: ValueId,
        incoming: Vec<(BlockIndex, Value)>,
    },
    /// Unconditional jump.
    Br { target: BlockIndex },
    /// Two-way conditional jump.
    CondBr {
        cond: Value,
        then_bb: BlockIndex,
        else_bb: BlockIndex,
    },
    /// Function return.
    Ret { value: Option<Value> },
    /// Placeholder left behind by `remove-void-call`.
    Nop,
}

impl Instruction {
    /// The value this instruction defines, if any.
    pub fn dest(&self) -> Option<ValueId> {
        match self {
            Instruction::BinOp { dest, .. }
            | Instruction::IncDec { dest, .. }
            | Instruction::Cmp { dest, .. }
            | Instruction::Assign { dest, .. }
            | Instruction::Phi { dest, .. } => Some(*dest),
            Instruction::Call { dest, .. } => *dest,
            Instruction::Br { .. }
            | Instruction::CondBr { .. }
            | Instruction::Ret { .. }
            | Instruction::Nop => None,
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::Br { .. } | Instruction::CondBr { .. } | Instruction::Ret { .. }
        )
    }
}

/// A straight-line sequence of instructions ending in a terminator.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct BasicBlock {
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last().filter(|i| i.is_terminator())
    }
}

/// Internal linkage markers applied by the trampoline rewriter (`spec.md`
/// §4.3): mutant clones become `Internal` so they don't collide with the
/// original symbol name at link time.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum Linkage {
    External,
    Internal,
}

/// Debug-info location of an instruction, when the module carries it.
/// Plain data: `crate::mutation_point::SourceLocation` is the
/// user-facing, `Display`-able counterpart built from this.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct DebugLoc {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub blocks: Vec<BasicBlock>,
    pub linkage: Linkage,
    /// Number of declared arguments, used when forwarding arguments in the
    /// trampoline's indirect call.
    pub arg_count: u32,
    /// `false` for functions returning `void`.
    pub returns_value: bool,
    /// Debug-info location of each instruction that has one, keyed by
    /// `(basic_block_index, instruction_index)`. Empty when the module
    /// was compiled without debug info, in which case every mutation
    /// point's `source_location` is `None`.
    pub debug_locations: std::collections::HashMap<(BlockIndex, InstrIndex), DebugLoc>,
}

impl Function {
    pub fn new(name: impl Into<String>, arg_count: u32, returns_value: bool) -> Function {
        Function {
            name: name.into(),
            blocks: Vec::new(),
            linkage: Linkage::External,
            arg_count,
            returns_value,
            debug_locations: std::collections::HashMap::new(),
        }
    }

    pub fn debug_loc_at(&self, bb: BlockIndex, i: InstrIndex) -> Option<&DebugLoc> {
        self.debug_locations.get(&(bb, i))
    }

    /// Visit every instruction in program order, offering `(block, instr)`
    /// ordinals as required by the planner (`spec.md` §4.2).
    pub fn for_each_instruction(&self, mut visit: impl FnMut(BlockIndex, InstrIndex, &Instruction)) {
        for (bb_idx, block) in self.blocks.iter().enumerate() {
            for (i_idx, instr) in block.instructions.iter().enumerate() {
                visit(bb_idx, i_idx, instr);
            }
        }
    }

    pub fn instruction_at(&self, bb: BlockIndex, i: InstrIndex) -> Option<&Instruction> {
        self.blocks.get(bb)?.instructions.get(i)
    }

    pub fn instruction_at_mut(&mut self, bb: BlockIndex, i: InstrIndex) -> Option<&mut Instruction> {
        self.blocks.get_mut(bb)?.instructions.get_mut(i)
    }

    /// All direct callees mentioned by `Call` instructions in this function,
    /// in program order, with duplicates kept (callers may care about call
    /// count for some operators, though none currently do).
    pub fn callees(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for block in &self.blocks {
            for instr in &block.instructions {
                if let Instruction::Call { callee, .. } = instr {
                    out.push(callee.as_str());
                }
            }
        }
        out
    }
}

/// One compilation unit's worth of functions.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Module {
        Module {
            name: name.into(),
            functions: Vec::new(),
        }
    }

    pub fn function_index(&self, name: &str) -> Option<FunctionIndex> {
        self.functions.iter().position(|f| f.name == name)
    }

    /// A deterministic byte serialization used as the input to content
    /// hashing (`crate::bitcode::content_hash`) and as the cache-bytes
    /// round-trip target for property 6 ("load(bytes).serialize() ==
    /// bytes").
    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Module> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn module_round_trips_through_bytes() {
        let mut module = Module::new("m");
        let mut f = Function::new("f", 1, true);
        f.blocks.push(BasicBlock {
            instructions: vec![Instruction::Ret {
                value: Some(Value::Arg(0)),
            }],
        });
        module.functions.push(f);

        let bytes = module.to_bytes().unwrap();
        let reloaded = Module::from_bytes(&bytes).unwrap();
        assert_eq!(reloaded, module);
        assert_eq!(reloaded.to_bytes().unwrap(), bytes);
    }
}
