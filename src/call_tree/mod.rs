// Copyright 2021 - 2025 Martin Pool

//! Dynamic call-tree instrumentation and reconstruction (`spec.md` §4.4):
//! given a test's entry function, find every function it actually calls
//! at runtime, annotated with call-graph distance, so the planner can
//! restrict mutants to ones a test can plausibly exercise.

mod instrument;
mod tree;

pub use instrument::{instrument_function, MAPPING_TABLE_SYMBOL};
pub use tree::{CallTree, CallTreeNode, MappingTable, ReachableFunction};
