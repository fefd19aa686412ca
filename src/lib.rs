// Copyright 2021 - 2025 Martin Pool

//! Mutation testing for already-compiled bitcode/IR.
//!
//! Given a module's in-memory IR and a set of tests that exercise it, this
//! crate plans a closed catalog of syntactic mutations, rewrites each
//! mutated function into a runtime-selectable dispatcher (`trampoline`),
//! compiles and links the result, and runs each test against each mutant
//! in an isolated sandbox to see whether the test notices.
//!
//! See `ir` for the IR shape consumed throughout, `operators` for the
//! mutation catalog, and `engine` for how the pieces above are wired into
//! one end-to-end run.

pub type Result<T> = anyhow::Result<T>;

pub mod bitcode;
pub mod cache;
pub mod call_tree;
pub mod config;
pub mod engine;
pub mod exit_code;
pub mod executor;
pub mod interrupt;
pub mod ir;
pub mod junk;
pub mod launcher;
pub mod mutation_point;
pub mod operators;
pub mod planner;
pub mod report;
pub mod sandbox;
pub mod test_case;
pub mod toolchain;
pub mod trampoline;

#[cfg(test)]
mod test_util;
