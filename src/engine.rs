// Copyright 2021 - 2025 Martin Pool

//! The end-to-end driver (`spec.md` §4, "Module pipeline"): wires the
//! planner, the call-tree instrumentation, the trampoline rewriter, a
//! toolchain, a launcher, and a sandbox into one run over a module and
//! its tests.
//!
//! This is the facade the CLI calls; everything else in this crate is a
//! building block this module composes. It intentionally knows nothing
//! about argument parsing or output formatting (see `main.rs`,
//! `crate::report`).

use std::collections::HashSet;

use camino::Utf8PathBuf;
use tracing::{debug, info, warn};

use crate::bitcode::ModuleId;
use crate::cache::{CacheKey, ObjectCache};
use crate::call_tree::{instrument_function, CallTree, MappingTable};
use crate::config::Options;
use crate::interrupt::check_interrupted;
use crate::ir::{Function, FunctionIndex, Module};
use crate::junk::JunkFilter;
use crate::launcher::Launcher;
use crate::mutation_point::{FunctionHandle, MutationPoint};
use crate::operators::catalog_for;
use crate::planner;
use crate::report::{EngineResult, MutationResult};
use crate::sandbox::{ExecutionResult, Sandbox, Status};
use crate::test_case::TestCase;
use crate::toolchain::Toolchain;
use crate::trampoline;
use crate::Result;

/// Everything the engine needs to run one module end to end; a thin
/// bundle of the collaborators a caller otherwise has to pass down
/// through every function (`spec.md` §4, each collaborator matching a
/// numbered subsection there).
pub struct Engine<'a> {
    pub options: &'a Options,
    pub toolchain: &'a dyn Toolchain,
    pub launcher: &'a dyn Launcher,
    pub sandbox: &'a dyn Sandbox,
    pub junk_filter: &'a dyn JunkFilter,
    pub cache: &'a ObjectCache,
    pub work_dir: Utf8PathBuf,
}

impl<'a> Engine<'a> {
    /// Run every test in `tests` against every surviving mutant of
    /// `module`, and return the aggregated result.
    ///
    /// The pipeline, per `spec.md` §4: plan mutations (§4.2) → for each
    /// test, instrument and run the original module to build its call
    /// tree (§4.4) and restrict candidate mutants to functions within
    /// `max_distance` of the test's entry point → rewrite each
    /// surviving function with the trampoline (§4.3) → compile and link
    /// (§1) → run the test against each mutant in the sandbox (§4.6).
    pub fn run(&self, module_id: &ModuleId, module: &Module, tests: &[TestCase]) -> Result<EngineResult> {
        let operators = catalog_for(&self.options.operator_ids);
        let plan = planner::plan(module_id, module, &operators, self.junk_filter, self.options.workers)?;
        info!(
            "planned {} mutation point(s) across {} function(s)",
            plan.points.len(),
            module.functions.len()
        );
        if plan.points.is_empty() {
            return Ok(EngineResult { mutation_points: Vec::new(), mutation_results: Vec::new() });
        }

        let mut mutation_results = Vec::new();
        for test in tests {
            check_interrupted()?;
            let tree = self.build_call_tree(module, test)?;
            let reachable: std::collections::HashMap<usize, u32> = tree
                .reachable_from(test.entry_function, self.options.max_distance)
                .into_iter()
                .map(|r| (r.function_index, r.distance))
                .collect();

            for (&function_index, indices) in &plan.by_function {
                check_interrupted()?;
                if indices.is_empty() {
                    continue;
                }
                let Some(&distance) = reachable.get(&function_index) else {
                    debug!(
                        "function {function_index} unreachable from {} within {}, skipping its {} point(s)",
                        test.name,
                        self.options.max_distance,
                        indices.len()
                    );
                    continue;
                };
                let function = &module.functions[function_index];
                let points: Vec<MutationPoint> =
                    plan.points_for_function(function_index).cloned().collect();
                let outcomes = self.run_mutants(module_id, module, function, &points, test)?;
                for (point, execution_result) in points.into_iter().zip(outcomes) {
                    mutation_results.push(MutationResult {
                        mutation_point: point,
                        execution_result,
                        testee: test.name.clone(),
                        distance,
                    });
                }
            }
        }

        // Stable ordering (spec.md §5): (moduleHash, functionIndex,
        // basicBlockIndex, instructionIndex, operatorId).
        mutation_results.sort_by(|a, b| {
            let ka = &a.mutation_point;
            let kb = &b.mutation_point;
            (&ka.module, ka.address, ka.operator_id).cmp(&(&kb.module, kb.address, kb.operator_id))
        });

        Ok(EngineResult { mutation_points: plan.points, mutation_results })
    }

    /// Compile and run the unmutated module's entry point with call-tree
    /// instrumentation enabled, and reconstruct the resulting tree
    /// (`spec.md` §4.4).
    fn build_call_tree(&self, module: &Module, test: &TestCase) -> Result<CallTree> {
        let instrumented: Vec<_> = module
            .functions
            .iter()
            .enumerate()
            .map(|(i, f)| instrument_function(f, i))
            .collect();
        let mut instrumented_module = module.clone();
        instrumented_module.functions = instrumented;

        let binary = self.build_binary(&instrumented_module, "calltree")?;
        let entry_symbol = module.functions[test.entry_function].name.clone();
        // One word per instrumented function, plus the sentinel root at
        // index 0 (spec.md §4.4).
        let mapping_len = module.functions.len() + 1;
        let mapping = self.execute_for_mapping(&binary, test, &entry_symbol, mapping_len)?;
        Ok(CallTree::build(&mapping))
    }

    /// Run the instrumented binary once via the `Launcher` to obtain the
    /// probe mapping table, then read it back from the dump file the
    /// launcher wrote (`spec.md` §4.4: "reconstructs the tree from the
    /// mapping table dump after a run").
    fn execute_for_mapping(
        &self,
        binary: &Utf8PathBuf,
        test: &TestCase,
        entry_symbol: &str,
        mapping_len: usize,
    ) -> Result<MappingTable> {
        let dump_path = self.work_dir.join(format!("{}.mapping", test.name));
        let binary = binary.clone();
        let entry_symbol = entry_symbol.to_owned();
        let dump_path_for_invoke = dump_path.clone();
        let launcher = self.launcher;
        let invoke = move || -> Status {
            match launcher.run_for_mapping(&binary, &entry_symbol, test, mapping_len, &dump_path_for_invoke) {
                Ok(()) => Status::Passed,
                Err(_) => Status::AbnormalExit,
            }
        };
        self.sandbox.run(self.options.timeout, &invoke)?;
        read_mapping_table(&dump_path)
    }

    /// Rewrite `function`'s mutation points via the trampoline, compile
    /// and link a binary containing the dispatcher, every mutant body,
    /// and everything else the test's entry point statically reaches, and
    /// run `test` once per mutant by activating its environment variable
    /// (`spec.md` §4.3, §6). Mutants for one function are run in
    /// parallel, up to `Options::workers` at a time (`spec.md` §4.7).
    fn run_mutants(
        &self,
        module_id: &ModuleId,
        module: &Module,
        function: &Function,
        points: &[MutationPoint],
        test: &TestCase,
    ) -> Result<Vec<ExecutionResult>> {
        let output = trampoline::rewrite(function, points)?;
        if output.mutants.is_empty() {
            return Ok(Vec::new());
        }

        let entry_symbol = module.functions[test.entry_function].name.clone();
        let binary = self.build_binary_with_mutants(module_id, module, function, &entry_symbol, &output)?;

        let outcomes: Vec<Result<ExecutionResult>> = crate::executor::execute(
            &output.mutants,
            self.options.workers,
            false,
            |_worker, (point, _mutant)| -> Result<ExecutionResult> {
                check_interrupted()?;
                let env_var = point.env_var_name();
                let invoke = || -> Status {
                    match self.launcher.run_test(&binary, &entry_symbol, test, Some(&env_var)) {
                        Ok(status) => status,
                        Err(_) => Status::AbnormalExit,
                    }
                };
                self.sandbox.run(self.options.timeout, &invoke)
            },
        )?;

        outcomes.into_iter().collect()
    }

    fn build_binary(&self, module: &Module, label: &str) -> Result<Utf8PathBuf> {
        let module_bytes = module.to_bytes()?;
        let key = CacheKey::for_module(&format!("{}.{label}", ModuleId::of_bytes(&module_bytes)));
        let materialized_path = self.work_dir.join(format!("{label}.module"));
        let object_path = self.work_dir.join(format!("{label}.o"));
        let binary_path = self.work_dir.join(label);
        if let Some(bytes) = self.cache.get(&key)? {
            std::fs::write(&object_path, bytes)?;
        } else {
            std::fs::write(&materialized_path, &module_bytes)?;
            self.toolchain.compile(&materialized_path, &object_path)?;
            self.cache.put(key, std::fs::read(&object_path)?)?;
        }
        self.toolchain.link(std::slice::from_ref(&object_path), &binary_path)?;
        Ok(binary_path)
    }

    /// Link the dispatcher, the preserved original body, every mutant
    /// body, and every other function statically reachable from the
    /// test's entry point (so calls the dispatcher or its mutants forward
    /// to still resolve; `spec.md` §1 scopes this crate to the
    /// `compile`/`link` steps only, so nothing else supplies those
    /// objects).
    fn build_binary_with_mutants(
        &self,
        module_id: &ModuleId,
        module: &Module,
        function: &Function,
        test_entry_symbol: &str,
        output: &trampoline::TrampolineOutput,
    ) -> Result<Utf8PathBuf> {
        let mut object_paths = Vec::new();

        for f in [&output.dispatcher, &output.original] {
            let key = CacheKey::for_mutant(module_id.as_str(), &original_symbol_key(&f.name));
            if let Some(path) = self.compile_one_function(&key, f)? {
                object_paths.push(path);
            }
        }

        for (point, mutant) in &output.mutants {
            let key = CacheKey::for_mutant(module_id.as_str(), &point.user_identifier());
            match self.compile_one_function(&key, mutant) {
                Ok(Some(path)) => object_paths.push(path),
                Ok(None) => {}
                Err(e) if !self.options.strict => {
                    warn!("toolchain failure compiling {}: {e:#}", mutant.name);
                }
                Err(e) => return Err(e),
            }
        }

        for (function_index, callee) in transitive_callees(module, test_entry_symbol) {
            if callee.name == function.name {
                continue; // already supplied above, as the dispatcher
            }
            let handle = FunctionHandle { module: module_id.clone(), function_index };
            let key = CacheKey::for_mutant(module_id.as_str(), &format!("fn{}", handle.function_index));
            if let Some(path) = self.compile_one_function(&key, callee)? {
                object_paths.push(path);
            }
        }

        let binary_path = self.work_dir.join(sanitize(&output.dispatcher.name));
        self.toolchain.link(&object_paths, &binary_path)?;
        Ok(binary_path)
    }

    /// Compile one function body to an object file, consulting the cache
    /// first. Returns `None` only when a non-strict compile failure means
    /// this function's object is simply missing from the link step
    /// (`spec.md` §7: toolchain failures are fatal for the affected
    /// module, and fatal overall only in strict mode).
    fn compile_one_function(&self, key: &CacheKey, function: &Function) -> Result<Option<Utf8PathBuf>> {
        let object_path = self.work_dir.join(format!("{}.o", sanitize(&function.name)));
        if let Some(bytes) = self.cache.get(key)? {
            std::fs::write(&object_path, bytes)?;
            return Ok(Some(object_path));
        }
        let materialized_path = self.work_dir.join(format!("{}.fn", sanitize(&function.name)));
        std::fs::write(&materialized_path, serde_json::to_vec(function)?)?;
        self.toolchain.compile(&materialized_path, &object_path)?;
        self.cache.put(key.clone(), std::fs::read(&object_path)?)?;
        Ok(Some(object_path))
    }
}

/// Every function statically reachable from `start` by direct `Call`
/// instructions, `start` itself included. Grounded on `Function::callees`:
/// this is the natural place that needed a real caller for it (`spec.md`
/// §1: the toolchain only consumes `compile`/`link`, so the engine has to
/// work out for itself which objects a link needs).
fn transitive_callees<'m>(module: &'m Module, start: &str) -> Vec<(FunctionIndex, &'m Function)> {
    let mut seen = HashSet::new();
    let mut stack = vec![start.to_owned()];
    let mut out = Vec::new();
    while let Some(name) = stack.pop() {
        if !seen.insert(name.clone()) {
            continue;
        }
        let Some(index) = module.function_index(&name) else {
            continue; // an external symbol with no body in this module
        };
        let f = &module.functions[index];
        out.push((index, f));
        for callee in f.callees() {
            stack.push(callee.to_owned());
        }
    }
    out
}

fn original_symbol_key(name: &str) -> String {
    format!("body.{name}")
}

fn sanitize(s: &str) -> String {
    s.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect()
}

fn read_mapping_table(path: &Utf8PathBuf) -> Result<MappingTable> {
    let bytes = std::fs::read(path)?;
    let mut out = Vec::with_capacity(bytes.len() / 8);
    for chunk in bytes.chunks_exact(8) {
        out.push(u64::from_le_bytes(chunk.try_into().expect("chunks_exact(8) yields 8 bytes")));
    }
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;
    use crate::launcher::Launcher;
    use crate::sandbox::NullSandbox;
    use crate::toolchain::Toolchain;
    use camino::Utf8Path;

    struct NoopToolchain;
    impl Toolchain for NoopToolchain {
        fn compile(&self, _source_object_path: &Utf8Path, output_path: &Utf8Path) -> Result<()> {
            std::fs::write(output_path, b"object")?;
            Ok(())
        }
        fn link(&self, _object_paths: &[Utf8PathBuf], output_path: &Utf8Path) -> Result<()> {
            std::fs::write(output_path, b"binary")?;
            Ok(())
        }
    }

    /// A fake `Launcher` that never touches a real binary: every test
    /// "passes", and a mapping-table run writes a table with no recorded
    /// calls besides the sentinel root.
    struct FakeLauncher;
    impl Launcher for FakeLauncher {
        fn run_test(
            &self,
            _binary: &Utf8Path,
            _entry_symbol: &str,
            _test: &TestCase,
            _env_var: Option<&str>,
        ) -> Result<Status> {
            Ok(Status::Passed)
        }

        fn run_for_mapping(
            &self,
            _binary: &Utf8Path,
            _entry_symbol: &str,
            _test: &TestCase,
            mapping_len: usize,
            dump_path: &Utf8Path,
        ) -> Result<()> {
            let mut bytes = Vec::with_capacity(mapping_len * 8);
            for word in 0..mapping_len as u64 {
                bytes.extend_from_slice(&word.to_le_bytes());
            }
            std::fs::write(dump_path, bytes)?;
            Ok(())
        }
    }

    #[test]
    fn empty_plan_produces_empty_result() {
        let dir = tempfile::tempdir().unwrap();
        let work_dir = Utf8PathBuf::from_path_buf(dir.path().to_owned()).unwrap();
        let options = Options::from_config(&Config::default()).unwrap();
        let toolchain = NoopToolchain;
        let launcher = FakeLauncher;
        let sandbox = NullSandbox;
        let cache = ObjectCache::in_memory_only();
        let engine = Engine {
            options: &options,
            toolchain: &toolchain,
            launcher: &launcher,
            sandbox: &sandbox,
            junk_filter: &crate::junk::NullJunkFilter,
            cache: &cache,
            work_dir,
        };
        let module = Module::new("empty");
        let module_id = ModuleId::of_bytes(&module.to_bytes().unwrap());
        let result = engine.run(&module_id, &module, &[]).unwrap();
        assert!(result.mutation_results.is_empty());
        assert!(result.mutation_points.is_empty());
    }

    #[test]
    fn transitive_callees_follows_calls_and_stops_at_external_symbols() {
        let mut module = Module::new("m");
        let mut a = Function::new("a", 0, false);
        a.blocks.push(crate::ir::BasicBlock {
            instructions: vec![
                crate::ir::Instruction::Call { dest: None, callee: "b".into(), args: vec![] },
                crate::ir::Instruction::Call { dest: None, callee: "libc_thing".into(), args: vec![] },
                crate::ir::Instruction::Ret { value: None },
            ],
        });
        let mut b = Function::new("b", 0, false);
        b.blocks.push(crate::ir::BasicBlock {
            instructions: vec![crate::ir::Instruction::Ret { value: None }],
        });
        module.functions.push(a);
        module.functions.push(b);

        let found = transitive_callees(&module, "a");
        let names: Vec<&str> = found.iter().map(|(_, f)| f.name.as_str()).collect();
        assert!(names.contains(&"a"));
        assert!(names.contains(&"b"));
        assert!(!names.contains(&"libc_thing")); // no body in this module
    }
}
