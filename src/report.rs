// Copyright 2021 - 2025 Martin Pool

//! Report data produced for external formatters (`spec.md` §6): the
//! engine's own `Result` value, an IDE-reporter line formatter, and a
//! Stryker `mutation-testing-elements`-schema JSON document.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::mutation_point::MutationPoint;
use crate::sandbox::{ExecutionResult, Status};
use crate::Result;

/// One mutation point's outcome against one test (`spec.md` §6:
/// `MutationResult = { mutationPoint, executionResult, testee, distance }`).
#[derive(Clone, Debug)]
pub struct MutationResult {
    pub mutation_point: MutationPoint,
    pub execution_result: ExecutionResult,
    pub testee: String,
    pub distance: u32,
}

impl MutationResult {
    /// Any non-`Passed` status counts as the mutant being caught
    /// (`spec.md` §7: "each counts as 'mutant killed' for scoring
    /// purposes").
    pub fn is_killed(&self) -> bool {
        !matches!(self.execution_result.status, Status::Passed)
    }
}

/// The engine's top-level result (`spec.md` §6).
#[derive(Default)]
pub struct EngineResult {
    pub mutation_points: Vec<MutationPoint>,
    pub mutation_results: Vec<MutationResult>,
}

impl EngineResult {
    /// Percentage of mutants killed, out of those that were actually run
    /// (`DryRun`/`Invalid` results don't count either way). Reports 100%
    /// when nothing ran, matching the conventional "vacuously fully
    /// covered" convention other mutation testers use for an empty run.
    pub fn mutation_score(&self) -> f64 {
        let scored: Vec<&MutationResult> = self
            .mutation_results
            .iter()
            .filter(|r| !matches!(r.execution_result.status, Status::DryRun | Status::Invalid))
            .collect();
        if scored.is_empty() {
            return 100.0;
        }
        let killed = scored.iter().filter(|r| r.is_killed()).count();
        100.0 * killed as f64 / scored.len() as f64
    }
}

/// `<file>:<line>:<col>: warning: <Killed|Survived>: <diagnostic> [<operatorId>]`
/// (`spec.md` §6).
pub fn ide_lines(result: &EngineResult) -> Vec<String> {
    result
        .mutation_results
        .iter()
        .map(|r| {
            let verdict = if r.is_killed() { "Killed" } else { "Survived" };
            let point = &r.mutation_point;
            match &point.source_location {
                Some(loc) => format!(
                    "{}:{}:{}: warning: {verdict}: {} [{}]",
                    loc.file_path, loc.line, loc.column, point.diagnostic, point.operator_id
                ),
                None => format!(
                    "{}: warning: {verdict}: {} [{}]",
                    point.address, point.diagnostic, point.operator_id
                ),
            }
        })
        .collect()
}

#[derive(Serialize)]
struct Position {
    line: u32,
    column: u32,
}

#[derive(Serialize)]
struct Location {
    start: Position,
    end: Position,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ElementMutant {
    id: String,
    mutator_name: String,
    replacement: String,
    location: Location,
    status: String,
}

#[derive(Serialize)]
struct FileMutants {
    mutants: Vec<ElementMutant>,
}

/// A Stryker `mutation-testing-elements`-schema document (`spec.md` §6):
/// `{ files: { <path>: { mutants: [...] } } }`. Mutation points with no
/// source location are grouped under an empty-string file key so the
/// document is still valid, rather than dropped.
#[derive(Serialize)]
pub struct ElementsDocument {
    files: BTreeMap<String, FileMutants>,
}

pub fn elements_document(result: &EngineResult) -> ElementsDocument {
    let mut files: BTreeMap<String, FileMutants> = BTreeMap::new();
    for (i, r) in result.mutation_results.iter().enumerate() {
        let point = &r.mutation_point;
        let (file, line, column) = match &point.source_location {
            Some(loc) => (loc.file_path.clone(), loc.line, loc.column),
            None => (String::new(), 0, 0),
        };
        let status = if r.is_killed() { "Killed" } else { "Survived" }.to_owned();
        files.entry(file).or_insert_with(|| FileMutants { mutants: Vec::new() }).mutants.push(ElementMutant {
            id: i.to_string(),
            mutator_name: point.operator_id.to_string(),
            replacement: point.replacement.clone(),
            location: Location {
                start: Position { line, column },
                end: Position { line, column },
            },
            status,
        });
    }
    ElementsDocument { files }
}

pub fn elements_document_json(result: &EngineResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(&elements_document(result))?)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    use crate::bitcode::ModuleId;
    use crate::mutation_point::{Address, SourceLocation};
    use crate::operators::OperatorId;
    use std::time::Duration;

    fn sample_result(status: Status) -> MutationResult {
        MutationResult {
            mutation_point: MutationPoint {
                operator_id: OperatorId::AddToSub,
                address: Address { function_index: 0, basic_block_index: 0, instruction_index: 0 },
                module: ModuleId::from_hex("a".into()),
                diagnostic: "replace + with -".into(),
                replacement: "-".into(),
                source_location: Some(SourceLocation { file_path: "sum.c".into(), line: 3, column: 5 }),
            },
            execution_result: ExecutionResult {
                status,
                wall_time: Duration::from_millis(1),
                stdout: String::new(),
                stderr: String::new(),
                exit_code: Some(0),
            },
            testee: "sum_test".into(),
            distance: 1,
        }
    }

    #[test]
    fn mutation_score_counts_anything_but_passed_as_killed() {
        let result = EngineResult {
            mutation_points: Vec::new(),
            mutation_results: vec![
                sample_result(Status::Failed),
                sample_result(Status::Crashed),
                sample_result(Status::Passed),
            ],
        };
        assert!((result.mutation_score() - (200.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn empty_run_scores_100_percent() {
        let result = EngineResult::default();
        assert_eq!(result.mutation_score(), 100.0);
    }

    #[test]
    fn ide_line_includes_verdict_and_operator_id() {
        let result = EngineResult {
            mutation_points: Vec::new(),
            mutation_results: vec![sample_result(Status::Passed)],
        };
        let lines = ide_lines(&result);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0], "sum.c:3:5: warning: Survived: replace + with - [add_to_sub]");
    }

    #[test]
    fn elements_document_groups_by_file() {
        let result = EngineResult {
            mutation_points: Vec::new(),
            mutation_results: vec![sample_result(Status::Failed)],
        };
        let doc = elements_document(&result);
        assert_eq!(doc.files["sum.c"].mutants.len(), 1);
        assert_eq!(doc.files["sum.c"].mutants[0].status, "Killed");
    }
}
