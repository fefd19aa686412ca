// Copyright 2021 - 2025 Martin Pool

//! The task executor (`spec.md` §9, "Parallel task abstraction"): a
//! bounded worker pool over a work sequence, with deterministic output
//! merging and progress reporting. Work is split round-robin across
//! workers rather than work-stolen, so merging each worker's results back
//! in original-index order reproduces the same output on every run
//! regardless of how fast each worker happened to go.

use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};

use crate::Result;

/// Default worker count when the caller doesn't override it: the number
/// of threads the platform reports as usable, falling back to one.
pub fn effective_workers() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Run `work` over every item in `items`, using up to `worker_count`
/// threads (capped at `items.len()` so idle workers are never spawned),
/// and return results in the same order as `items`.
///
/// `work` receives the assigned worker's ordinal as well as the item, so
/// callers whose work needs per-worker state (e.g. "each worker holds its
/// own compiler instance", `spec.md` §9) can index into a
/// pre-built per-worker resource table.
///
/// Every worker checks `crate::interrupt::check_interrupted()` before
/// taking its next item, so a ctrl-c during a long run (`spec.md` §4.7,
/// §5) stops the pool from picking up further work; already-started
/// items still run to completion. If interrupted before every item
/// completed, returns an error instead of a partial result.
pub fn execute<T, R, F>(items: &[T], worker_count: usize, show_progress: bool, work: F) -> Result<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> R + Sync,
{
    if items.is_empty() {
        return Ok(Vec::new());
    }
    let worker_count = worker_count.max(1).min(items.len());
    let results: Mutex<Vec<Option<R>>> = Mutex::new((0..items.len()).map(|_| None).collect());

    let progress = show_progress.then(|| {
        let bar = ProgressBar::new(items.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
                .expect("static progress template is valid"),
        );
        bar
    });

    std::thread::scope(|scope| {
        for worker in 0..worker_count {
            let results = &results;
            let progress = progress.as_ref();
            let work = &work;
            scope.spawn(move || {
                for index in (worker..items.len()).step_by(worker_count) {
                    if crate::interrupt::check_interrupted().is_err() {
                        break;
                    }
                    let value = work(worker, &items[index]);
                    results.lock().expect("executor result mutex poisoned")[index] = Some(value);
                    if let Some(bar) = progress {
                        bar.inc(1);
                    }
                }
            });
        }
    });

    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    let slots = results.into_inner().expect("executor result mutex poisoned");
    if slots.iter().any(Option::is_none) {
        anyhow::bail!("interrupted");
    }
    Ok(slots
        .into_iter()
        .map(|slot| slot.expect("checked above: every slot is filled"))
        .collect())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn preserves_input_order_regardless_of_worker_count() {
        let items: Vec<i32> = (0..50).collect();
        let results = execute(&items, 8, false, |_worker, item| item * 2).unwrap();
        let expected: Vec<i32> = items.iter().map(|i| i * 2).collect();
        assert_eq!(results, expected);
    }

    #[test]
    fn empty_input_produces_empty_output() {
        let items: Vec<i32> = Vec::new();
        let results = execute(&items, 4, false, |_worker, item: &i32| *item).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn worker_count_never_exceeds_item_count() {
        let items = vec![1, 2, 3];
        let worker_ids: Vec<usize> = execute(&items, 64, false, |worker, _item| worker).unwrap();
        assert!(worker_ids.iter().all(|&w| w < 3));
    }
}
