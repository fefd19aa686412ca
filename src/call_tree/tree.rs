// Copyright 2021 - 2025 Martin Pool

//! Call-tree reconstruction from a run's mapping table (`spec.md` §4.4):
//! arena-of-nodes, first-caller-wins, recursion collapsed rather than
//! chased.

use std::collections::{HashMap, VecDeque};

use crate::ir::FunctionIndex;

/// The process-global counter table an instrumented binary fills in as it
/// runs: `mapping[i]` is the probe index of `i`'s first caller, or `i`
/// itself if `i` was entered with an empty call stack (a root), or `0` if
/// `i` was never entered. Index 0 is unused (probe indices are 1-based).
pub type MappingTable = Vec<u64>;

/// One call-tree node. `function_index` is `None` only for the sentinel
/// root (`spec.md` §3: "Root has `function = ⊥`, `level = 0`").
#[derive(Clone, Debug)]
pub struct CallTreeNode {
    pub function_index: Option<FunctionIndex>,
    pub level: u32,
    pub children: Vec<usize>,
}

/// A reconstructed call tree: an arena of nodes referencing each other by
/// index, never by pointer, so that reconstruction never has to reason
/// about the mapping table's cycles directly (`spec.md` §9).
pub struct CallTree {
    nodes: Vec<CallTreeNode>,
}

impl CallTree {
    const ROOT: usize = 0;

    /// Reconstruct the tree from one run's mapping table (`spec.md` §4.4:
    /// "iterate `i` from high to low; each non-zero `mapping[i]` names its
    /// parent"). `mapping[i] == i` marks `i` as a root of a subtree
    /// directly under the sentinel; `mapping[i] == 0` means `i` was never
    /// entered during the run and does not appear in the tree at all.
    pub fn build(mapping: &MappingTable) -> CallTree {
        let mut nodes = vec![CallTreeNode {
            function_index: None,
            level: 0,
            children: Vec::new(),
        }];
        let mut node_for_probe: HashMap<u64, usize> = HashMap::new();

        for (probe, &parent_probe) in mapping.iter().enumerate().skip(1) {
            if parent_probe == 0 {
                continue;
            }
            let node_index = nodes.len();
            nodes.push(CallTreeNode {
                function_index: Some(probe - 1),
                level: 0,
                children: Vec::new(),
            });
            node_for_probe.insert(probe as u64, node_index);
        }

        for (probe, &parent_probe) in mapping.iter().enumerate().skip(1) {
            if parent_probe == 0 {
                continue;
            }
            let child_index = node_for_probe[&(probe as u64)];
            let parent_index = if parent_probe == probe as u64 {
                CallTree::ROOT
            } else {
                match node_for_probe.get(&parent_probe) {
                    Some(&idx) => idx,
                    None => CallTree::ROOT,
                }
            };
            nodes[parent_index].children.push(child_index);
        }

        let mut tree = CallTree { nodes };
        tree.assign_levels();
        tree
    }

    fn assign_levels(&mut self) {
        let mut queue = VecDeque::from([CallTree::ROOT]);
        while let Some(idx) = queue.pop_front() {
            let level = self.nodes[idx].level;
            let children = self.nodes[idx].children.clone();
            for child in children {
                self.nodes[child].level = level + 1;
                queue.push_back(child);
            }
        }
    }

    fn node_for_function(&self, function_index: FunctionIndex) -> Option<usize> {
        self.nodes
            .iter()
            .position(|n| n.function_index == Some(function_index))
    }

    /// Breadth-first walk from `entry_function`'s node, capped at
    /// `max_distance`, returning every function reached along the way
    /// (`spec.md` §4.4, "Subtree extraction and bounded reach").
    pub fn reachable_from(
        &self,
        entry_function: FunctionIndex,
        max_distance: u32,
    ) -> Vec<ReachableFunction> {
        let Some(start) = self.node_for_function(entry_function) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut queue = VecDeque::from([(start, 0u32)]);
        let mut visited = std::collections::HashSet::from([start]);
        while let Some((idx, distance)) = queue.pop_front() {
            if let Some(function_index) = self.nodes[idx].function_index {
                out.push(ReachableFunction {
                    function_index,
                    distance,
                });
            }
            if distance >= max_distance {
                continue;
            }
            for &child in &self.nodes[idx].children {
                if visited.insert(child) {
                    queue.push_back((child, distance + 1));
                }
            }
        }
        out
    }
}

/// A function reached during a test run, and its call-graph distance from
/// the test's entry point (`spec.md` §3).
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct ReachableFunction {
    pub function_index: FunctionIndex,
    pub distance: u32,
}

#[cfg(test)]
mod test {
    use super::*;

    /// `f1->f2->f3->f4->f5`, each calling the next and then returning:
    /// `mapping[1] = 1` (root), `mapping[2] = 1`, `mapping[3] = 2`,
    /// `mapping[4] = 3`, `mapping[5] = 4`.
    fn chain_mapping() -> MappingTable {
        vec![0, 1, 1, 2, 3, 4]
    }

    #[test]
    fn bounded_reach_stops_at_max_distance() {
        let tree = CallTree::build(&chain_mapping());
        let reachable = tree.reachable_from(0, 2);
        let distances: HashMap<_, _> = reachable.iter().map(|r| (r.function_index, r.distance)).collect();
        assert_eq!(distances.len(), 3);
        assert_eq!(distances[&0], 0);
        assert_eq!(distances[&1], 1);
        assert_eq!(distances[&2], 2);
        assert!(!distances.contains_key(&3));
        assert!(!distances.contains_key(&4));
    }

    /// `f1->f2->f1->f3`: f3's first caller is f2, not f1, because f1 is
    /// already on the stack when it's re-entered and `mapping[1]` was
    /// already set (`spec.md` §8, recursion example).
    #[test]
    fn recursive_reentry_does_not_overwrite_first_caller() {
        let mapping = vec![0, 1, 1, 2];
        let tree = CallTree::build(&mapping);
        let reachable = tree.reachable_from(0, 10);
        let distances: HashMap<_, _> = reachable.iter().map(|r| (r.function_index, r.distance)).collect();
        assert_eq!(distances[&0], 0);
        assert_eq!(distances[&1], 1);
        assert_eq!(distances[&2], 2);
    }

    #[test]
    fn unreached_function_is_absent_from_the_tree() {
        let tree = CallTree::build(&chain_mapping());
        assert!(tree.reachable_from(10, 5).is_empty());
    }
}
