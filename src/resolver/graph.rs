// src/resolver/graph.rs

//! Load-order graph and stable topological sort
//!
//! Nodes are exactly the mods in the activation list. Constraints naming
//! mods that are not active are ignored here; reporting them is the
//! analyzer's job.

use crate::mods::{ActivationList, ModRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

/// What to do about constraints that form a loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Keep the unresolved mods in their current order and say nothing
    Fallback,
    /// Keep the fallback order but report the loop as an error diagnostic
    #[default]
    Diagnose,
}

/// Result of a sort, including the mods that could not be ordered
#[derive(Debug, Clone, Default)]
pub struct SortOutcome {
    pub order: ActivationList,
    /// Ids left over by a constraint loop, in activation list order
    pub cyclic_ids: Vec<String>,
}

impl SortOutcome {
    pub fn has_cycle(&self) -> bool {
        !self.cyclic_ids.is_empty()
    }
}

/// Directed "loads before" graph over the distinct mods of a list
struct LoadGraph<'a> {
    nodes: Vec<&'a Arc<ModRecord>>,
    successors: Vec<BTreeSet<usize>>,
    in_degree: Vec<usize>,
}

impl<'a> LoadGraph<'a> {
    fn build(list: &'a ActivationList) -> Self {
        // Repeated ids collapse onto their first occurrence
        let mut nodes: Vec<&Arc<ModRecord>> = Vec::with_capacity(list.len());
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(list.len());
        for record in list.records() {
            if !index.contains_key(record.canonical_id.as_str()) {
                index.insert(record.canonical_id.as_str(), nodes.len());
                nodes.push(record);
            }
        }

        let mut successors = vec![BTreeSet::new(); nodes.len()];
        for (i, record) in nodes.iter().enumerate() {
            for target in record.load_after.iter() {
                if let Some(&t) = index.get(target) {
                    if t != i {
                        successors[t].insert(i);
                    }
                }
            }
            for target in record.load_before.iter() {
                if let Some(&t) = index.get(target) {
                    if t != i {
                        successors[i].insert(t);
                    }
                }
            }
        }

        let mut in_degree = vec![0usize; nodes.len()];
        for succ in &successors {
            for &s in succ {
                in_degree[s] += 1;
            }
        }

        Self {
            nodes,
            successors,
            in_degree,
        }
    }

    fn edge_count(&self) -> usize {
        self.successors.iter().map(BTreeSet::len).sum()
    }

    fn id(&self, node: usize) -> &str {
        &self.nodes[node].canonical_id
    }

    fn sort_by_id(&self, batch: &mut [usize]) {
        batch.sort_by(|&a, &b| self.id(a).cmp(self.id(b)));
    }

    /// Kahn's algorithm with lexicographically sorted ready batches
    fn sort(mut self) -> SortOutcome {
        let mut ready: Vec<usize> = (0..self.nodes.len())
            .filter(|&n| self.in_degree[n] == 0)
            .collect();
        self.sort_by_id(&mut ready);
        let mut queue: VecDeque<usize> = ready.into();

        let mut placed = vec![false; self.nodes.len()];
        let mut order: Vec<Arc<ModRecord>> = Vec::with_capacity(self.nodes.len());

        while let Some(node) = queue.pop_front() {
            placed[node] = true;
            order.push(Arc::clone(self.nodes[node]));

            let mut freed = Vec::new();
            for &next in &self.successors[node] {
                self.in_degree[next] -= 1;
                if self.in_degree[next] == 0 {
                    freed.push(next);
                }
            }
            self.sort_by_id(&mut freed);
            queue.extend(freed);
        }

        let mut cyclic_ids = Vec::new();
        for (node, &record) in self.nodes.iter().enumerate() {
            if !placed[node] {
                cyclic_ids.push(record.canonical_id.clone());
                order.push(Arc::clone(record));
            }
        }

        if !cyclic_ids.is_empty() {
            warn!(
                "Load order constraints form a loop; keeping current order for: {}",
                cyclic_ids.join(", ")
            );
        }

        SortOutcome {
            order: order.into_iter().collect(),
            cyclic_ids,
        }
    }
}

/// Compute the load order of an activation list
///
/// Deterministic and total: the result depends only on the set of mods and
/// their constraints, never on the input order, except for mods caught in a
/// constraint loop, which keep their relative input order at the end.
pub fn build_order(list: &ActivationList) -> ActivationList {
    build_order_detailed(list).order
}

/// Like [`build_order`], but also reports which mods a loop left unordered
pub fn build_order_detailed(list: &ActivationList) -> SortOutcome {
    let graph = LoadGraph::build(list);
    debug!(
        "Sorting {} mods with {} ordering edges",
        graph.nodes.len(),
        graph.edge_count()
    );
    graph.sort()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, after: &[&str], before: &[&str]) -> ModRecord {
        let mut record = ModRecord::new(id, format!("/mods/{}", id));
        record.load_after = after.iter().collect();
        record.load_before = before.iter().collect();
        record
    }

    fn ids(list: &ActivationList) -> Vec<String> {
        list.ids()
    }

    #[test]
    fn test_no_constraints_is_lexicographic() {
        let permutations: [[&str; 4]; 3] = [
            ["d.mod", "a.mod", "c.mod", "b.mod"],
            ["a.mod", "b.mod", "c.mod", "d.mod"],
            ["c.mod", "d.mod", "b.mod", "a.mod"],
        ];
        for input in permutations {
            let list: ActivationList = input.iter().map(|id| record(id, &[], &[])).collect();
            assert_eq!(
                ids(&build_order(&list)),
                vec!["a.mod", "b.mod", "c.mod", "d.mod"]
            );
        }
    }

    #[test]
    fn test_empty_list() {
        let outcome = build_order_detailed(&ActivationList::new());
        assert!(outcome.order.is_empty());
        assert!(!outcome.has_cycle());
    }

    #[test]
    fn test_load_after_respected() {
        let list: ActivationList = vec![
            record("a.mod", &["z.mod"], &[]),
            record("z.mod", &[], &[]),
        ]
        .into_iter()
        .collect();
        assert_eq!(ids(&build_order(&list)), vec!["z.mod", "a.mod"]);
    }

    #[test]
    fn test_load_before_respected() {
        let list: ActivationList = vec![
            record("a.mod", &[], &[]),
            record("z.mod", &[], &["a.mod"]),
        ]
        .into_iter()
        .collect();
        assert_eq!(ids(&build_order(&list)), vec!["z.mod", "a.mod"]);
    }

    #[test]
    fn test_freed_batch_appended_after_queue() {
        // b and c are ready at once; x is only freed by a
        let list: ActivationList = vec![
            record("x.mod", &["a.mod"], &[]),
            record("a.mod", &[], &[]),
            record("c.mod", &[], &[]),
            record("b.mod", &[], &[]),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            ids(&build_order(&list)),
            vec!["a.mod", "b.mod", "c.mod", "x.mod"]
        );
    }

    #[test]
    fn test_constraints_on_inactive_mods_ignored() {
        let list: ActivationList = vec![
            record("b.mod", &["missing.mod"], &["also.missing"]),
            record("a.mod", &[], &[]),
        ]
        .into_iter()
        .collect();
        let outcome = build_order_detailed(&list);
        assert_eq!(ids(&outcome.order), vec!["a.mod", "b.mod"]);
        assert!(!outcome.has_cycle());
    }

    #[test]
    fn test_cycle_terminates_with_every_mod_once() {
        let list: ActivationList = vec![
            record("b.mod", &["c.mod"], &[]),
            record("a.mod", &["b.mod"], &[]),
            record("c.mod", &["a.mod"], &[]),
            record("free.mod", &[], &[]),
        ]
        .into_iter()
        .collect();
        let outcome = build_order_detailed(&list);
        assert_eq!(
            ids(&outcome.order),
            vec!["free.mod", "b.mod", "a.mod", "c.mod"]
        );
        assert_eq!(outcome.cyclic_ids, vec!["b.mod", "a.mod", "c.mod"]);
    }

    #[test]
    fn test_self_reference_ignored() {
        let list: ActivationList = vec![record("a.mod", &["a.mod"], &["a.mod"])]
            .into_iter()
            .collect();
        let outcome = build_order_detailed(&list);
        assert_eq!(ids(&outcome.order), vec!["a.mod"]);
        assert!(!outcome.has_cycle());
    }

    #[test]
    fn test_duplicate_ids_collapse_to_first() {
        let first = record("a.mod", &[], &[]);
        let mut second = record("A.Mod", &[], &[]);
        second.source_path = "/mods/copy".into();
        let list: ActivationList = vec![record("b.mod", &[], &[]), first, second]
            .into_iter()
            .collect();
        let order = build_order(&list);
        assert_eq!(ids(&order), vec!["a.mod", "b.mod"]);
        assert_eq!(order.records()[0].source_path, std::path::PathBuf::from("/mods/a.mod"));
    }

    #[test]
    fn test_redundant_constraints_counted_once() {
        // The same edge declared from both ends
        let list: ActivationList = vec![
            record("a.mod", &["b.mod"], &[]),
            record("b.mod", &[], &["a.mod"]),
        ]
        .into_iter()
        .collect();
        assert_eq!(ids(&build_order(&list)), vec!["b.mod", "a.mod"]);
    }
}
