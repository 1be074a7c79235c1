//! Drop ordering over a [`DependencyGraph`].
//!
//! Entities are peeled off in rounds: a round takes every entity with no
//! remaining blockers, and scheduling them releases the entities they were
//! blocking for the next round. Within a round names are emitted in lexical
//! order, so the same graph always yields the same order.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tracing::debug;

use crate::error::CycleError;
use crate::graph::DependencyGraph;

/// Entity names in the order they can be dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropOrder {
    names: Vec<String>,
    rounds: usize,
}

impl DropOrder {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Number of peeling rounds it took to schedule every entity.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn as_slice(&self) -> &[String] {
        &self.names
    }

    pub fn into_inner(self) -> Vec<String> {
        self.names
    }
}

impl IntoIterator for DropOrder {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.names.into_iter()
    }
}

impl fmt::Display for DropOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (ix, name) in self.names.iter().enumerate() {
            if ix != 0 {
                f.write_str(", ")?;
            }
            f.write_str(name)?;
        }
        Ok(())
    }
}

pub fn schedule(graph: DependencyGraph) -> Result<DropOrder, CycleError> {
    let blockers = graph.blockers;

    // remaining blocker count per entity, and the reverse edges used to
    // decrement them once a blocker is scheduled
    let mut pending: BTreeMap<&str, usize> = BTreeMap::new();
    let mut releases: HashMap<&str, Vec<&str>> = HashMap::new();
    for (entity, entity_blockers) in &blockers {
        let mut count = 0;
        for blocker in entity_blockers {
            if blocker == entity || !blockers.contains_key(blocker) {
                continue;
            }
            count += 1;
            releases.entry(blocker.as_str()).or_default().push(entity.as_str());
        }
        pending.insert(entity.as_str(), count);
    }

    let mut ready: Vec<&str> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(entity, _)| *entity)
        .collect();
    let mut names = Vec::with_capacity(pending.len());
    let mut rounds = 0;

    while !ready.is_empty() {
        rounds += 1;
        ready.sort_unstable();
        debug!(round = rounds, ready = ready.len(), "scheduling round");

        let mut next = Vec::new();
        for entity in &ready {
            pending.remove(entity);
            for blocked in releases.get(entity).into_iter().flatten() {
                if let Some(count) = pending.get_mut(blocked) {
                    *count -= 1;
                    if *count == 0 {
                        next.push(*blocked);
                    }
                }
            }
        }

        names.extend(ready.iter().map(|entity| entity.to_string()));
        ready = next;
    }

    if !pending.is_empty() {
        return Err(CycleError {
            remaining: pending.keys().map(|entity| entity.to_string()).collect(),
        });
    }

    return Ok(DropOrder { names, rounds });
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn graph(entries: &[(&str, Vec<&str>)]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for (entity, blockers) in entries {
            graph.insert(*entity, blockers.iter().copied());
        }
        graph
    }

    #[test]
    fn chain_drops_leaf_view_first() {
        let order = schedule(graph(&[
            ("orders", vec!["orders_vw"]),
            ("orders_vw", vec!["orders_summary_vw"]),
            ("orders_summary_vw", vec![]),
        ]))
        .unwrap();

        assert_eq!(
            order.into_inner(),
            vec!["orders_summary_vw", "orders_vw", "orders"]
        );
    }

    #[test]
    fn shared_dependent_precedes_both_roots() {
        let order = schedule(graph(&[
            ("t1", vec!["shared_vw"]),
            ("t2", vec!["shared_vw"]),
            ("shared_vw", vec![]),
        ]))
        .unwrap();

        assert_eq!(order.into_inner(), vec!["shared_vw", "t1", "t2"]);
    }

    #[test]
    fn ready_entities_are_emitted_lexically_per_round() {
        let order = schedule(graph(&[
            ("zeta", vec![]),
            ("alpha", vec!["mid"]),
            ("mid", vec![]),
            ("beta", vec![]),
        ]))
        .unwrap();

        assert_eq!(order.rounds(), 2);
        assert_eq!(order.into_inner(), vec!["beta", "mid", "zeta", "alpha"]);
    }

    #[test]
    fn every_blocker_comes_before_what_it_blocks() {
        let input = graph(&[
            ("base", vec!["v1", "v2", "v3", "v4"]),
            ("v1", vec!["v3", "v4"]),
            ("v2", vec!["v4"]),
            ("v3", vec!["v4"]),
            ("v4", vec![]),
            ("other", vec!["v2"]),
        ]);

        let order = schedule(input.clone()).unwrap();

        assert_eq!(order.len(), input.len());
        for entity in input.entities() {
            let at = order.position(entity).unwrap();
            for blocker in input.blockers(entity).unwrap() {
                assert!(order.position(blocker).unwrap() < at, "{blocker} before {entity}");
            }
        }
    }

    #[test]
    fn two_entity_cycle_is_reported() {
        let err = schedule(graph(&[("a", vec!["b"]), ("b", vec!["a"])])).unwrap_err();
        assert_eq!(err.remaining, vec!["a", "b"]);
    }

    #[test]
    fn cycle_leaves_schedulable_part_out_of_the_error() {
        let err = schedule(graph(&[
            ("free", vec![]),
            ("a", vec!["b"]),
            ("b", vec!["c"]),
            ("c", vec!["a"]),
            ("d", vec!["a"]),
        ]))
        .unwrap_err();

        assert_eq!(err.remaining, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn blockers_outside_the_graph_are_ignored() {
        let mut input = DependencyGraph::new();
        input.insert("t", ["v", "gone"]);
        input.insert("v", Vec::<String>::new());

        assert_eq!(schedule(input).unwrap().into_inner(), vec!["v", "t"]);
    }

    #[test]
    fn empty_graph_gives_empty_order() {
        let order = schedule(DependencyGraph::new()).unwrap();
        assert!(order.is_empty());
        assert_eq!(order.rounds(), 0);
    }

    #[test]
    fn scheduling_is_deterministic() {
        let input = graph(&[
            ("c", vec![]),
            ("a", vec![]),
            ("b", vec!["c", "a"]),
            ("d", vec![]),
        ]);

        let first = schedule(input.clone()).unwrap();
        let second = schedule(input).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.to_string(), "a, c, d, b");
    }
}
