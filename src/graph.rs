use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::closure::Closure;
use crate::error::CycleError;
use crate::scheduler::{schedule, DropOrder};

/// Entity name mapped to its blockers: the entities that depend on it and so
/// have to be dropped before it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    pub(crate) blockers: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turns an expanded closure into a graph. Every closure key becomes an
    /// entity, and so does any dependent the closure names without having
    /// resolved it.
    pub fn build(closure: &Closure) -> Self {
        let mut graph = Self::new();
        for (entity, dependents) in closure {
            graph.insert(entity.clone(), dependents.iter().cloned());
        }

        let unresolved: Vec<String> = graph
            .blockers
            .values()
            .flatten()
            .filter(|blocker| !graph.blockers.contains_key(*blocker))
            .cloned()
            .collect();
        for name in unresolved {
            debug!(entity = %name, "dependent missing from closure, adding without blockers");
            graph.blockers.entry(name).or_default();
        }

        graph
    }

    /// Adds `entity` with the given blockers, merging with any it already has.
    /// A name never blocks itself.
    pub fn insert<S, I>(&mut self, entity: impl Into<String>, blockers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entity = entity.into();
        let entry = self.blockers.entry(entity.clone()).or_default();
        entry.extend(
            blockers
                .into_iter()
                .map(Into::into)
                .filter(|blocker: &String| *blocker != entity),
        );
    }

    pub fn blockers(&self, entity: &str) -> Option<&BTreeSet<String>> {
        self.blockers.get(entity)
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.blockers.contains_key(entity)
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.blockers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.blockers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blockers.is_empty()
    }

    pub fn schedule(self) -> Result<DropOrder, CycleError> {
        schedule(self)
    }
}
