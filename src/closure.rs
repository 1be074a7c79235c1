//! Transitive expansion of a root set into every entity taking part in a drop.
//!
//! Each entity is resolved exactly once. Resolutions within a round run
//! concurrently; rounds run one after another because each round's frontier is
//! made of the names the previous round discovered.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{ExpandError, ResolutionError};
use crate::resolver::{resolve, DependencyResolver, DependentSet};

/// Every discovered entity mapped to its own dependent set.
pub type Closure = BTreeMap<String, DependentSet>;

#[derive(Debug, Clone)]
pub struct ExpandOptions {
    /// Maximum resolutions in flight within one round.
    pub concurrency: usize,
    /// Upper bound on the number of entities in the closure.
    pub max_entities: Option<usize>,
    pub resolve_timeout: Option<Duration>,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            concurrency: 8,
            max_entities: Some(10_000),
            resolve_timeout: None,
        }
    }
}

pub async fn expand<R, I, S>(
    resolver: &R,
    roots: I,
    options: &ExpandOptions,
    cancel: &CancellationToken,
) -> Result<Closure, ExpandError>
where
    R: DependencyResolver + ?Sized,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut closure = Closure::new();
    let mut frontier: BTreeSet<String> = roots.into_iter().map(Into::into).collect();
    let mut round = 0usize;

    while !frontier.is_empty() {
        if cancel.is_cancelled() {
            return Err(ExpandError::Cancelled);
        }
        if let Some(limit) = options.max_entities {
            if closure.len() + frontier.len() > limit {
                return Err(ExpandError::LimitExceeded { limit });
            }
        }

        round += 1;
        debug!(round, frontier = frontier.len(), "resolving frontier");

        // tripped by the caller or by the first failed resolution of the round
        let halt = cancel.child_token();
        let halt = &halt;
        let results: Vec<(String, Result<DependentSet, ExpandError>)> =
            stream::iter(frontier.iter().cloned())
                .map(move |name| async move {
                    if halt.is_cancelled() {
                        return (name, Err(ExpandError::Cancelled));
                    }
                    let result = resolve_bounded(resolver, &name, options.resolve_timeout).await;
                    if result.is_err() {
                        halt.cancel();
                    }
                    (name, result.map_err(ExpandError::from))
                })
                .buffer_unordered(options.concurrency.max(1))
                .collect()
                .await;

        let mut failure = None;
        let mut next = BTreeSet::new();
        for (name, result) in results {
            match result {
                Ok(dependents) => {
                    next.extend(
                        dependents
                            .iter()
                            .filter(|d| !closure.contains_key(*d) && !frontier.contains(*d))
                            .cloned(),
                    );
                    closure.insert(name, dependents);
                }
                // a real failure outranks a cancellation from the same round
                Err(ExpandError::Cancelled) => {
                    failure.get_or_insert(ExpandError::Cancelled);
                }
                Err(err) => {
                    if !matches!(failure, Some(ExpandError::Resolution(_))) {
                        failure = Some(err);
                    }
                }
            }
        }
        if let Some(err) = failure {
            return Err(err);
        }

        next.retain(|name| !closure.contains_key(name));
        frontier = next;
    }

    info!(entities = closure.len(), rounds = round, "dependency closure complete");
    return Ok(closure);
}

async fn resolve_bounded<R>(
    resolver: &R,
    name: &str,
    timeout: Option<Duration>,
) -> Result<DependentSet, ResolutionError>
where
    R: DependencyResolver + ?Sized,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, resolve(resolver, name))
            .await
            .map_err(|_| ResolutionError::Timeout(name.to_string()))?,
        None => resolve(resolver, name).await,
    }
}
