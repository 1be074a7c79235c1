use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::trace;

use crate::error::ResolutionError;

/// Every entity that depends on one queried entity, at any depth.
pub type DependentSet = BTreeSet<String>;

/// Backend capability: list the entities that transitively depend on `name`.
///
/// Implementations may return duplicates, empty names, or `name` itself;
/// [`resolve`] cleans the raw answer up.
#[async_trait]
pub trait DependencyResolver: Send + Sync {
    async fn dependents(&self, name: &str) -> Result<Vec<String>, ResolutionError>;
}

pub async fn resolve<R>(resolver: &R, name: &str) -> Result<DependentSet, ResolutionError>
where
    R: DependencyResolver + ?Sized,
{
    if name.trim().is_empty() {
        return Err(ResolutionError::InvalidIdentifier(name.to_string()));
    }

    let raw = resolver.dependents(name).await?;
    let raw_len = raw.len();
    let dependents: DependentSet = raw
        .into_iter()
        .filter(|dependent| !dependent.is_empty() && dependent != name)
        .collect();

    trace!(name, raw = raw_len, unique = dependents.len(), "resolved dependents");
    return Ok(dependents);
}
