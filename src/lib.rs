//! Finds every view depending on a set of tables or views and works out an
//! order in which those views can be dropped.
//!
//! The pipeline runs in three stages:
//!
//! - [`closure::expand`] asks a [`DependencyResolver`] for the dependents of
//!   each root, then of each newly discovered entity, until nothing new shows up
//! - [`DependencyGraph::build`] turns that closure into per-entity blockers
//! - [`scheduler::schedule`] peels off blocker-free entities round by round
//!
//! [`plan`] chains the three.

pub mod closure;
pub mod config;
pub mod dependent_builder;
pub mod error;
pub mod graph;
pub mod queries;
pub mod resolver;
pub mod scheduler;
pub mod script_builder;

use tokio_util::sync::CancellationToken;
use tracing::info;

pub use closure::{expand, Closure, ExpandOptions};
pub use error::{CycleError, Error, ExpandError, ResolutionError, Result};
pub use graph::DependencyGraph;
pub use resolver::{resolve, DependencyResolver, DependentSet};
pub use scheduler::{schedule, DropOrder};

#[derive(Debug, Clone)]
pub struct DropPlan {
    pub closure: Closure,
    pub order: DropOrder,
}

pub async fn plan<R, I, S>(
    resolver: &R,
    roots: I,
    options: &ExpandOptions,
    cancel: &CancellationToken,
) -> Result<DropPlan>
where
    R: DependencyResolver + ?Sized,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let closure = expand(resolver, roots, options, cancel).await?;
    let order = DependencyGraph::build(&closure).schedule()?;
    info!(entities = order.len(), rounds = order.rounds(), "drop order computed");

    return Ok(DropPlan { closure, order });
}
