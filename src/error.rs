use std::path::PathBuf;

/// A dependency query for a single entity could not be answered.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("dependency query for '{name}' failed: {source}")]
    Query {
        name: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("dependency query for '{0}' timed out")]
    Timeout(String),

    /// Failure reported by a non-Postgres backend.
    #[error("backend error resolving '{name}': {message}")]
    Backend { name: String, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ExpandError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("expansion cancelled")]
    Cancelled,

    #[error("dependency closure exceeds {limit} entities")]
    LimitExceeded { limit: usize },
}

/// The remaining entities could not be ordered because every one of them is
/// still blocked by another.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("dependency cycle among {} entities: {}", .remaining.len(), .remaining.join(", "))]
pub struct CycleError {
    pub remaining: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Expand(#[from] ExpandError),

    #[error(transparent)]
    Cycle(#[from] CycleError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
