use thiserror::Error;

use crate::planner::Explanation;

/// Errors returned by [`Planner::resolve`](crate::Planner::resolve)
#[derive(Error, Debug, Clone)]
pub enum ResolutionError {
    /// The request contradicts itself or references malformed data; nothing
    /// was sent to the solver
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No consistent set of units exists
    #[error("Cannot satisfy the request:\n{0}")]
    Unsatisfiable(Explanation),

    /// The solver budget ran out before any solution was found
    #[error("Resolution timed out after {conflicts} conflicts")]
    Timeout { conflicts: u64 },

    #[error("Resolution was cancelled")]
    Cancelled,

    /// The solver returned an assignment that breaks a model invariant
    #[error("Internal inconsistency: {0}")]
    InternalInconsistency(String),
}

impl ResolutionError {
    /// Unsatisfiable and timeout outcomes may succeed with a relaxed request
    /// or a larger budget
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ResolutionError::Unsatisfiable(_) | ResolutionError::Timeout { .. }
        )
    }
}

/// Errors raised while loading planner configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for \"{key}\": {reason}")]
    InvalidValue { key: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ResolutionError>;
