//! Error types for the application session

use arbor_graph::GraphError;
use arbor_merge::{CompletionError, MergeError};

/// Result alias used throughout the session crate
pub type Result<T> = std::result::Result<T, SessionError>;

/// Session error
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The operation needs a current vault
    #[error("no vault selected")]
    NoVaultSelected,

    /// No completion client was injected
    #[error("completion client not configured")]
    CompletionUnavailable,

    /// A merge was requested with nothing selected
    #[error("no nodes selected for merge")]
    EmptyMergeSelection,

    /// Graph store failure
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// Merge failure
    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),

    /// Completion call failed or was cancelled
    #[error(transparent)]
    Completion(#[from] CompletionError),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(String),
}

impl SessionError {
    /// Check if the operation stopped because it was cancelled
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Completion(e) => *e == CompletionError::Cancelled,
            Self::Merge(e) => e.is_cancelled(),
            _ => false,
        }
    }

    /// Check if the error reports a missing vault or node
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Graph(e) if e.is_not_found())
    }
}
