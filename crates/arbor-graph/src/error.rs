//! Error types for the graph store

use crate::ids::{NodeId, VaultId};

/// Result alias used throughout the graph crate
pub type Result<T> = std::result::Result<T, GraphError>;

/// Graph store error
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Referenced vault is absent
    #[error("vault not found: {0}")]
    VaultNotFound(VaultId),

    /// Referenced node is absent
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// A mutation references a parent or merge source that does not resolve
    #[error("dangling reference in {field}: {id}")]
    DanglingReference {
        /// Field carrying the reference (`parent_id`, `merged_from_ids`)
        field: &'static str,
        /// The unresolved node id
        id: NodeId,
    },

    /// Caller supplied arguments the store cannot act on
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Snapshot file could not be read or written
    #[error("snapshot i/o failed: {0}")]
    Persistence(#[from] std::io::Error),

    /// Snapshot file could not be encoded or decoded
    #[error("snapshot encoding failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GraphError {
    /// Check if the error reports a missing vault or node
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::VaultNotFound(_) | Self::NodeNotFound(_))
    }

    #[inline]
    pub(crate) fn dangling_parent(id: NodeId) -> Self {
        Self::DanglingReference {
            field: "parent_id",
            id,
        }
    }

    #[inline]
    pub(crate) fn dangling_source(id: NodeId) -> Self {
        Self::DanglingReference {
            field: "merged_from_ids",
            id,
        }
    }
}
