//! Vault and node records
//!
//! Nodes live in an arena keyed by [`NodeId`]; `child_ids` and `merged_from_ids`
//! are plain id lists into that arena. Link integrity is kept by the store's
//! mutation operations, never by ownership.

use crate::ids::{NodeId, VaultId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named collection of conversation nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    /// Vault identifier
    pub id: VaultId,
    /// Display name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Start of the primary lineage, if any
    pub root_node_id: Option<NodeId>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last time the vault or any of its nodes changed
    pub updated_at: DateTime<Utc>,
}

impl Vault {
    pub(crate) fn new(name: String, description: String) -> Self {
        let now = Utc::now();
        Self {
            id: VaultId::new(),
            name,
            description,
            root_node_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the vault has a primary root
    #[inline]
    #[must_use]
    pub fn has_root(&self) -> bool {
        self.root_node_id.is_some()
    }
}

/// One conversational turn: a prompt and its response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Node identifier
    pub id: NodeId,
    /// Owning vault (immutable)
    pub vault_id: VaultId,
    /// Single logical parent; `None` for root-like, standalone and merge nodes
    pub parent_id: Option<NodeId>,
    /// User prompt
    pub prompt: String,
    /// Model response
    pub response: String,
    /// Identifier of the completion model that produced `response`
    pub model: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Ordered children (inverse of `parent_id`)
    pub child_ids: Vec<NodeId>,
    /// Nodes this node synthesizes; non-empty marks a merge node
    pub merged_from_ids: Vec<NodeId>,
}

impl Node {
    pub(crate) fn new(
        vault_id: VaultId,
        parent_id: Option<NodeId>,
        turn: Turn,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NodeId::new(),
            vault_id,
            parent_id,
            prompt: turn.prompt,
            response: turn.response,
            model: turn.model,
            created_at,
            child_ids: Vec::new(),
            merged_from_ids: Vec::new(),
        }
    }

    /// Check if this node synthesizes other nodes
    #[inline]
    #[must_use]
    pub fn is_merge(&self) -> bool {
        !self.merged_from_ids.is_empty()
    }

    /// Check if this node has no logical parent
    #[inline]
    #[must_use]
    pub fn is_root_like(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Check if this node has no children
    #[inline]
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.child_ids.is_empty()
    }
}

/// Content of a turn about to be stored
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Turn {
    /// User prompt
    pub prompt: String,
    /// Model response
    pub response: String,
    /// Model identifier
    pub model: String,
}

impl Turn {
    /// Create new turn
    #[inline]
    #[must_use]
    pub fn new(
        prompt: impl Into<String>,
        response: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            response: response.into(),
            model: model.into(),
        }
    }
}

/// Partial update of a vault's descriptive fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VaultPatch {
    /// New name
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
}

impl VaultPatch {
    /// With new name
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// With new description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Outcome of a cascading delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeDeletion {
    /// Every removed id, in pre-order starting with the target
    pub deleted_ids: Vec<NodeId>,
    /// Suggested cursor: the target's former parent
    pub new_current: Option<NodeId>,
}

impl CascadeDeletion {
    /// Check if `id` was removed
    #[inline]
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.deleted_ids.contains(&id)
    }
}

/// Outcome of a delete that splices the node's children onto its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpliceDeletion {
    /// The removed id
    pub deleted_id: NodeId,
    /// Suggested cursor: former parent, else first promoted child
    pub new_current: Option<NodeId>,
}
