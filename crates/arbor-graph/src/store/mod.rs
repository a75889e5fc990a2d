//! Graph store
//!
//! Owns vault and node records and exposes atomic mutation primitives. Every
//! mutation runs inside [`GraphStore::transaction`]: the closure stages its writes
//! against a read-through view and the write set is committed under a single
//! write lock only when the closure returns `Ok`. Readers take the read lock and
//! can never see a child list that disagrees with a parent pointer.

mod delete;
mod nodes;
pub(crate) mod txn;

use crate::error::{GraphError, Result};
use crate::ids::{NodeId, VaultId};
use crate::model::{Node, Vault, VaultPatch};
use crate::snapshot;
use crate::traversal::{self, BranchStructure, NodeIndex};
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use txn::{Tables, Txn};

/// Store configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Snapshot file; `None` keeps the store purely in memory
    pub snapshot_path: Option<PathBuf>,
}

impl StoreConfig {
    /// Create in-memory configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With snapshot file
    #[inline]
    #[must_use]
    pub fn with_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }
}

/// Transactional store of vaults and nodes
#[derive(Debug)]
pub struct GraphStore {
    tables: RwLock<Tables>,
    config: StoreConfig,
}

impl GraphStore {
    /// Create empty in-memory store
    #[inline]
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            config: StoreConfig::default(),
        }
    }

    /// Open a store, loading its snapshot when one exists
    ///
    /// # Errors
    /// - `GraphError::Persistence` / `GraphError::Serialization` if the snapshot is unreadable
    pub fn open(config: StoreConfig) -> Result<Self> {
        let tables = match &config.snapshot_path {
            Some(path) => snapshot::read(path)?.unwrap_or_default(),
            None => Tables::default(),
        };
        tracing::info!(
            snapshot = ?config.snapshot_path,
            vaults = tables.vaults.len(),
            nodes = tables.nodes.len(),
            "opened graph store"
        );
        Ok(Self {
            tables: RwLock::new(tables),
            config,
        })
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Run `f` as one all-or-nothing transaction
    ///
    /// With a snapshot configured the post-commit state is persisted before it
    /// becomes visible; a failed write leaves memory and disk unchanged.
    pub(crate) fn transaction<T>(&self, f: impl FnOnce(&mut Txn<'_>) -> Result<T>) -> Result<T> {
        let mut guard = self.tables.write();
        let (value, writes) = {
            let mut txn = Txn::new(&guard);
            let value = f(&mut txn)?;
            (value, txn.into_writes())
        };

        if writes.is_empty() {
            return Ok(value);
        }

        match &self.config.snapshot_path {
            None => guard.apply(writes),
            Some(path) => {
                let mut next = guard.clone();
                next.apply(writes);
                snapshot::write(path, &next)?;
                *guard = next;
            }
        }
        Ok(value)
    }

    /// Create a vault with no root
    ///
    /// # Errors
    /// - `GraphError::Persistence` if the snapshot cannot be written
    pub fn create_vault(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Vault> {
        let vault = Vault::new(name.into(), description.into());
        self.transaction(|tx| {
            tx.put_vault(vault.clone());
            Ok(())
        })?;
        tracing::info!(vault = %vault.id, name = %vault.name, "created vault");
        Ok(vault)
    }

    /// Get vault by id
    ///
    /// # Errors
    /// - `GraphError::VaultNotFound`
    pub fn get_vault(&self, id: VaultId) -> Result<Vault> {
        self.tables
            .read()
            .vaults
            .get(&id)
            .cloned()
            .ok_or(GraphError::VaultNotFound(id))
    }

    /// All vaults, most recently updated first
    #[must_use]
    pub fn list_vaults(&self) -> Vec<Vault> {
        let mut vaults: Vec<Vault> = self.tables.read().vaults.values().cloned().collect();
        vaults.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        vaults
    }

    /// Rename or re-describe a vault
    ///
    /// # Errors
    /// - `GraphError::VaultNotFound`
    pub fn update_vault(&self, id: VaultId, patch: VaultPatch) -> Result<Vault> {
        self.transaction(|tx| {
            let vault = tx.vault_mut(id)?;
            if let Some(name) = patch.name {
                vault.name = name;
            }
            if let Some(description) = patch.description {
                vault.description = description;
            }
            vault.updated_at = Utc::now();
            Ok(vault.clone())
        })
    }

    /// Delete a vault together with every node it owns
    ///
    /// Idempotent: returns `Ok(false)` when the vault was already absent.
    ///
    /// # Errors
    /// - `GraphError::Persistence` if the snapshot cannot be written
    pub fn delete_vault(&self, id: VaultId) -> Result<bool> {
        let removed = self.transaction(|tx| {
            if tx.vault(id).is_none() {
                return Ok(None);
            }
            let ids = tx.node_ids_in_vault(id);
            for node_id in &ids {
                tx.remove_node(*node_id);
            }
            tx.remove_vault(id);
            Ok(Some(ids.len()))
        })?;

        match removed {
            Some(count) => {
                tracing::info!(vault = %id, nodes = count, "deleted vault");
                Ok(true)
            }
            None => {
                tracing::debug!(vault = %id, "delete of absent vault ignored");
                Ok(false)
            }
        }
    }

    /// Get node by id
    ///
    /// # Errors
    /// - `GraphError::NodeNotFound`
    pub fn get_node(&self, id: NodeId) -> Result<Node> {
        self.tables
            .read()
            .nodes
            .get(&id)
            .cloned()
            .ok_or(GraphError::NodeNotFound(id))
    }

    /// Nodes of a vault in creation order
    ///
    /// # Errors
    /// - `GraphError::VaultNotFound`
    pub fn nodes_in_vault(&self, vault_id: VaultId) -> Result<Vec<Node>> {
        let tables = self.tables.read();
        if !tables.vaults.contains_key(&vault_id) {
            return Err(GraphError::VaultNotFound(vault_id));
        }
        Ok(tables
            .node_ids_in_vault(vault_id)
            .filter_map(|id| tables.nodes.get(&id).cloned())
            .collect())
    }

    /// Fetched node set of a vault, for the pure traversal functions
    ///
    /// # Errors
    /// - `GraphError::VaultNotFound`
    pub fn vault_index(&self, vault_id: VaultId) -> Result<NodeIndex> {
        Ok(self
            .nodes_in_vault(vault_id)?
            .into_iter()
            .map(|n| (n.id, n))
            .collect())
    }

    /// Children of a node in `child_ids` order
    ///
    /// # Errors
    /// - `GraphError::NodeNotFound` if the node itself is absent
    pub fn children(&self, id: NodeId) -> Result<Vec<Node>> {
        let tables = self.tables.read();
        let node = tables.nodes.get(&id).ok_or(GraphError::NodeNotFound(id))?;
        Ok(node
            .child_ids
            .iter()
            .filter_map(|c| tables.nodes.get(c).cloned())
            .collect())
    }

    /// Root-to-node path; partial on a broken link, empty if `id` is absent
    #[must_use]
    pub fn node_path(&self, id: NodeId) -> Vec<Node> {
        let tables = self.tables.read();
        traversal::path_to_root(id, &tables.nodes)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Every root-to-leaf path below `id` (each path starts at `id`)
    #[must_use]
    pub fn leaf_paths(&self, id: NodeId) -> Vec<Vec<Node>> {
        let tables = self.tables.read();
        traversal::leaf_paths(id, &tables.nodes)
            .into_iter()
            .map(|path| path.into_iter().cloned().collect())
            .collect()
    }

    /// Flatten a vault into nodes plus child and merge edges
    ///
    /// # Errors
    /// - `GraphError::VaultNotFound`
    pub fn vault_structure(&self, vault_id: VaultId) -> Result<BranchStructure> {
        Ok(traversal::structure(self.nodes_in_vault(vault_id)?))
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::in_memory()
    }
}
