//! Staged store transaction
//!
//! A [`Txn`] reads through its own write set to the committed tables and stages
//! every write. Nothing reaches the tables unless the whole closure succeeds, so
//! readers never observe a half-applied mutation.

use crate::error::{GraphError, Result};
use crate::ids::{NodeId, VaultId};
use crate::model::{Node, Vault};
use std::collections::{BTreeSet, HashMap};

/// Committed records plus the `vault_id → node ids` secondary index
#[derive(Debug, Clone, Default)]
pub(crate) struct Tables {
    pub(crate) vaults: HashMap<VaultId, Vault>,
    pub(crate) nodes: HashMap<NodeId, Node>,
    by_vault: HashMap<VaultId, BTreeSet<NodeId>>,
}

impl Tables {
    pub(crate) fn from_records(vaults: Vec<Vault>, nodes: Vec<Node>) -> Self {
        let mut tables = Self::default();
        for vault in vaults {
            tables.vaults.insert(vault.id, vault);
        }
        for node in nodes {
            tables
                .by_vault
                .entry(node.vault_id)
                .or_default()
                .insert(node.id);
            tables.nodes.insert(node.id, node);
        }
        tables
    }

    /// Node ids of a vault in creation order
    pub(crate) fn node_ids_in_vault(&self, vault_id: VaultId) -> impl Iterator<Item = NodeId> + '_ {
        self.by_vault
            .get(&vault_id)
            .into_iter()
            .flat_map(|ids| ids.iter().copied())
    }

    pub(crate) fn apply(&mut self, writes: WriteSet) {
        for (id, staged) in writes.nodes {
            match staged {
                Some(node) => {
                    self.by_vault.entry(node.vault_id).or_default().insert(id);
                    self.nodes.insert(id, node);
                }
                None => {
                    if let Some(old) = self.nodes.remove(&id) {
                        if let Some(ids) = self.by_vault.get_mut(&old.vault_id) {
                            ids.remove(&id);
                        }
                    }
                }
            }
        }
        for (id, staged) in writes.vaults {
            match staged {
                Some(vault) => {
                    self.vaults.insert(id, vault);
                }
                None => {
                    self.vaults.remove(&id);
                    self.by_vault.remove(&id);
                }
            }
        }
    }
}

/// Staged writes; `None` marks a deletion
#[derive(Debug, Default)]
pub(crate) struct WriteSet {
    vaults: HashMap<VaultId, Option<Vault>>,
    nodes: HashMap<NodeId, Option<Node>>,
}

impl WriteSet {
    pub(crate) fn is_empty(&self) -> bool {
        self.vaults.is_empty() && self.nodes.is_empty()
    }
}

/// One logical transaction over the vault and node collections
#[derive(Debug)]
pub(crate) struct Txn<'a> {
    base: &'a Tables,
    writes: WriteSet,
}

impl<'a> Txn<'a> {
    pub(crate) fn new(base: &'a Tables) -> Self {
        Self {
            base,
            writes: WriteSet::default(),
        }
    }

    pub(crate) fn vault(&self, id: VaultId) -> Option<&Vault> {
        match self.writes.vaults.get(&id) {
            Some(staged) => staged.as_ref(),
            None => self.base.vaults.get(&id),
        }
    }

    pub(crate) fn node(&self, id: NodeId) -> Option<&Node> {
        match self.writes.nodes.get(&id) {
            Some(staged) => staged.as_ref(),
            None => self.base.nodes.get(&id),
        }
    }

    pub(crate) fn vault_mut(&mut self, id: VaultId) -> Result<&mut Vault> {
        if !self.writes.vaults.contains_key(&id) {
            let current = self
                .base
                .vaults
                .get(&id)
                .cloned()
                .ok_or(GraphError::VaultNotFound(id))?;
            self.writes.vaults.insert(id, Some(current));
        }
        self.writes
            .vaults
            .get_mut(&id)
            .and_then(Option::as_mut)
            .ok_or(GraphError::VaultNotFound(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        if !self.writes.nodes.contains_key(&id) {
            let current = self
                .base
                .nodes
                .get(&id)
                .cloned()
                .ok_or(GraphError::NodeNotFound(id))?;
            self.writes.nodes.insert(id, Some(current));
        }
        self.writes
            .nodes
            .get_mut(&id)
            .and_then(Option::as_mut)
            .ok_or(GraphError::NodeNotFound(id))
    }

    pub(crate) fn put_vault(&mut self, vault: Vault) {
        self.writes.vaults.insert(vault.id, Some(vault));
    }

    pub(crate) fn put_node(&mut self, node: Node) {
        self.writes.nodes.insert(node.id, Some(node));
    }

    pub(crate) fn remove_vault(&mut self, id: VaultId) {
        self.writes.vaults.insert(id, None);
    }

    pub(crate) fn remove_node(&mut self, id: NodeId) {
        self.writes.nodes.insert(id, None);
    }

    /// Node ids of a vault as seen by this transaction, in creation order
    pub(crate) fn node_ids_in_vault(&self, vault_id: VaultId) -> Vec<NodeId> {
        let mut ids: BTreeSet<NodeId> = self.base.node_ids_in_vault(vault_id).collect();
        for (id, staged) in &self.writes.nodes {
            match staged {
                Some(node) if node.vault_id == vault_id => {
                    ids.insert(*id);
                }
                Some(_) => {}
                None => {
                    ids.remove(id);
                }
            }
        }
        ids.into_iter().collect()
    }

    pub(crate) fn into_writes(self) -> WriteSet {
        self.writes
    }
}
