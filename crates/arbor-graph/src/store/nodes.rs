//! Node creation: ordinary turns, branches and merge nodes

use super::GraphStore;
use crate::error::{GraphError, Result};
use crate::ids::{NodeId, VaultId};
use crate::model::{Node, Turn};
use chrono::Utc;
use std::collections::HashSet;

impl GraphStore {
    /// Create a node under `parent`, or a root-like node when `parent` is `None`
    ///
    /// A root-like node becomes the vault root only if the vault has none yet;
    /// later ones are standalone explorations and never replace it.
    ///
    /// # Errors
    /// - `GraphError::VaultNotFound`
    /// - `GraphError::DanglingReference` if `parent` is absent or lives in another vault
    pub fn create_node(&self, vault_id: VaultId, parent: Option<NodeId>, turn: Turn) -> Result<Node> {
        let now = Utc::now();
        let node = Node::new(vault_id, parent, turn, now);

        let became_root = self.transaction(|tx| {
            if tx.vault(vault_id).is_none() {
                return Err(GraphError::VaultNotFound(vault_id));
            }

            let mut became_root = false;
            match parent {
                Some(parent_id) => {
                    let parent_node = tx
                        .node_mut(parent_id)
                        .map_err(|_| GraphError::dangling_parent(parent_id))?;
                    if parent_node.vault_id != vault_id {
                        return Err(GraphError::dangling_parent(parent_id));
                    }
                    parent_node.child_ids.push(node.id);
                }
                None => {
                    let vault = tx.vault_mut(vault_id)?;
                    if vault.root_node_id.is_none() {
                        vault.root_node_id = Some(node.id);
                        became_root = true;
                    }
                }
            }

            tx.vault_mut(vault_id)?.updated_at = now;
            tx.put_node(node.clone());
            Ok(became_root)
        })?;

        tracing::info!(
            vault = %vault_id,
            node = %node.id,
            parent = ?parent,
            root = became_root,
            "created node"
        );
        Ok(node)
    }

    /// Create a child of `source` in the source's own vault
    ///
    /// # Errors
    /// - `GraphError::NodeNotFound` if `source` is absent
    pub fn create_branch(&self, source: NodeId, turn: Turn) -> Result<Node> {
        let vault_id = self.get_node(source)?.vault_id;
        self.create_node(vault_id, Some(source), turn)
    }

    /// Create a merge node synthesizing `sources`
    ///
    /// The node has no parent, never becomes the vault root and leaves the
    /// sources' `child_ids` untouched. Duplicate sources are collapsed,
    /// keeping first occurrence order.
    ///
    /// # Errors
    /// - `GraphError::VaultNotFound`
    /// - `GraphError::InvalidInput` if `sources` is empty
    /// - `GraphError::DanglingReference` if a source is absent or lives in another vault
    pub fn create_merge_node(&self, vault_id: VaultId, sources: &[NodeId], turn: Turn) -> Result<Node> {
        if sources.is_empty() {
            return Err(GraphError::InvalidInput(
                "merge node needs at least one source".into(),
            ));
        }

        let mut seen = HashSet::new();
        let merged_from: Vec<NodeId> = sources.iter().copied().filter(|id| seen.insert(*id)).collect();

        let now = Utc::now();
        let mut node = Node::new(vault_id, None, turn, now);
        node.merged_from_ids = merged_from;

        self.transaction(|tx| {
            if tx.vault(vault_id).is_none() {
                return Err(GraphError::VaultNotFound(vault_id));
            }
            for source in &node.merged_from_ids {
                match tx.node(*source) {
                    Some(found) if found.vault_id == vault_id => {}
                    _ => return Err(GraphError::dangling_source(*source)),
                }
            }
            tx.vault_mut(vault_id)?.updated_at = now;
            tx.put_node(node.clone());
            Ok(())
        })?;

        tracing::info!(
            vault = %vault_id,
            node = %node.id,
            sources = node.merged_from_ids.len(),
            "created merge node"
        );
        Ok(node)
    }
}
