//! Node deletion
//!
//! Two policies: cascade (the node and its whole `child_ids` subtree) and
//! splice (the node alone, its children re-parented onto its former parent).
//! Both purge the removed ids from every surviving `merged_from_ids` list, so
//! merge nodes outlive their sources with a shrunken source set.

use super::txn::Txn;
use super::GraphStore;
use crate::error::{GraphError, Result};
use crate::ids::{NodeId, VaultId};
use crate::model::{CascadeDeletion, SpliceDeletion};
use chrono::Utc;
use std::collections::HashSet;

impl GraphStore {
    /// Delete a node and every descendant reachable through `child_ids`
    ///
    /// # Errors
    /// - `GraphError::NodeNotFound`
    pub fn delete_node_cascade(&self, id: NodeId) -> Result<CascadeDeletion> {
        let (vault_id, outcome) = self.transaction(|tx| {
            let target = tx.node(id).cloned().ok_or(GraphError::NodeNotFound(id))?;
            let deleted_ids = collect_subtree(tx, id);
            let deleted: HashSet<NodeId> = deleted_ids.iter().copied().collect();

            if let Some(parent_id) = target.parent_id {
                if let Ok(parent) = tx.node_mut(parent_id) {
                    parent.child_ids.retain(|c| *c != id);
                }
            }

            if let Ok(vault) = tx.vault_mut(target.vault_id) {
                if vault.root_node_id.is_some_and(|root| deleted.contains(&root)) {
                    vault.root_node_id = None;
                }
                vault.updated_at = Utc::now();
            }

            prune_merge_sources(tx, target.vault_id, &deleted);

            for node_id in &deleted_ids {
                tx.remove_node(*node_id);
            }

            Ok((
                target.vault_id,
                CascadeDeletion {
                    deleted_ids,
                    new_current: target.parent_id,
                },
            ))
        })?;

        tracing::info!(
            vault = %vault_id,
            node = %id,
            deleted = outcome.deleted_ids.len(),
            "cascade-deleted node"
        );
        Ok(outcome)
    }

    /// Delete exactly one node, splicing its children onto its former parent
    ///
    /// Promoted children are appended after the parent's remaining children,
    /// keeping their relative order. A deleted root hands the root to its only
    /// child; with zero or several children the vault root is cleared.
    ///
    /// # Errors
    /// - `GraphError::NodeNotFound`
    pub fn delete_node_preserve_children(&self, id: NodeId) -> Result<SpliceDeletion> {
        let (vault_id, promoted_count, outcome) = self.transaction(|tx| {
            let target = tx.node(id).cloned().ok_or(GraphError::NodeNotFound(id))?;
            let parent = target.parent_id.filter(|p| tx.node(*p).is_some());

            let promoted: Vec<NodeId> = target
                .child_ids
                .iter()
                .copied()
                .filter(|c| *c != id && tx.node(*c).is_some())
                .collect();
            for child in &promoted {
                tx.node_mut(*child)?.parent_id = parent;
            }

            if let Some(parent_id) = parent {
                let parent_node = tx.node_mut(parent_id)?;
                parent_node.child_ids.retain(|c| *c != id);
                parent_node.child_ids.extend(promoted.iter().copied());
            }

            if let Ok(vault) = tx.vault_mut(target.vault_id) {
                if vault.root_node_id == Some(id) {
                    vault.root_node_id = match promoted.as_slice() {
                        [only] => Some(*only),
                        _ => None,
                    };
                }
                vault.updated_at = Utc::now();
            }

            prune_merge_sources(tx, target.vault_id, &HashSet::from([id]));
            tx.remove_node(id);

            Ok((
                target.vault_id,
                promoted.len(),
                SpliceDeletion {
                    deleted_id: id,
                    new_current: parent.or_else(|| promoted.first().copied()),
                },
            ))
        })?;

        tracing::info!(
            vault = %vault_id,
            node = %id,
            promoted = promoted_count,
            "splice-deleted node"
        );
        Ok(outcome)
    }
}

/// Pre-order ids of `id` and its descendants, each at most once
fn collect_subtree(tx: &Txn<'_>, id: NodeId) -> Vec<NodeId> {
    let mut ordered = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![id];

    while let Some(current) = stack.pop() {
        if !seen.insert(current) {
            continue;
        }
        let Some(node) = tx.node(current) else {
            continue;
        };
        ordered.push(current);
        stack.extend(node.child_ids.iter().rev().copied());
    }

    ordered
}

/// Drop `deleted` ids from the `merged_from_ids` of surviving nodes
fn prune_merge_sources(tx: &mut Txn<'_>, vault_id: VaultId, deleted: &HashSet<NodeId>) {
    let affected: Vec<NodeId> = tx
        .node_ids_in_vault(vault_id)
        .into_iter()
        .filter(|id| !deleted.contains(id))
        .filter(|id| {
            tx.node(*id)
                .is_some_and(|n| n.merged_from_ids.iter().any(|s| deleted.contains(s)))
        })
        .collect();

    for id in affected {
        if let Ok(node) = tx.node_mut(id) {
            node.merged_from_ids.retain(|s| !deleted.contains(s));
            tracing::debug!(node = %id, remaining = node.merged_from_ids.len(), "pruned merge sources");
        }
    }
}
