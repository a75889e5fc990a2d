//! Structural invariant checks over a whole store

use arbor_graph::{GraphStore, Node, NodeId};
use std::collections::HashMap;

/// Every invariant violation in `store`, one message each; empty when consistent
pub fn graph_violations(store: &GraphStore) -> Vec<String> {
    let mut violations = Vec::new();

    for vault in store.list_vaults() {
        let nodes: HashMap<NodeId, Node> = match store.vault_index(vault.id) {
            Ok(index) => index,
            Err(e) => {
                violations.push(format!("vault {} unreadable: {e}", vault.id));
                continue;
            }
        };

        if let Some(root) = vault.root_node_id {
            match nodes.get(&root) {
                None => violations.push(format!("vault {} root {root} missing", vault.id)),
                Some(node) if node.parent_id.is_some() || node.is_merge() => {
                    violations.push(format!("vault {} root {root} is not a plain root", vault.id));
                }
                Some(_) => {}
            }
        }

        for node in nodes.values() {
            if node.vault_id != vault.id {
                violations.push(format!("node {} indexed under foreign vault", node.id));
            }
            if node.is_merge() && node.parent_id.is_some() {
                violations.push(format!("merge node {} has a parent", node.id));
            }

            if let Some(parent_id) = node.parent_id {
                match nodes.get(&parent_id) {
                    None => violations.push(format!("node {} parent {parent_id} missing", node.id)),
                    Some(parent) => {
                        let listed = parent.child_ids.iter().filter(|c| **c == node.id).count();
                        if listed != 1 {
                            violations.push(format!(
                                "node {} listed {listed} times by parent {parent_id}",
                                node.id
                            ));
                        }
                    }
                }
            }

            for child_id in &node.child_ids {
                match nodes.get(child_id) {
                    None => violations.push(format!("node {} child {child_id} missing", node.id)),
                    Some(child) if child.parent_id != Some(node.id) => violations.push(format!(
                        "node {} lists {child_id} whose parent is {:?}",
                        node.id, child.parent_id
                    )),
                    Some(_) => {}
                }
            }

            for source in &node.merged_from_ids {
                if !nodes.contains_key(source) {
                    violations.push(format!("merge node {} source {source} missing", node.id));
                }
            }
        }
    }

    violations
}

/// Panic with every violation when `store` breaks a structural invariant
#[track_caller]
pub fn assert_graph_consistent(store: &GraphStore) {
    let violations = graph_violations(store);
    assert!(violations.is_empty(), "graph invariants violated:\n{}", violations.join("\n"));
}
