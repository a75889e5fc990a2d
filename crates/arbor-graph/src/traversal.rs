//! Traversal utilities
//!
//! Pure functions over an already-fetched node set. None of them fail: a broken
//! link ends the walk and the partial result collected so far is returned. Under
//! the store's invariants broken links do not occur, so meeting one is logged.

use crate::ids::NodeId;
use crate::model::Node;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Fetched node set keyed by id
pub type NodeIndex = HashMap<NodeId, Node>;

/// Read access to nodes by id
pub trait NodeLookup {
    /// Resolve a node id
    fn lookup(&self, id: NodeId) -> Option<&Node>;
}

impl NodeLookup for HashMap<NodeId, Node> {
    #[inline]
    fn lookup(&self, id: NodeId) -> Option<&Node> {
        self.get(&id)
    }
}

/// Nodes from `id` up to its root-like ancestor, ordered root-to-leaf
///
/// Empty when `id` itself does not resolve.
pub fn path_to_root<L: NodeLookup + ?Sized>(id: NodeId, index: &L) -> Vec<&Node> {
    let mut path = Vec::new();
    let mut seen = HashSet::new();
    let mut current = Some(id);

    while let Some(cursor) = current {
        if !seen.insert(cursor) {
            tracing::warn!(node = %cursor, "parent cycle while walking to root");
            break;
        }
        let Some(node) = index.lookup(cursor) else {
            if cursor != id {
                tracing::warn!(node = %cursor, "broken parent link while walking to root");
            }
            break;
        };
        path.push(node);
        current = node.parent_id;
    }

    path.reverse();
    path
}

/// Number of parent hops above `node`; 0 for a root-like node
///
/// The hop to an unresolvable parent still counts; the walk stops there.
#[must_use]
pub fn depth<L: NodeLookup + ?Sized>(node: &Node, index: &L) -> usize {
    let mut depth = 0;
    let mut seen = HashSet::from([node.id]);
    let mut current = node.parent_id;

    while let Some(parent_id) = current {
        if !seen.insert(parent_id) {
            tracing::warn!(node = %parent_id, "parent cycle while measuring depth");
            break;
        }
        depth += 1;
        let Some(parent) = index.lookup(parent_id) else {
            break;
        };
        current = parent.parent_id;
    }

    depth
}

/// Closest node that is an ancestor-or-self of both `a` and `b`
///
/// Nodes in disjoint lineages (e.g. separate standalone explorations) yield `None`.
pub fn common_ancestor<'a, L: NodeLookup + ?Sized>(
    a: &Node,
    b: &Node,
    index: &'a L,
) -> Option<&'a Node> {
    let mut ancestors_a = HashSet::new();
    let mut current = Some(a.id);
    while let Some(id) = current {
        if !ancestors_a.insert(id) {
            break;
        }
        current = index.lookup(id).and_then(|n| n.parent_id);
    }

    let mut seen = HashSet::new();
    let mut current = Some(b.id);
    while let Some(id) = current {
        if ancestors_a.contains(&id) {
            return index.lookup(id);
        }
        if !seen.insert(id) {
            break;
        }
        current = index.lookup(id).and_then(|n| n.parent_id);
    }

    None
}

/// Every path from `start` down to each leaf of its subtree, depth-first in `child_ids` order
///
/// Only nodes with empty `child_ids` end a path; a node whose children all fail
/// to resolve contributes no path.
pub fn leaf_paths<L: NodeLookup + ?Sized>(start: NodeId, index: &L) -> Vec<Vec<&Node>> {
    let mut paths = Vec::new();
    let Some(root) = index.lookup(start) else {
        return paths;
    };

    let mut stack: Vec<(&Node, usize)> = vec![(root, 0)];
    let mut path: Vec<&Node> = Vec::new();

    while let Some((node, level)) = stack.pop() {
        path.truncate(level);
        if path.iter().any(|n| n.id == node.id) {
            tracing::warn!(node = %node.id, "child cycle while enumerating branches");
            continue;
        }
        path.push(node);

        if node.child_ids.is_empty() {
            paths.push(path.clone());
            continue;
        }

        for child in node.child_ids.iter().rev().filter_map(|id| index.lookup(*id)) {
            stack.push((child, level + 1));
        }
    }

    paths
}

/// Kind of edge in a flattened vault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// parent → child
    Child,
    /// merge source → merge node
    Merge,
}

/// Directed edge between two nodes of a vault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Edge origin
    pub source: NodeId,
    /// Edge destination
    pub target: NodeId,
    /// Edge kind
    pub kind: EdgeKind,
}

/// A vault flattened into nodes and an explicit edge list, for layout collaborators
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchStructure {
    /// All nodes of the vault
    pub nodes: Vec<Node>,
    /// Parent→child and source→merge edges; no duplicates, no dangling endpoints
    pub edges: Vec<Edge>,
}

/// Flatten nodes into a [`BranchStructure`]
#[must_use]
pub fn structure(nodes: Vec<Node>) -> BranchStructure {
    let ids: HashSet<NodeId> = nodes.iter().map(|n| n.id).collect();
    let mut seen = HashSet::new();
    let mut edges = Vec::new();

    for node in &nodes {
        for child in &node.child_ids {
            let edge = Edge {
                source: node.id,
                target: *child,
                kind: EdgeKind::Child,
            };
            if ids.contains(child) && seen.insert(edge) {
                edges.push(edge);
            }
        }
        for source in &node.merged_from_ids {
            let edge = Edge {
                source: *source,
                target: node.id,
                kind: EdgeKind::Merge,
            };
            if ids.contains(source) && seen.insert(edge) {
                edges.push(edge);
            }
        }
    }

    BranchStructure { nodes, edges }
}

/// Prompt (or response when the prompt is empty) cut to at most `max_len` chars
///
/// A cut ends in `...` when there is room for it.
#[must_use]
pub fn summarize_content(node: &Node, max_len: usize) -> String {
    let content = if node.prompt.is_empty() {
        &node.response
    } else {
        &node.prompt
    };

    if content.chars().count() <= max_len {
        return content.clone();
    }

    if max_len < 3 {
        return content.chars().take(max_len).collect();
    }

    let mut out: String = content.chars().take(max_len - 3).collect();
    out.push_str("...");
    out
}

/// Display name for the `index`-th branch ending at `node`
#[must_use]
pub fn branch_name(node: &Node, index: usize) -> String {
    format!("Branch {}: {}", index + 1, summarize_content(node, 30))
}
