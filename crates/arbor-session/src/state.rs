//! Session state and the snapshots handed to callers

use arbor_graph::{Node, NodeId, Vault};

/// Current vault, current node and its root-to-node path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    /// Selected vault
    pub vault: Option<Vault>,
    /// Selected node
    pub node: Option<Node>,
    /// Root-to-node path ending at `node`; empty when `node` is `None`
    pub path: Vec<Node>,
}

impl Cursor {
    /// Id of the selected node
    #[inline]
    #[must_use]
    pub fn node_id(&self) -> Option<NodeId> {
        self.node.as_ref().map(|n| n.id)
    }
}

/// Result of sending a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptOutcome {
    /// The stored turn, now the cursor node
    pub node: Node,
    /// True when the parent already had children, so a sibling branch was started
    pub branched: bool,
}

#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub(crate) vaults: Vec<Vault>,
    pub(crate) cursor: Cursor,
    pub(crate) nodes: Vec<Node>,
    pub(crate) merge_selection: Vec<NodeId>,
    pub(crate) is_loading: bool,
    pub(crate) last_error: Option<String>,
}

impl SessionState {
    pub(crate) fn clear_vault(&mut self) {
        self.cursor = Cursor::default();
        self.nodes.clear();
        self.merge_selection.clear();
    }

    pub(crate) fn set_cursor_node(&mut self, node: Option<Node>, path: Vec<Node>) {
        self.cursor.node = node;
        self.cursor.path = path;
    }
}
