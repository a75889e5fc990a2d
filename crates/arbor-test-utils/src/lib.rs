//! Testing utilities for the Arbor workspace
//!
//! Shared completion fakes, graph fixtures, and invariant assertions.

#![allow(missing_docs)]

mod completion;
mod invariants;

pub use completion::{Gate, RecordedRequest, ScriptedCompletion, Step};
pub use invariants::{assert_graph_consistent, graph_violations};

use arbor_graph::{GraphStore, Node, NodeId, Turn, Vault};

/// Model id reported by [`ScriptedCompletion`] unless overridden
pub const TEST_MODEL: &str = "scripted-model";

/// Install a fmt subscriber filtered by `RUST_LOG` (default `warn`); repeat calls are no-ops
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Turn whose response is derived from the prompt
pub fn turn(prompt: &str) -> Turn {
    Turn::new(prompt, format!("answer to {prompt}"), TEST_MODEL)
}

/// Fresh in-memory store with one empty vault
pub fn store_with_vault() -> (GraphStore, Vault) {
    let store = GraphStore::in_memory();
    let vault = store.create_vault("test vault", "fixture").unwrap();
    (store, vault)
}

/// Linear lineage under `parent` (a new root when `None`), one node per prompt
pub fn chain(store: &GraphStore, vault: &Vault, parent: Option<NodeId>, prompts: &[&str]) -> Vec<Node> {
    let mut nodes = Vec::with_capacity(prompts.len());
    let mut parent = parent;
    for prompt in prompts {
        let node = store.create_node(vault.id, parent, turn(prompt)).unwrap();
        parent = Some(node.id);
        nodes.push(node);
    }
    nodes
}
