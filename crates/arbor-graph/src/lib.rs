//! Arbor Graph
//!
//! Branching conversation graph: vaults of prompt/response nodes linked by a
//! single-parent tree plus cross-cutting merge edges.
//!
//! # Core Concepts
//!
//! - [`Vault`]: Named collection owning every node whose `vault_id` matches
//! - [`Node`]: One turn; `child_ids` mirrors `parent_id`, `merged_from_ids` marks a merge node
//! - [`GraphStore`]: Transactional arena with create, cascade delete, splice delete and merge
//! - [`traversal`]: Pure path, depth, common-ancestor and subtree functions
//!
//! # Example
//!
//! ```rust,ignore
//! use arbor_graph::{GraphStore, Turn};
//!
//! let store = GraphStore::in_memory();
//! let vault = store.create_vault("research", "")?;
//! let root = store.create_node(vault.id, None, Turn::new("hi", "hello", "model"))?;
//! let child = store.create_branch(root.id, Turn::new("and then?", "...", "model"))?;
//! assert_eq!(store.node_path(child.id).len(), 2);
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

mod error;
mod ids;
mod model;
mod snapshot;
mod store;

pub mod traversal;

pub use error::{GraphError, Result};
pub use ids::{NodeId, VaultId};
pub use model::{CascadeDeletion, Node, SpliceDeletion, Turn, Vault, VaultPatch};
pub use store::{GraphStore, StoreConfig};
pub use traversal::{BranchStructure, Edge, EdgeKind, NodeIndex, NodeLookup};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
