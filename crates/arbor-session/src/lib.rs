//! Arbor Session
//!
//! Application-level orchestration of a branching conversation: which vault and
//! node are current, sending prompts with path history, branching, merging the
//! selected branches, and deleting with cursor recomputation.
//!
//! # Core Concepts
//!
//! - [`Session`]: Holds the cursor and drives the store and the completion client
//! - [`Cursor`]: Current vault, current node and the root-to-node path
//! - [`ArborConfig`]: `[store]`, `[merge]` and `[session]` tables from one TOML file
//!
//! # Example
//!
//! ```rust,ignore
//! use arbor_session::{ArborConfig, Session};
//!
//! let config = ArborConfig::load("arbor.toml")?;
//! let session = Session::from_config(&config)?.with_client(client);
//!
//! let vault = session.create_vault("Design review", "")?;
//! let first = session.send_prompt("What are the options?").await?;
//! let second = session.branch_from_node(first.node.id, "Try it with a queue instead").await?;
//! assert!(!second.branched);
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

mod config;
mod error;
mod session;
mod state;

pub use config::{ArborConfig, SessionConfig};
pub use error::{Result, SessionError};
pub use session::Session;
pub use state::{Cursor, PromptOutcome};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
