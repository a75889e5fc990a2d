//! Arbor Merge
//!
//! Synthesizes several conversation branches into a single completion.
//!
//! # Core Concepts
//!
//! - [`CompletionClient`]: Injected language-model capability with cumulative streaming
//! - [`MergeStrategy`]: xml-context, rag, summary or comparative context assembly
//! - [`MergeEngine`]: Issues the completion calls a strategy needs
//! - [`CancellationToken`]: Stops a merge or send between and after calls
//!
//! # Example
//!
//! ```rust,ignore
//! use arbor_merge::{BranchContext, CancellationToken, MergeEngine, MergeStrategy};
//!
//! let engine = MergeEngine::new(client);
//! let branches = vec![BranchContext::new(tip.id, "Branch 1", store.node_path(tip.id))];
//! let text = engine
//!     .merge(MergeStrategy::Comparative, &branches, "which approach?", None, &CancellationToken::new())
//!     .await?;
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

mod cancel;
mod completion;
mod engine;
mod registry;
mod strategy;

/// Prompt builders for each strategy
pub mod format;

pub use cancel::CancellationToken;
pub use completion::{
    history_from_path, ChatTurn, CompletionClient, CompletionError, CompletionRequest, PartialFn,
    Role,
};
pub use engine::{MergeConfig, MergeEngine};
pub use registry::{StrategyInfo, StrategyRegistry};
pub use strategy::{BranchContext, MergeError, MergeStrategy, SummaryMode, UnknownStrategy};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
