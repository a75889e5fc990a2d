//! Merge strategy identifiers and core types
//!
//! Provides [`MergeStrategy`], the fixed set of context-assembly policies, and
//! [`BranchContext`], one selected line of exploration handed to a merge.

use crate::completion::CompletionError;
use arbor_graph::{Node, NodeId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Policy for serializing several branches into a completion prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
    /// Escaped XML blocks with id/name/turn-count metadata, one call
    #[default]
    XmlContext,

    /// Plain `User:`/`Assistant:` text between delimiter lines, one call
    Rag,

    /// One summary call per branch, then one call over the summaries
    Summary,

    /// XML blocks plus a four-part structured comparison, one call
    Comparative,
}

impl MergeStrategy {
    /// Every strategy, in catalog order
    pub const ALL: [Self; 4] = [Self::XmlContext, Self::Rag, Self::Summary, Self::Comparative];

    /// Strategy tag
    #[inline]
    #[must_use]
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::XmlContext => "xml-context",
            Self::Rag => "rag",
            Self::Summary => "summary",
            Self::Comparative => "comparative",
        }
    }

    /// Resolve a tag; unrecognized tags behave as [`MergeStrategy::XmlContext`]
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        tag.parse().unwrap_or_else(|_| {
            tracing::warn!(tag, "unknown merge strategy, using xml-context");
            Self::XmlContext
        })
    }

    /// Number of completion calls a merge of `branches` branches issues
    #[inline]
    #[must_use]
    pub fn completion_calls(self, branches: usize) -> usize {
        match self {
            Self::Summary => branches + 1,
            Self::XmlContext | Self::Rag | Self::Comparative => 1,
        }
    }
}

impl std::fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl FromStr for MergeStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_tag() == s)
            .ok_or_else(|| UnknownStrategy(s.to_string()))
    }
}

/// Strict parse failure for a strategy tag
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown merge strategy: {0}")]
pub struct UnknownStrategy(pub String);

/// How the summary strategy schedules its per-branch calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryMode {
    /// One call after another
    #[default]
    Sequential,

    /// All calls at once; summaries still concatenate in branch order
    Concurrent,
}

/// One branch selected for a merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchContext {
    /// Node the branch ends at
    pub id: NodeId,
    /// Display name shown to the model
    pub name: String,
    /// Root-to-node path of turns
    pub path: Vec<Node>,
}

impl BranchContext {
    /// Create new branch context
    #[inline]
    #[must_use]
    pub fn new(id: NodeId, name: impl Into<String>, path: Vec<Node>) -> Self {
        Self {
            id,
            name: name.into(),
            path,
        }
    }

    /// Number of turns on the path
    #[inline]
    #[must_use]
    pub fn turn_count(&self) -> usize {
        self.path.len()
    }
}

/// Merge failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    /// No branch was supplied
    #[error("merge requires at least one branch")]
    NoBranches,

    /// A completion call failed or was cancelled
    #[error(transparent)]
    Completion(#[from] CompletionError),
}

impl MergeError {
    /// Check if the merge stopped because it was cancelled
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Completion(CompletionError::Cancelled))
    }
}
