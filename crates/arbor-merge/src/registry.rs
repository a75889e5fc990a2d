//! Strategy catalog
//!
//! Provides [`StrategyRegistry`], the user-facing description of each merge
//! strategy in display order.

use crate::strategy::MergeStrategy;
use serde::Serialize;

/// Display metadata for one strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StrategyInfo {
    /// Strategy this entry describes
    pub strategy: MergeStrategy,
    /// Short display name
    pub name: &'static str,
    /// One-line description
    pub description: &'static str,
    /// When to pick it
    pub best_for: &'static str,
}

const CATALOG: [StrategyInfo; 4] = [
    StrategyInfo {
        strategy: MergeStrategy::XmlContext,
        name: "XML Context",
        description: "Wraps each branch in XML tags for clear separation. Best accuracy.",
        best_for: "Complex decisions requiring full context understanding",
    },
    StrategyInfo {
        strategy: MergeStrategy::Rag,
        name: "RAG (Plain)",
        description: "Simple text concatenation with delimiters. Lightweight.",
        best_for: "Quick queries across branches",
    },
    StrategyInfo {
        strategy: MergeStrategy::Summary,
        name: "Summary First",
        description: "Summarizes each branch first, then answers. Saves tokens.",
        best_for: "Very long branches or simple questions",
    },
    StrategyInfo {
        strategy: MergeStrategy::Comparative,
        name: "Comparative Analysis",
        description: "Explicitly compares and contrasts branches. Structured output.",
        best_for: "Decision making between explored options",
    },
];

/// Catalog of available merge strategies
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategyRegistry;

impl StrategyRegistry {
    /// Create registry with built-in strategies
    #[inline]
    #[must_use]
    pub fn with_defaults() -> Self {
        Self
    }

    /// Metadata for `strategy`
    #[must_use]
    pub fn info(&self, strategy: MergeStrategy) -> &'static StrategyInfo {
        match strategy {
            MergeStrategy::XmlContext => &CATALOG[0],
            MergeStrategy::Rag => &CATALOG[1],
            MergeStrategy::Summary => &CATALOG[2],
            MergeStrategy::Comparative => &CATALOG[3],
        }
    }

    /// Metadata for a tag, falling back to xml-context
    #[inline]
    #[must_use]
    pub fn lookup(&self, tag: &str) -> &'static StrategyInfo {
        self.info(MergeStrategy::from_tag(tag))
    }

    /// Iterate over all entries in display order
    pub fn iter(&self) -> impl Iterator<Item = &'static StrategyInfo> {
        CATALOG.iter()
    }

    /// Get number of strategies
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        CATALOG.len()
    }

    /// Check if the catalog is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        CATALOG.is_empty()
    }
}
