//! Configuration loading
//!
//! One TOML document with a table per component. Every field has a default, so
//! an empty document is a valid in-memory configuration.

use crate::error::{Result, SessionError};
use arbor_graph::StoreConfig;
use arbor_merge::{MergeConfig, MergeStrategy};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Session behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Strategy used when a merge does not name one
    pub default_strategy: MergeStrategy,
    /// Prefix of merge branch names (`"<label> <n>"`)
    pub branch_label: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_strategy: MergeStrategy::XmlContext,
            branch_label: "Branch".to_string(),
        }
    }
}

impl SessionConfig {
    /// With default merge strategy
    #[inline]
    #[must_use]
    pub fn with_default_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.default_strategy = strategy;
        self
    }

    /// With branch label
    #[inline]
    #[must_use]
    pub fn with_branch_label(mut self, label: impl Into<String>) -> Self {
        self.branch_label = label.into();
        self
    }
}

/// Whole-application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArborConfig {
    /// `[store]` table
    pub store: StoreConfig,
    /// `[merge]` table
    pub merge: MergeConfig,
    /// `[session]` table
    pub session: SessionConfig,
}

impl ArborConfig {
    /// Parse a TOML document
    ///
    /// # Errors
    /// - `SessionError::Config` on malformed TOML or unknown enum values
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| SessionError::Config(e.to_string()))
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// - `SessionError::Config` if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SessionError::Config(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }
}
