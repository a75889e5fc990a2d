//! Identifiers for vaults and nodes
//!
//! Both are ULIDs: globally unique, generated at creation, never reused, and
//! sortable by creation time (the secondary vault index relies on this).

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use ulid::{Generator, Ulid};

/// Monotonic within a millisecond, so node ids sort in creation order
static NODE_IDS: Mutex<Generator> = parking_lot::const_mutex(Generator::new());

/// Unique vault identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VaultId(pub Ulid);

impl VaultId {
    /// Generate new vault ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for VaultId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for VaultId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VaultId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

/// Unique node identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub Ulid);

impl NodeId {
    /// Generate new node ID, strictly greater than every ID generated before it
    #[must_use]
    pub fn new() -> Self {
        Self(NODE_IDS.lock().generate().unwrap_or_else(|_| Ulid::new()))
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}
