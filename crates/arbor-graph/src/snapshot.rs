//! JSON snapshot persistence
//!
//! The snapshot is rewritten whole after each committed transaction: encoded to a
//! sibling `.tmp` file, synced, then renamed over the previous snapshot. A crash
//! therefore leaves either the old or the new state on disk.

use crate::error::{GraphError, Result};
use crate::model::{Node, Vault};
use crate::store::txn::Tables;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    format_version: u32,
    vaults: Vec<Vault>,
    nodes: Vec<Node>,
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

pub(crate) fn write(path: &Path, tables: &Tables) -> Result<()> {
    let mut vaults: Vec<Vault> = tables.vaults.values().cloned().collect();
    vaults.sort_by_key(|v| v.id);
    let mut nodes: Vec<Node> = tables.nodes.values().cloned().collect();
    nodes.sort_by_key(|n| n.id);

    let bytes = serde_json::to_vec_pretty(&SnapshotFile {
        format_version: FORMAT_VERSION,
        vaults,
        nodes,
    })?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }

    let tmp = temp_path(path);
    let mut file = File::create(&tmp)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&tmp, path)?;

    tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote snapshot");
    Ok(())
}

/// Load a snapshot; `Ok(None)` when the file does not exist yet
pub(crate) fn read(path: &Path) -> Result<Option<Tables>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let file: SnapshotFile = serde_json::from_slice(&bytes)?;
    if file.format_version != FORMAT_VERSION {
        return Err(GraphError::InvalidInput(format!(
            "unsupported snapshot format version {}",
            file.format_version
        )));
    }

    tracing::debug!(
        path = %path.display(),
        vaults = file.vaults.len(),
        nodes = file.nodes.len(),
        "loaded snapshot"
    );
    Ok(Some(Tables::from_records(file.vaults, file.nodes)))
}
