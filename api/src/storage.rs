//! Shared storage utilities for the JSON documents kept on local disk.
//!
//! Used by the credential file store and the reel store so both write the
//! same way: serialize, write a sibling temp file, rename over the target.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{DropReelError, DropReelResult};

/// Read a JSON document. Returns `None` when the file does not exist.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> DropReelResult<Option<T>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(DropReelError::storage(&format!("read {}", path.display()), e)),
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| DropReelError::storage(&format!("parse {}", path.display()), e))
}

/// Write a JSON document atomically, creating parent directories as needed.
pub async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> DropReelResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DropReelError::storage(&format!("create {}", parent.display()), e))?;
    }

    let data = serde_json::to_vec_pretty(value)
        .map_err(|e| DropReelError::storage("serialize document", e))?;

    let tmp = temp_path(path);
    tokio::fs::write(&tmp, &data)
        .await
        .map_err(|e| DropReelError::storage(&format!("write {}", tmp.display()), e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| DropReelError::storage(&format!("rename {}", tmp.display()), e))?;

    debug!(path = %path.display(), bytes = data.len(), "Wrote JSON document");
    Ok(())
}

/// Remove a file, treating "already gone" as success.
pub async fn remove_file_if_exists(path: &Path) -> DropReelResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DropReelError::storage(&format!("remove {}", path.display()), e)),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
    path.with_file_name(name)
}
