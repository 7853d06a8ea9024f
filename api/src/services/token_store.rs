//! Durable storage for the single deployment-wide Dropbox credential.
//!
//! Callers only see the `TokenStore` trait; the backend (JSON file or
//! process memory) is picked once at startup.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::DropReelResult;
use crate::models::Credential;
use crate::storage;

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Overwrite the stored credential
    async fn save(&self, credential: &Credential) -> DropReelResult<()>;

    /// `None` if never set or after `clear`
    async fn load(&self) -> DropReelResult<Option<Credential>>;

    /// Remove the credential. Idempotent.
    async fn clear(&self) -> DropReelResult<()>;
}

/// In-process store. Lost on restart.
#[derive(Default)]
pub struct MemoryTokenStore {
    credential: RwLock<Option<Credential>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn save(&self, credential: &Credential) -> DropReelResult<()> {
        *self.credential.write().await = Some(credential.clone());
        Ok(())
    }

    async fn load(&self) -> DropReelResult<Option<Credential>> {
        Ok(self.credential.read().await.clone())
    }

    async fn clear(&self) -> DropReelResult<()> {
        *self.credential.write().await = None;
        Ok(())
    }
}

/// Credential kept as a JSON document on local disk
pub struct FileTokenStore {
    path: PathBuf,
    // Serializes writers so a save never interleaves with a clear
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn save(&self, credential: &Credential) -> DropReelResult<()> {
        let _guard = self.write_lock.lock().await;
        storage::write_json_atomic(&self.path, credential).await?;
        debug!(path = %self.path.display(), "Saved credential");
        Ok(())
    }

    async fn load(&self) -> DropReelResult<Option<Credential>> {
        storage::read_json(&self.path).await
    }

    async fn clear(&self) -> DropReelResult<()> {
        let _guard = self.write_lock.lock().await;
        storage::remove_file_if_exists(&self.path).await?;
        debug!(path = %self.path.display(), "Cleared credential");
        Ok(())
    }
}
