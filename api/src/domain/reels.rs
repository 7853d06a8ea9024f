//! Reel store: indexed in-memory table with write-through JSON persistence.
//!
//! The whole table sits behind one `RwLock`. Every mutation is applied in
//! memory and written to disk while the write lock is held; a failed write
//! rolls the in-memory change back.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{DropReelError, DropReelResult};
use crate::models::{DirectorInfo, ReelRecord, VideoRecord};
use crate::storage;

/// Fields supplied when creating a reel
#[derive(Debug, Clone, Default)]
pub struct NewReel {
    pub videos: Vec<VideoRecord>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub director_info: Option<DirectorInfo>,
    pub edit_state: Option<serde_json::Value>,
}

/// Replaceable fields. An omitted field leaves the stored value untouched;
/// an explicit `null` clears an optional one. id and createdAt have no slot
/// here and cannot change.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReelUpdate {
    pub videos: Option<Vec<VideoRecord>>,
    #[serde(default, deserialize_with = "present")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub director_info: Option<Option<DirectorInfo>>,
    #[serde(default, deserialize_with = "present")]
    pub edit_state: Option<Option<serde_json::Value>>,
}

// Field present in the body, possibly null
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Serialize, Deserialize)]
struct ReelsDocument {
    reels: Vec<ReelRecord>,
}

pub struct ReelStore {
    path: PathBuf,
    reels: RwLock<HashMap<String, ReelRecord>>,
}

impl ReelStore {
    /// Load the collection, creating an empty document on first run
    pub async fn open(path: impl Into<PathBuf>) -> DropReelResult<Self> {
        let path = path.into();

        let reels = match storage::read_json::<ReelsDocument>(&path).await? {
            Some(doc) => doc.reels,
            None => {
                storage::write_json_atomic(&path, &ReelsDocument { reels: Vec::new() }).await?;
                info!(path = %path.display(), "Created empty reel store");
                Vec::new()
            }
        };

        debug!(path = %path.display(), count = reels.len(), "Loaded reels");
        Ok(Self {
            path,
            reels: RwLock::new(reels.into_iter().map(|r| (r.id.clone(), r)).collect()),
        })
    }

    pub async fn create(&self, new: NewReel) -> DropReelResult<ReelRecord> {
        let now = Utc::now();
        let reel = ReelRecord {
            id: uuid::Uuid::new_v4().to_string(),
            videos: new.videos,
            title: new.title,
            description: new.description,
            director_info: new.director_info,
            edit_state: new.edit_state,
            created_at: now,
            updated_at: now,
        };

        let mut reels = self.reels.write().await;
        reels.insert(reel.id.clone(), reel.clone());
        if let Err(e) = self.persist(&reels).await {
            reels.remove(&reel.id);
            return Err(e);
        }

        info!(id = %reel.id, videos = reel.videos.len(), "Created reel");
        Ok(reel)
    }

    pub async fn get(&self, id: &str) -> Option<ReelRecord> {
        self.reels.read().await.get(id).cloned()
    }

    /// All reels, oldest first
    pub async fn list(&self) -> Vec<ReelRecord> {
        let mut reels: Vec<ReelRecord> = self.reels.read().await.values().cloned().collect();
        reels.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        reels
    }

    pub async fn update(&self, id: &str, update: ReelUpdate) -> DropReelResult<ReelRecord> {
        let mut reels = self.reels.write().await;

        let previous = reels
            .get(id)
            .cloned()
            .ok_or_else(|| DropReelError::NotFound(format!("reel {}", id)))?;

        let mut reel = previous.clone();
        if let Some(videos) = update.videos {
            reel.videos = videos;
        }
        if let Some(title) = update.title {
            reel.title = title;
        }
        if let Some(description) = update.description {
            reel.description = description;
        }
        if let Some(director_info) = update.director_info {
            reel.director_info = director_info;
        }
        if let Some(edit_state) = update.edit_state {
            reel.edit_state = edit_state;
        }
        reel.updated_at = Utc::now();

        reels.insert(id.to_string(), reel.clone());
        if let Err(e) = self.persist(&reels).await {
            reels.insert(id.to_string(), previous);
            return Err(e);
        }

        debug!(id, "Updated reel");
        Ok(reel)
    }

    /// `false` if no reel had this id
    pub async fn delete(&self, id: &str) -> DropReelResult<bool> {
        let mut reels = self.reels.write().await;

        let Some(removed) = reels.remove(id) else {
            return Ok(false);
        };

        if let Err(e) = self.persist(&reels).await {
            reels.insert(id.to_string(), removed);
            return Err(e);
        }

        info!(id, "Deleted reel");
        Ok(true)
    }

    async fn persist(&self, reels: &HashMap<String, ReelRecord>) -> DropReelResult<()> {
        let mut ordered: Vec<ReelRecord> = reels.values().cloned().collect();
        ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        storage::write_json_atomic(&self.path, &ReelsDocument { reels: ordered }).await
    }
}
