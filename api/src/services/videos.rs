//! Video listing adapter: turns Dropbox folder entries into `VideoRecord`s
//! and resolves stream links, durations and thumbnails on demand.

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, warn};

use super::dropbox::{DropboxClient, DropboxError, FileMetadata, MediaInfo, Metadata};
use crate::constants::VIDEO_EXTENSIONS;
use crate::error::{DropReelError, DropReelResult};
use crate::models::VideoRecord;

/// Root-folder entry offered as a recovery hint when a listing fails
#[derive(Debug, Clone, Serialize)]
pub struct RootEntry {
    pub name: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Clone)]
pub struct VideoLibrary {
    dropbox: DropboxClient,
    default_folder: String,
}

impl VideoLibrary {
    pub fn new(dropbox: DropboxClient, default_folder: &str) -> Self {
        Self {
            dropbox,
            default_folder: normalize_folder(default_folder),
        }
    }

    /// List the videos of `folder` (default folder when `None`).
    /// Returns the normalized folder path alongside the records.
    pub async fn list_videos(
        &self,
        access_token: &str,
        folder: Option<&str>,
    ) -> DropReelResult<(String, Vec<VideoRecord>)> {
        let folder = folder
            .map(normalize_folder)
            .unwrap_or_else(|| self.default_folder.clone());

        let entries = self
            .dropbox
            .list_folder(access_token, &folder)
            .await
            .map_err(listing_error)?;

        let videos = videos_from_entries(entries);
        debug!(folder = %folder, count = videos.len(), "Listed videos");
        Ok((folder, videos))
    }

    /// Folders and files at the Dropbox root
    pub async fn list_root(&self, access_token: &str) -> DropReelResult<Vec<RootEntry>> {
        let entries = self
            .dropbox
            .list_folder(access_token, "")
            .await
            .map_err(listing_error)?;

        Ok(entries
            .into_iter()
            .filter_map(|entry| match entry {
                Metadata::Folder(f) => Some(RootEntry {
                    name: f.name,
                    kind: "folder",
                    path: f.path_display,
                }),
                Metadata::File(f) => Some(RootEntry {
                    name: f.name,
                    kind: "file",
                    path: f.path_display,
                }),
                Metadata::Deleted(_) => None,
            })
            .collect())
    }

    /// Resolve the stream link and duration of a single video
    pub async fn resolve_video(&self, access_token: &str, path: &str) -> DropReelResult<VideoRecord> {
        let (metadata, link) = tokio::join!(
            self.dropbox.get_metadata(access_token, path, true),
            self.dropbox.get_temporary_link(access_token, path),
        );

        let file = match metadata.map_err(listing_error)? {
            Metadata::File(file) => file,
            other => {
                return Err(DropReelError::Listing {
                    status: None,
                    code: "not_a_file".to_string(),
                    message: format!("{} is not a file", other.name()),
                });
            }
        };

        let mut video = video_from_file(file);
        video.stream_url = Some(link.map_err(listing_error)?.link);
        Ok(video)
    }

    /// JPEG thumbnail bytes, `None` when Dropbox has none for this path
    pub async fn thumbnail(&self, access_token: &str, path: &str) -> DropReelResult<Option<Bytes>> {
        self.dropbox
            .get_thumbnail(access_token, path)
            .await
            .map_err(|e| {
                warn!(path, "Thumbnail fetch failed: {}", e);
                listing_error(e)
            })
    }
}

fn listing_error(e: DropboxError) -> DropReelError {
    DropReelError::Listing {
        status: e.status(),
        code: e.code(),
        message: e.to_string(),
    }
}

/// Dropbox addresses the root as "", everything else as "/a/b"
pub fn normalize_folder(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

pub fn is_video_name(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|v| v.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Route the client uses to fetch a thumbnail lazily
pub fn thumbnail_route(path: &str) -> String {
    format!(
        "/videos/thumbnail?path={}",
        percent_encoding::utf8_percent_encode(path, percent_encoding::NON_ALPHANUMERIC)
    )
}

/// `m:ss` below an hour, `h:mm:ss` above
pub fn format_duration_label(duration_ms: u64) -> String {
    let total_secs = duration_ms / 1000;
    let (hours, minutes, seconds) = (total_secs / 3600, (total_secs % 3600) / 60, total_secs % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Keep video files only, sorted by name
pub fn videos_from_entries(entries: Vec<Metadata>) -> Vec<VideoRecord> {
    let mut videos: Vec<VideoRecord> = entries
        .into_iter()
        .filter_map(|entry| match entry {
            Metadata::File(file) if is_video_name(&file.name) => Some(video_from_file(file)),
            _ => None,
        })
        .collect();

    videos.sort_by_key(|v| v.name.to_lowercase());
    videos
}

fn video_from_file(file: FileMetadata) -> VideoRecord {
    let remote_path = file
        .path_display
        .or(file.path_lower)
        .unwrap_or_else(|| format!("/{}", file.name));

    let duration_label = match file.media_info {
        Some(MediaInfo::Metadata { metadata }) => metadata.duration.map(format_duration_label),
        _ => None,
    };

    VideoRecord {
        id: file.id,
        thumbnail_url: Some(thumbnail_route(&remote_path)),
        name: file.name,
        remote_path,
        stream_url: None,
        duration_label,
        size: file.size,
    }
}
