use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Integer handle the host browser assigns to a tab.
pub type TabId = i32;

/// Page surface a video listing was detected on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceKind {
    Homepage,
    Sidebar,
    Search,
}

/// Whether a listing points at a single video or a playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Video,
    Playlist,
}

/// One video listing as reported by the page detector. Read-only input;
/// DOM references never cross the messaging boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedVideo {
    pub video_id: String,
    pub title: String,
    pub channel: String,
    pub channel_id: String,
    pub thumbnail: String,
    #[serde(rename = "type")]
    pub surface: SurfaceKind,
    #[serde(rename = "videoType")]
    pub content_kind: ContentKind,
}

/// A video the filter service flagged, as kept in the per-tab store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedVideoDetails {
    pub video_id: String,
    pub title: String,
    pub channel: String,
    pub channel_id: String,
    pub thumbnail: String,
    #[serde(rename = "videoType")]
    pub content_kind: ContentKind,
    pub detected_at: DateTime<Utc>,
}

impl BlockedVideoDetails {
    pub fn from_detected(video: &DetectedVideo, detected_at: DateTime<Utc>) -> Self {
        Self {
            video_id: video.video_id.clone(),
            title: video.title.clone(),
            channel: video.channel.clone(),
            channel_id: video.channel_id.clone(),
            thumbnail: video.thumbnail.clone(),
            content_kind: video.content_kind,
            detected_at,
        }
    }
}

/// How configured filter terms are interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListMode {
    Disabled,
    AllowList,
    #[default]
    BlockList,
}

/// User-facing filter configuration, owned by the settings store. Each
/// filter cycle reads a snapshot at send time; mid-flight changes apply
/// to the next cycle only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSettings {
    pub instructions: Option<String>,
    pub filter_list: Vec<String>,
    pub list_mode: ListMode,
    /// Manually blacklisted video ids, managed from the presentation layer.
    pub blacklisted_video_ids: Vec<String>,
}

/// Per-tab snapshot: the last detected set and the subset the service
/// blocked. Replaced wholesale on each successful cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabEntry {
    pub detected: Vec<DetectedVideo>,
    pub blocked: Vec<BlockedVideoDetails>,
}
