//! Wire types for the remote classification endpoint.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::{DetectedVideo, FilterSettings, ListMode};

/// One normalized video record in the request body.
#[derive(Debug, Clone, Serialize)]
pub struct PayloadVideo {
    pub uuid: String,
    pub timestamp: i64,
    pub title: String,
    pub thumbnail_url: String,
    pub channel_name: String,
    pub channel_id: String,
    pub channel_url: String,
}

impl PayloadVideo {
    pub fn from_detected(video: &DetectedVideo, timestamp: i64) -> Self {
        Self {
            uuid: video.video_id.clone(),
            timestamp,
            title: video.title.clone(),
            thumbnail_url: format!(
                "https://img.youtube.com/vi/{}/hqdefault.jpg",
                video.video_id
            ),
            channel_name: video.channel.clone(),
            channel_id: video.channel_id.clone(),
            // channel ids arrive as site-relative paths
            channel_url: format!("https://youtube.com{}", video.channel_id),
        }
    }
}

/// Body of `POST /filterVideos`. Exactly one of `block_list` /
/// `allow_list` is present.
#[derive(Debug, Clone, Serialize)]
pub struct FilterRequest {
    pub videos: Vec<PayloadVideo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_list: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_list: Option<Vec<String>>,
}

impl FilterRequest {
    /// Build the request from a detection snapshot and the settings
    /// snapshot taken at send time. Instruction text, when present and
    /// non-empty, is appended to the configured term list.
    pub fn build(detected: &[DetectedVideo], settings: &FilterSettings) -> Self {
        let timestamp = Utc::now().timestamp_millis();
        let videos = detected
            .iter()
            .map(|video| PayloadVideo::from_detected(video, timestamp))
            .collect();

        let mut terms = settings.filter_list.clone();
        if let Some(instructions) = settings
            .instructions
            .as_deref()
            .filter(|text| !text.is_empty())
        {
            terms.push(instructions.to_string());
        }

        if settings.list_mode == ListMode::AllowList {
            Self {
                videos,
                block_list: None,
                allow_list: Some(terms),
            }
        } else {
            Self {
                videos,
                block_list: Some(terms),
                allow_list: None,
            }
        }
    }
}

/// One element of the endpoint's response array.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterVerdict {
    pub uuid: String,
    #[serde(default)]
    pub video_title: Option<String>,
    pub blocked: bool,
}
