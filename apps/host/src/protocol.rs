//! Native-messaging framing and the cross-context message set.
//!
//! Frames are a u32 native-endian length prefix followed by a JSON
//! body, the format the browser speaks on stdin/stdout.

use std::io;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tubegate_core::{DetectedVideo, TabId};

/// Guard against a corrupt length prefix pinning the host on a huge read.
const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

pub async fn read_message<R>(reader: &mut R) -> io::Result<serde_json::Value>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_ne_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame length {len} exceeds limit"),
        ));
    }

    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;

    serde_json::from_slice(&body).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

pub async fn write_message<W, T>(writer: &mut W, msg: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(msg)?;
    let len = body.len() as u32;

    writer.write_all(&len.to_ne_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await
}

/// Messages arriving from the extension side.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Incoming {
    GetCurrentTabId,
    #[serde(rename_all = "camelCase")]
    FilterVideosForTab {
        tab_id: TabId,
        detected_videos: Vec<DetectedVideo>,
    },
    #[serde(rename_all = "camelCase")]
    TabActivated { tab_id: TabId },
    #[serde(rename_all = "camelCase")]
    TabClosed { tab_id: TabId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterStatus {
    Success,
    Error,
}

/// Messages the host sends back.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Outgoing {
    #[serde(rename_all = "camelCase")]
    CurrentTabId { tab_id: TabId },
    #[serde(rename_all = "camelCase")]
    FilterVideosResult {
        tab_id: TabId,
        status: FilterStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    FilterVideosResponse {
        tab_id: TabId,
        data: Option<Vec<String>>,
        error: Option<String>,
    },
}
