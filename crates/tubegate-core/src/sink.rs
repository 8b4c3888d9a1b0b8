use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::types::TabId;

/// Payload of a `filterVideosResponse` message to the page context:
/// either the list of blocked video ids or a human-readable error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageUpdate {
    pub data: Option<Vec<String>>,
    pub error: Option<String>,
}

impl PageUpdate {
    pub fn blocked(ids: Vec<String>) -> Self {
        Self {
            data: Some(ids),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Receiving end of the coordinator's page-context notifications.
#[async_trait]
pub trait PageSink: Send + Sync {
    async fn notify(&self, tab_id: TabId, update: PageUpdate);
}

/// Forwards updates into an unbounded channel; the host drains it into
/// stdout frames, tests drain it directly.
pub struct ChannelPageSink {
    tx: mpsc::UnboundedSender<(TabId, PageUpdate)>,
}

impl ChannelPageSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(TabId, PageUpdate)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl PageSink for ChannelPageSink {
    async fn notify(&self, tab_id: TabId, update: PageUpdate) {
        // receiver gone means the host is shutting down
        let _ = self.tx.send((tab_id, update));
    }
}
