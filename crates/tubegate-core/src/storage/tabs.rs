//! Session-scoped blocked-video state, keyed by tab.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::{
    error::Result,
    types::{BlockedVideoDetails, DetectedVideo, TabEntry, TabId},
};

#[async_trait]
pub trait TabStore: Send + Sync {
    /// Replace the whole entry for `tab_id`. Never merges.
    async fn replace(
        &self,
        tab_id: TabId,
        detected: Vec<DetectedVideo>,
        blocked: Vec<BlockedVideoDetails>,
    ) -> Result<()>;

    /// Drop the entry entirely, e.g. when the tab closes.
    async fn remove(&self, tab_id: TabId) -> Result<()>;

    async fn get(&self, tab_id: TabId) -> Result<Option<TabEntry>>;
}

pub struct MemoryTabStore {
    tabs: Mutex<HashMap<TabId, TabEntry>>,
    changed: watch::Sender<u64>,
}

impl MemoryTabStore {
    pub fn new() -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            tabs: Mutex::new(HashMap::new()),
            changed,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changed.subscribe()
    }

    fn bump(&self) {
        self.changed.send_modify(|version| *version += 1);
    }

    pub async fn is_blocked_in_tab(&self, tab_id: TabId, video_id: &str) -> bool {
        let tabs = self.tabs.lock().expect("tab store poisoned");
        tabs.get(&tab_id)
            .map(|entry| entry.blocked.iter().any(|video| video.video_id == video_id))
            .unwrap_or(false)
    }

    pub async fn remove_video_from_tab(&self, tab_id: TabId, video_id: &str) -> Result<()> {
        {
            let mut tabs = self.tabs.lock().expect("tab store poisoned");
            if let Some(entry) = tabs.get_mut(&tab_id) {
                entry.blocked.retain(|video| video.video_id != video_id);
            }
        }
        self.bump();
        Ok(())
    }
}

impl Default for MemoryTabStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TabStore for MemoryTabStore {
    async fn replace(
        &self,
        tab_id: TabId,
        detected: Vec<DetectedVideo>,
        blocked: Vec<BlockedVideoDetails>,
    ) -> Result<()> {
        self.tabs
            .lock()
            .expect("tab store poisoned")
            .insert(tab_id, TabEntry { detected, blocked });
        self.bump();
        Ok(())
    }

    async fn remove(&self, tab_id: TabId) -> Result<()> {
        self.tabs.lock().expect("tab store poisoned").remove(&tab_id);
        self.bump();
        Ok(())
    }

    async fn get(&self, tab_id: TabId) -> Result<Option<TabEntry>> {
        Ok(self.tabs.lock().expect("tab store poisoned").get(&tab_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentKind, SurfaceKind};
    use chrono::Utc;

    fn detected(id: &str) -> DetectedVideo {
        DetectedVideo {
            video_id: id.to_string(),
            title: "t".to_string(),
            channel: "c".to_string(),
            channel_id: "/@c".to_string(),
            thumbnail: "thumb".to_string(),
            surface: SurfaceKind::Search,
            content_kind: ContentKind::Video,
        }
    }

    fn blocked(id: &str) -> BlockedVideoDetails {
        BlockedVideoDetails::from_detected(&detected(id), Utc::now())
    }

    #[tokio::test]
    async fn replace_is_wholesale() {
        let store = MemoryTabStore::new();
        store
            .replace(7, vec![detected("a"), detected("b")], vec![blocked("a")])
            .await
            .unwrap();
        store
            .replace(7, vec![detected("c")], vec![])
            .await
            .unwrap();

        let entry = store.get(7).await.unwrap().unwrap();
        assert_eq!(entry.detected.len(), 1);
        assert_eq!(entry.detected[0].video_id, "c");
        assert!(entry.blocked.is_empty());
    }

    #[tokio::test]
    async fn remove_deletes_the_entry() {
        let store = MemoryTabStore::new();
        store.replace(7, vec![detected("a")], vec![blocked("a")]).await.unwrap();
        store.remove(7).await.unwrap();
        assert!(store.get(7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn per_video_lookup_and_removal() {
        let store = MemoryTabStore::new();
        store
            .replace(3, vec![detected("a")], vec![blocked("a"), blocked("b")])
            .await
            .unwrap();

        assert!(store.is_blocked_in_tab(3, "a").await);
        assert!(!store.is_blocked_in_tab(4, "a").await);

        store.remove_video_from_tab(3, "a").await.unwrap();
        assert!(!store.is_blocked_in_tab(3, "a").await);
        assert!(store.is_blocked_in_tab(3, "b").await);
    }

    #[tokio::test]
    async fn tabs_are_independent() {
        let store = MemoryTabStore::new();
        store.replace(1, vec![detected("a")], vec![]).await.unwrap();
        store.replace(2, vec![detected("b")], vec![blocked("b")]).await.unwrap();
        store.remove(1).await.unwrap();

        assert!(store.get(1).await.unwrap().is_none());
        assert!(store.get(2).await.unwrap().is_some());
    }
}
