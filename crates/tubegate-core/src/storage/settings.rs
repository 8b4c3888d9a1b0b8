//! Persistent filter configuration.
//!
//! The coordinator only ever takes snapshots through [`SettingsStore`];
//! the mutation helpers exist for the presentation layer.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{
    fs,
    sync::{RwLock, watch},
};

use crate::{
    error::Result,
    types::{FilterSettings, ListMode},
};

#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Snapshot of the current configuration.
    async fn get(&self) -> Result<FilterSettings>;
}

/// JSON-file-backed settings store. Every mutation rewrites the file
/// and bumps the change counter observed by `subscribe`.
pub struct JsonSettingsStore {
    path: PathBuf,
    state: RwLock<FilterSettings>,
    changed: watch::Sender<u64>,
}

impl JsonSettingsStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings = match fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => FilterSettings::default(),
            Err(err) => return Err(err.into()),
        };

        let (changed, _) = watch::channel(0);
        Ok(Self {
            path,
            state: RwLock::new(settings),
            changed,
        })
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tubegate")
            .join("settings.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changed.subscribe()
    }

    async fn mutate<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut FilterSettings),
    {
        let snapshot = {
            let mut state = self.state.write().await;
            apply(&mut state);
            state.clone()
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let pretty = serde_json::to_string_pretty(&snapshot)?;
        fs::write(&self.path, &pretty).await?;

        self.changed.send_modify(|version| *version += 1);
        Ok(())
    }

    pub async fn update_instructions(&self, instructions: Option<String>) -> Result<()> {
        self.mutate(|settings| settings.instructions = instructions)
            .await
    }

    pub async fn add_filter(&self, term: impl Into<String>) -> Result<()> {
        let term = term.into();
        self.mutate(|settings| settings.filter_list.push(term))
            .await
    }

    pub async fn remove_filter(&self, term: &str) -> Result<()> {
        self.mutate(|settings| settings.filter_list.retain(|t| t != term))
            .await
    }

    pub async fn replace_filters(&self, terms: Vec<String>) -> Result<()> {
        self.mutate(|settings| settings.filter_list = terms).await
    }

    pub async fn clear_filters(&self) -> Result<()> {
        self.mutate(|settings| settings.filter_list.clear()).await
    }

    pub async fn set_list_mode(&self, mode: ListMode) -> Result<()> {
        self.mutate(|settings| settings.list_mode = mode).await
    }

    pub async fn list_mode(&self) -> ListMode {
        self.state.read().await.list_mode
    }

    pub async fn add_blacklisted(&self, video_id: impl Into<String>) -> Result<()> {
        let video_id = video_id.into();
        self.mutate(|settings| settings.blacklisted_video_ids.push(video_id))
            .await
    }

    pub async fn remove_blacklisted(&self, video_id: &str) -> Result<()> {
        self.mutate(|settings| {
            settings.blacklisted_video_ids.retain(|id| id != video_id)
        })
        .await
    }

    pub async fn replace_blacklist(&self, video_ids: Vec<String>) -> Result<()> {
        self.mutate(|settings| settings.blacklisted_video_ids = video_ids)
            .await
    }

    pub async fn clear_blacklist(&self) -> Result<()> {
        self.mutate(|settings| settings.blacklisted_video_ids.clear())
            .await
    }

    pub async fn is_blacklisted(&self, video_id: &str) -> bool {
        self.state
            .read()
            .await
            .blacklisted_video_ids
            .iter()
            .any(|id| id == video_id)
    }
}

#[async_trait]
impl SettingsStore for JsonSettingsStore {
    async fn get(&self) -> Result<FilterSettings> {
        Ok(self.state.read().await.clone())
    }
}

/// Settings without persistence, for session-scoped use and tests.
#[derive(Default)]
pub struct MemorySettingsStore {
    state: RwLock<FilterSettings>,
}

impl MemorySettingsStore {
    pub fn new(settings: FilterSettings) -> Self {
        Self {
            state: RwLock::new(settings),
        }
    }

    pub async fn set(&self, settings: FilterSettings) {
        *self.state.write().await = settings;
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self) -> Result<FilterSettings> {
        Ok(self.state.read().await.clone())
    }
}
