//! Key-value snapshot persistence

use async_trait::async_trait;
use panel_common::{AppError, AppResult};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Key under which the overlay control panel settings are stored
pub const CONTROL_PANEL_SETTINGS_KEY: &str = "controlPanelSettings";

/// Durable string storage keyed by name
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Stored text for `key`, or `None` if nothing was saved yet
    async fn load(&self, key: &str) -> AppResult<Option<String>>;

    async fn save(&self, key: &str, value: &str) -> AppResult<()>;
}

/// Load and decode a JSON snapshot
pub async fn load_json<T: DeserializeOwned>(
    store: &dyn SnapshotStore,
    key: &str,
) -> AppResult<Option<T>> {
    match store.load(key).await? {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

/// Encode and store a JSON snapshot
pub async fn save_json<T: Serialize + Sync>(
    store: &dyn SnapshotStore,
    key: &str,
    value: &T,
) -> AppResult<()> {
    let text = serde_json::to_string(value)?;
    store.save(key, &text).await
}

/// One `<key>.json` file per key under a directory
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> AppResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(AppError::invalid_input(format!("snapshot key {key:?}")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self, key: &str) -> AppResult<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::persistence(format!(
                "reading {}: {e}",
                path.display()
            ))),
        }
    }

    async fn save(&self, key: &str, value: &str) -> AppResult<()> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        // Write-then-rename: readers never see a partial file
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(key, path = %path.display(), "Snapshot saved");
        Ok(())
    }
}

/// Process-local store, used by tests and when persistence is disabled
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> AppResult<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}
