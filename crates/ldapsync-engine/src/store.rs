//! Local group stores
//!
//! [`GroupStore`] is the only way the orchestrators touch local state. Two
//! implementations are provided: an in-memory map, and a JSON document on
//! disk that is rewritten on every change.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::group::LocalGroup;

/// Errors that can occur while reading or writing local groups.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("group {name:?} not found")]
    NotFound { name: String },

    #[error("group {name:?} already exists")]
    AlreadyExists { name: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    pub fn already_exists(name: impl Into<String>) -> Self {
        Self::AlreadyExists { name: name.into() }
    }

    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage for local groups, keyed by name.
#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn get(&self, name: &str) -> StoreResult<Option<LocalGroup>>;

    /// Fails with [`StoreError::AlreadyExists`] if the name is taken.
    async fn create(&self, group: LocalGroup) -> StoreResult<()>;

    /// Fails with [`StoreError::NotFound`] if the group does not exist.
    async fn update(&self, group: LocalGroup) -> StoreResult<()>;

    /// Fails with [`StoreError::NotFound`] if the group does not exist.
    async fn delete(&self, name: &str) -> StoreResult<()>;

    /// All groups, ordered by name.
    async fn list(&self) -> StoreResult<Vec<LocalGroup>>;
}

/// Group map shared by both store implementations.
#[derive(Debug, Default, Serialize, Deserialize)]
struct GroupMap {
    #[serde(default)]
    groups: BTreeMap<String, LocalGroup>,
}

impl GroupMap {
    fn create(&mut self, group: LocalGroup) -> StoreResult<()> {
        if self.groups.contains_key(&group.name) {
            return Err(StoreError::already_exists(&group.name));
        }
        self.groups.insert(group.name.clone(), group);
        Ok(())
    }

    fn update(&mut self, group: LocalGroup) -> StoreResult<()> {
        match self.groups.get_mut(&group.name) {
            Some(existing) => {
                *existing = group;
                Ok(())
            }
            None => Err(StoreError::not_found(&group.name)),
        }
    }

    fn delete(&mut self, name: &str) -> StoreResult<()> {
        self.groups
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(name))
    }
}

/// In-memory group store.
#[derive(Debug, Default)]
pub struct InMemoryGroupStore {
    inner: RwLock<GroupMap>,
}

impl InMemoryGroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `groups`.
    pub fn with_groups(groups: impl IntoIterator<Item = LocalGroup>) -> Self {
        let groups = groups
            .into_iter()
            .map(|g| (g.name.clone(), g))
            .collect();
        Self {
            inner: RwLock::new(GroupMap { groups }),
        }
    }
}

#[async_trait]
impl GroupStore for InMemoryGroupStore {
    async fn get(&self, name: &str) -> StoreResult<Option<LocalGroup>> {
        Ok(self.inner.read().await.groups.get(name).cloned())
    }

    async fn create(&self, group: LocalGroup) -> StoreResult<()> {
        self.inner.write().await.create(group)
    }

    async fn update(&self, group: LocalGroup) -> StoreResult<()> {
        self.inner.write().await.update(group)
    }

    async fn delete(&self, name: &str) -> StoreResult<()> {
        self.inner.write().await.delete(name)
    }

    async fn list(&self) -> StoreResult<Vec<LocalGroup>> {
        Ok(self.inner.read().await.groups.values().cloned().collect())
    }
}

/// Group store persisted as a JSON document.
///
/// Every call reads the file, and every change rewrites it through a
/// temporary file and a rename. A missing file is an empty store.
#[derive(Debug)]
pub struct JsonFileGroupStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileGroupStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> StoreResult<GroupMap> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(GroupMap::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(GroupMap::default()),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    async fn save(&self, map: &GroupMap) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(map)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;

        debug!(path = %self.path.display(), groups = map.groups.len(), "Group store saved");
        Ok(())
    }

    async fn modify<F>(&self, change: F) -> StoreResult<()>
    where
        F: FnOnce(&mut GroupMap) -> StoreResult<()> + Send,
    {
        let _guard = self.lock.lock().await;
        let mut map = self.load().await?;
        change(&mut map)?;
        self.save(&map).await
    }
}

#[async_trait]
impl GroupStore for JsonFileGroupStore {
    async fn get(&self, name: &str) -> StoreResult<Option<LocalGroup>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.groups.remove(name))
    }

    async fn create(&self, group: LocalGroup) -> StoreResult<()> {
        self.modify(|map| map.create(group)).await
    }

    async fn update(&self, group: LocalGroup) -> StoreResult<()> {
        self.modify(|map| map.update(group)).await
    }

    async fn delete(&self, name: &str) -> StoreResult<()> {
        self.modify(|map| map.delete(name)).await
    }

    async fn list(&self) -> StoreResult<Vec<LocalGroup>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.groups.into_values().collect())
    }
}
