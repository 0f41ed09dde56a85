//! Per-run entry caches.
//!
//! A cache lives exactly as long as the strategy that owns it: one run. It
//! never expires entries and is never shared between runs.

use std::collections::HashMap;

use ldapsync_directory::searcher::query_for_unique_entry;
use ldapsync_directory::{DirectoryResult, DirectorySearcher, QueryOnAttribute, RemoteEntry};
use tokio::sync::RwLock;
use tracing::debug;

/// Identifier to entry map.
#[derive(Debug, Default)]
pub struct EntryCache {
    entries: RwLock<HashMap<String, RemoteEntry>>,
}

impl EntryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<RemoteEntry> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn insert(&self, key: impl Into<String>, entry: RemoteEntry) {
        self.entries.write().await.insert(key.into(), entry);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Unique-entry lookup by query attribute, memoized in an [`EntryCache`].
#[derive(Debug)]
pub struct CachedLookup {
    query: QueryOnAttribute,
    attributes: Vec<String>,
    cache: EntryCache,
}

impl CachedLookup {
    /// `attributes` is the full set requested for every entry.
    pub fn new(query: QueryOnAttribute, attributes: Vec<String>) -> Self {
        Self {
            query,
            attributes,
            cache: EntryCache::new(),
        }
    }

    pub fn query(&self) -> &QueryOnAttribute {
        &self.query
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Look up the entry whose query attribute equals `value`.
    ///
    /// Failures are not cached; a later call retries the search.
    pub async fn entry_for(
        &self,
        searcher: &dyn DirectorySearcher,
        value: &str,
    ) -> DirectoryResult<RemoteEntry> {
        if let Some(entry) = self.cache.get(value).await {
            debug!(value = %value, "Entry cache hit");
            return Ok(entry);
        }

        let request = self
            .query
            .search_request_for(value, self.attributes.clone())?;
        let entry = query_for_unique_entry(searcher, &request).await?;
        self.cache.insert(value, entry.clone()).await;
        Ok(entry)
    }

    /// Seed the cache with an entry found some other way.
    pub async fn remember(&self, value: impl Into<String>, entry: RemoteEntry) {
        self.cache.insert(value, entry).await;
    }

    pub async fn cached(&self) -> usize {
        self.cache.len().await
    }
}
