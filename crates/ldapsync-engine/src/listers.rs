//! Candidate group sources.
//!
//! A run starts from a [`GroupLister`]. Besides the schema strategies, which
//! list what the directory has, these listers narrow or replace that list.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::group::{LocalGroup, SyncSource};
use crate::mapping::GroupNameMapper;
use crate::schema::GroupLister;
use crate::store::GroupStore;

/// A fixed list of remote identifiers.
#[derive(Debug, Clone)]
pub struct WhitelistGroupLister {
    group_uids: Vec<String>,
}

impl WhitelistGroupLister {
    pub fn new(group_uids: Vec<String>) -> Self {
        Self { group_uids }
    }
}

#[async_trait]
impl GroupLister for WhitelistGroupLister {
    async fn list_groups(&self) -> SyncResult<Vec<String>> {
        Ok(self.group_uids.clone())
    }
}

/// Drops blacklisted identifiers from another lister's output.
pub struct BlacklistGroupLister {
    blacklist: HashSet<String>,
    inner: Arc<dyn GroupLister>,
}

impl BlacklistGroupLister {
    pub fn new(blacklist: impl IntoIterator<Item = String>, inner: Arc<dyn GroupLister>) -> Self {
        Self {
            blacklist: blacklist.into_iter().collect(),
            inner,
        }
    }
}

#[async_trait]
impl GroupLister for BlacklistGroupLister {
    async fn list_groups(&self) -> SyncResult<Vec<String>> {
        let listed = self.inner.list_groups().await?;
        let total = listed.len();
        let kept: Vec<String> = listed
            .into_iter()
            .filter(|uid| !self.blacklist.contains(uid))
            .collect();
        debug!(listed = total, kept = kept.len(), "Applied blacklist");
        Ok(kept)
    }
}

/// Lists the local groups already synced from a source.
///
/// Also maps their remote identifiers back to local names, which prune needs
/// because the remote entry it would otherwise name the group from is gone.
pub struct LocalGroupLister {
    store: Arc<dyn GroupStore>,
    source: SyncSource,
    /// Restrict to these local group names.
    names: Option<Vec<String>>,
    /// Remote identifier to local name, filled by `list_groups`.
    known: RwLock<BTreeMap<String, String>>,
}

impl LocalGroupLister {
    /// Every local group synced from `source`.
    pub fn all(store: Arc<dyn GroupStore>, source: SyncSource) -> Self {
        Self {
            store,
            source,
            names: None,
            known: RwLock::new(BTreeMap::new()),
        }
    }

    /// The named local groups, each of which must have been synced from `source`.
    pub fn named(store: Arc<dyn GroupStore>, source: SyncSource, names: Vec<String>) -> Self {
        Self {
            store,
            source,
            names: Some(names),
            known: RwLock::new(BTreeMap::new()),
        }
    }

    async fn candidates(&self) -> SyncResult<Vec<LocalGroup>> {
        let Some(names) = &self.names else {
            let groups = self.store.list().await?;
            return Ok(groups
                .into_iter()
                .filter(|g| g.is_synced_from(&self.source))
                .collect());
        };

        let mut groups = Vec::with_capacity(names.len());
        for name in names {
            let group = self
                .store
                .get(name)
                .await?
                .filter(|g| g.is_synced_from(&self.source))
                .ok_or_else(|| SyncError::NotSyncedFromSource {
                    group: name.clone(),
                    source_identity: self.source.identity.clone(),
                })?;
            groups.push(group);
        }
        Ok(groups)
    }
}

#[async_trait]
impl GroupLister for LocalGroupLister {
    async fn list_groups(&self) -> SyncResult<Vec<String>> {
        let groups = self.candidates().await?;
        let mut known = self.known.write().await;
        let mut uids = Vec::with_capacity(groups.len());
        for group in groups {
            if let Some(uid) = group.remote_uid() {
                known.insert(uid.to_string(), group.name.clone());
                uids.push(uid.to_string());
            }
        }
        debug!(
            source = %self.source.identity,
            count = uids.len(),
            "Listed local groups"
        );
        Ok(uids)
    }
}

#[async_trait]
impl GroupNameMapper for LocalGroupLister {
    async fn group_name_for(&self, group_uid: &str) -> SyncResult<String> {
        if self.known.read().await.is_empty() {
            self.list_groups().await?;
        }
        self.known
            .read()
            .await
            .get(group_uid)
            .cloned()
            .ok_or_else(|| SyncError::unmapped_group(group_uid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryGroupStore;
    use chrono::Utc;

    fn source() -> SyncSource {
        SyncSource::new("ldap.example.com", 389)
    }

    fn synced(name: &str, uid: &str, source: &SyncSource) -> LocalGroup {
        let mut group = LocalGroup::new(name);
        group.stamp(source, uid, vec![], Utc::now());
        group
    }

    fn store() -> Arc<InMemoryGroupStore> {
        Arc::new(InMemoryGroupStore::with_groups([
            synced("eng", "cn=eng,dc=example,dc=com", &source()),
            synced("ops", "cn=ops,dc=example,dc=com", &source()),
            synced("other", "cn=other,dc=example,dc=com", &SyncSource::new("ad.example.com", 389)),
            LocalGroup::new("manual"),
        ]))
    }

    #[tokio::test]
    async fn test_whitelist_and_blacklist() {
        let whitelist = Arc::new(WhitelistGroupLister::new(vec![
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
        ]));
        let lister = BlacklistGroupLister::new(["b".to_string()], whitelist);
        assert_eq!(
            lister.list_groups().await.unwrap(),
            vec!["a".to_string(), "c".to_string()]
        );
    }

    #[tokio::test]
    async fn test_local_lister_only_lists_own_source() {
        let lister = LocalGroupLister::all(store(), source());
        assert_eq!(
            lister.list_groups().await.unwrap(),
            vec![
                "cn=eng,dc=example,dc=com".to_string(),
                "cn=ops,dc=example,dc=com".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_local_lister_maps_names() {
        let lister = LocalGroupLister::all(store(), source());
        assert_eq!(
            lister.group_name_for("cn=ops,dc=example,dc=com").await.unwrap(),
            "ops"
        );
        assert!(matches!(
            lister
                .group_name_for("cn=other,dc=example,dc=com")
                .await
                .unwrap_err(),
            SyncError::UnmappedGroup { .. }
        ));
    }

    #[tokio::test]
    async fn test_named_local_lister() {
        let lister = LocalGroupLister::named(store(), source(), vec!["ops".to_string()]);
        assert_eq!(
            lister.list_groups().await.unwrap(),
            vec!["cn=ops,dc=example,dc=com".to_string()]
        );

        for name in ["manual", "other", "missing"] {
            let lister = LocalGroupLister::named(store(), source(), vec![name.to_string()]);
            assert!(matches!(
                lister.list_groups().await.unwrap_err(),
                SyncError::NotSyncedFromSource { .. }
            ));
        }
    }
}
