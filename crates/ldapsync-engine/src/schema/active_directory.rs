use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use ldapsync_directory::query::{escape_filter_value, merge_attributes};
use ldapsync_directory::searcher::query_for_entries;
use ldapsync_directory::{DirectorySearcher, QueryDescriptor, RemoteEntry};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::{GroupLister, MemberExtractor};
use crate::config::ActiveDirectoryConfig;
use crate::error::SyncResult;

/// Group identifier to member entries, built by inverting user memberships.
#[derive(Debug, Default)]
struct MembershipIndex {
    members: BTreeMap<String, Vec<RemoteEntry>>,
    /// Set only by a full scan of all users.
    fully_populated: bool,
}

impl MembershipIndex {
    fn add(&mut self, group_uid: &str, user: &RemoteEntry) {
        let members = self.members.entry(group_uid.to_string()).or_default();
        if !members.iter().any(|m| m.dn() == user.dn()) {
            members.push(user.clone());
        }
    }
}

/// Active Directory: only users are entries, each listing the groups it
/// belongs to.
pub struct ActiveDirectoryStrategy {
    searcher: Arc<dyn DirectorySearcher>,
    all_users_query: QueryDescriptor,
    user_attributes: Vec<String>,
    group_membership_attributes: Vec<String>,
    index: RwLock<MembershipIndex>,
}

impl ActiveDirectoryStrategy {
    pub fn new(config: &ActiveDirectoryConfig, searcher: Arc<dyn DirectorySearcher>) -> Self {
        let user_attributes = merge_attributes([
            config.user_name_attributes.as_slice(),
            config.group_membership_attributes.as_slice(),
        ]);
        Self {
            searcher,
            all_users_query: config.all_users_query.clone(),
            user_attributes,
            group_membership_attributes: config.group_membership_attributes.clone(),
            index: RwLock::new(MembershipIndex::default()),
        }
    }

    /// Scan every user once and invert their memberships.
    ///
    /// Later calls are no-ops. Entries found by earlier single-group lookups
    /// are replaced by the scan results.
    #[instrument(skip(self))]
    async fn populate(&self) -> SyncResult<()> {
        if self.index.read().await.fully_populated {
            return Ok(());
        }

        let request = self.all_users_query.search_request(self.user_attributes.clone());
        let users = query_for_entries(self.searcher.as_ref(), &request).await?;

        let mut index = MembershipIndex::default();
        for user in &users {
            for attr in &self.group_membership_attributes {
                for group_uid in user.values(attr) {
                    index.add(group_uid, user);
                }
            }
        }
        index.fully_populated = true;

        debug!(
            users = users.len(),
            groups = index.members.len(),
            "Populated membership index"
        );
        *self.index.write().await = index;
        Ok(())
    }

    pub async fn is_fully_populated(&self) -> bool {
        self.index.read().await.fully_populated
    }

    /// Query only the users that list `group_uid`, one query per attribute.
    async fn members_of(&self, group_uid: &str) -> SyncResult<Vec<RemoteEntry>> {
        let mut found = MembershipIndex::default();
        for attr in &self.group_membership_attributes {
            let filter = format!(
                "(&{}({}={}))",
                self.all_users_query.filter,
                attr,
                escape_filter_value(group_uid)
            );
            let request = self
                .all_users_query
                .clone()
                .with_filter(filter)
                .search_request(self.user_attributes.clone());
            for user in query_for_entries(self.searcher.as_ref(), &request).await? {
                found.add(group_uid, &user);
            }
        }
        Ok(found.members.remove(group_uid).unwrap_or_default())
    }
}

#[async_trait]
impl GroupLister for ActiveDirectoryStrategy {
    #[instrument(skip(self))]
    async fn list_groups(&self) -> SyncResult<Vec<String>> {
        self.populate().await?;
        Ok(self.index.read().await.members.keys().cloned().collect())
    }
}

#[async_trait]
impl MemberExtractor for ActiveDirectoryStrategy {
    #[instrument(skip(self))]
    async fn extract_members(&self, group_uid: &str) -> SyncResult<Vec<RemoteEntry>> {
        {
            let index = self.index.read().await;
            if let Some(members) = index.members.get(group_uid) {
                return Ok(members.clone());
            }
            if index.fully_populated {
                return Ok(Vec::new());
            }
        }

        let members = self.members_of(group_uid).await?;
        let mut index = self.index.write().await;
        for member in &members {
            index.add(group_uid, member);
        }
        Ok(members)
    }
}
