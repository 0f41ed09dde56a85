use std::sync::Arc;

use async_trait::async_trait;
use ldapsync_directory::query::merge_attributes;
use ldapsync_directory::searcher::query_for_entries;
use ldapsync_directory::{DirectoryResult, DirectorySearcher, RemoteEntry};
use tracing::{debug, instrument};

use super::{GroupGetter, GroupLister, MemberExtractor};
use crate::cache::CachedLookup;
use crate::config::Rfc2307Config;
use crate::error::{SyncError, SyncResult};
use crate::error_handler::CompoundErrorHandler;

/// RFC 2307 directories: group entries list their members by identifier.
pub struct Rfc2307Strategy {
    searcher: Arc<dyn DirectorySearcher>,
    groups: CachedLookup,
    users: CachedLookup,
    group_membership_attributes: Vec<String>,
    error_handler: CompoundErrorHandler,
}

impl Rfc2307Strategy {
    pub fn new(config: &Rfc2307Config, searcher: Arc<dyn DirectorySearcher>) -> Self {
        let group_query_attribute = [config.groups_query.query_attribute.clone()];
        let group_attributes = merge_attributes([
            config.group_name_attributes.as_slice(),
            config.group_membership_attributes.as_slice(),
            group_query_attribute.as_slice(),
        ]);

        let user_query_attribute = [config.users_query.query_attribute.clone()];
        let user_attributes = merge_attributes([
            config.user_name_attributes.as_slice(),
            user_query_attribute.as_slice(),
        ]);

        Self {
            searcher,
            groups: CachedLookup::new(config.groups_query.clone(), group_attributes),
            users: CachedLookup::new(config.users_query.clone(), user_attributes),
            group_membership_attributes: config.group_membership_attributes.clone(),
            error_handler: CompoundErrorHandler::from_tolerances(
                config.tolerate_member_not_found_errors,
                config.tolerate_member_out_of_scope_errors,
            ),
        }
    }

    async fn user_entry_for(&self, member_uid: &str) -> DirectoryResult<RemoteEntry> {
        self.users.entry_for(self.searcher.as_ref(), member_uid).await
    }

    /// Remote identifier of a group entry returned by the groups query.
    fn group_uid_of(&self, entry: &RemoteEntry) -> SyncResult<String> {
        let query = self.groups.query();
        if query.is_dn_query() {
            return Ok(entry.dn().to_string());
        }
        entry
            .first_value(&query.query_attribute)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                SyncError::mapping(entry.dn(), std::slice::from_ref(&query.query_attribute))
            })
    }
}

#[async_trait]
impl GroupLister for Rfc2307Strategy {
    #[instrument(skip(self))]
    async fn list_groups(&self) -> SyncResult<Vec<String>> {
        let request = self
            .groups
            .query()
            .search_request(self.groups.attributes().to_vec());
        let entries = query_for_entries(self.searcher.as_ref(), &request).await?;

        let mut uids = Vec::with_capacity(entries.len());
        for entry in entries {
            let uid = self.group_uid_of(&entry)?;
            self.groups.remember(uid.clone(), entry).await;
            uids.push(uid);
        }

        debug!(count = uids.len(), "Listed groups");
        Ok(uids)
    }
}

#[async_trait]
impl GroupGetter for Rfc2307Strategy {
    async fn group_entry_for(&self, group_uid: &str) -> SyncResult<RemoteEntry> {
        Ok(self.groups.entry_for(self.searcher.as_ref(), group_uid).await?)
    }
}

#[async_trait]
impl MemberExtractor for Rfc2307Strategy {
    #[instrument(skip(self))]
    async fn extract_members(&self, group_uid: &str) -> SyncResult<Vec<RemoteEntry>> {
        let group = self.group_entry_for(group_uid).await?;

        let member_uids: Vec<String> = self
            .group_membership_attributes
            .iter()
            .flat_map(|attr| group.values(attr).iter().cloned())
            .collect();

        let mut members = Vec::with_capacity(member_uids.len());
        for member_uid in &member_uids {
            match self.user_entry_for(member_uid).await {
                Ok(entry) => members.push(entry),
                Err(e) => {
                    self.error_handler
                        .check(group_uid, member_uid, e)
                        .map_err(|e| SyncError::member_lookup(group_uid, member_uid.as_str(), e))?;
                }
            }
        }

        debug!(
            group_uid = %group_uid,
            listed = member_uids.len(),
            resolved = members.len(),
            "Extracted group members"
        );
        Ok(members)
    }
}
