use std::sync::Arc;

use async_trait::async_trait;
use ldapsync_directory::query::merge_attributes;
use ldapsync_directory::{DirectorySearcher, RemoteEntry};
use tracing::instrument;

use super::{ActiveDirectoryStrategy, GroupGetter, GroupLister, MemberExtractor};
use crate::cache::CachedLookup;
use crate::config::AugmentedActiveDirectoryConfig;
use crate::error::SyncResult;

/// Active Directory membership plus first-class group entries.
///
/// Listing and membership come from the user scan; group entries (for
/// naming and existence) come from the groups query.
pub struct AugmentedActiveDirectoryStrategy {
    searcher: Arc<dyn DirectorySearcher>,
    membership: ActiveDirectoryStrategy,
    groups: CachedLookup,
}

impl AugmentedActiveDirectoryStrategy {
    pub fn new(
        config: &AugmentedActiveDirectoryConfig,
        searcher: Arc<dyn DirectorySearcher>,
    ) -> Self {
        let query_attribute = [config.groups_query.query_attribute.clone()];
        let group_attributes = merge_attributes([
            config.group_name_attributes.as_slice(),
            query_attribute.as_slice(),
        ]);
        Self {
            membership: ActiveDirectoryStrategy::new(&config.active_directory(), searcher.clone()),
            groups: CachedLookup::new(config.groups_query.clone(), group_attributes),
            searcher,
        }
    }
}

#[async_trait]
impl GroupLister for AugmentedActiveDirectoryStrategy {
    #[instrument(skip(self))]
    async fn list_groups(&self) -> SyncResult<Vec<String>> {
        self.membership.list_groups().await
    }
}

#[async_trait]
impl GroupGetter for AugmentedActiveDirectoryStrategy {
    #[instrument(skip(self))]
    async fn group_entry_for(&self, group_uid: &str) -> SyncResult<RemoteEntry> {
        Ok(self.groups.entry_for(self.searcher.as_ref(), group_uid).await?)
    }
}

#[async_trait]
impl MemberExtractor for AugmentedActiveDirectoryStrategy {
    #[instrument(skip(self))]
    async fn extract_members(&self, group_uid: &str) -> SyncResult<Vec<RemoteEntry>> {
        self.membership.extract_members(group_uid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::DetectorMode;
    use ldapsync_directory::{
        DirectoryError, DirectoryResult, QueryDescriptor, QueryOnAttribute, SearchRequest,
        SearchScope,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Directory {
        searches: AtomicUsize,
    }

    #[async_trait]
    impl DirectorySearcher for Directory {
        async fn search(&self, request: &SearchRequest) -> DirectoryResult<Vec<RemoteEntry>> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            if request.scope == SearchScope::Base {
                if request.base_dn == "cn=eng,ou=groups,dc=example,dc=com" {
                    return Ok(vec![
                        RemoteEntry::new(request.base_dn.clone()).with_attribute("cn", ["eng"])
                    ]);
                }
                return Err(DirectoryError::no_such_object(&request.base_dn));
            }
            Ok(vec![RemoteEntry::new("cn=alice,ou=users,dc=example,dc=com")
                .with_attribute("sAMAccountName", ["alice"])
                .with_attribute(
                    "memberOf",
                    [
                        "cn=eng,ou=groups,dc=example,dc=com",
                        "cn=gone,ou=groups,dc=example,dc=com",
                    ],
                )])
        }
    }

    fn config() -> AugmentedActiveDirectoryConfig {
        AugmentedActiveDirectoryConfig {
            all_users_query: QueryDescriptor::new("ou=users,dc=example,dc=com"),
            user_name_attributes: vec!["sAMAccountName".to_string()],
            group_membership_attributes: vec!["memberOf".to_string()],
            groups_query: QueryOnAttribute::new(
                QueryDescriptor::new("ou=groups,dc=example,dc=com"),
                "dn",
            ),
            group_name_attributes: vec!["cn".to_string()],
            existence_mode: DetectorMode::AllMustAgree,
        }
    }

    #[tokio::test]
    async fn test_groups_from_scan_entries_from_query() {
        let directory = Arc::new(Directory {
            searches: AtomicUsize::new(0),
        });
        let strategy = AugmentedActiveDirectoryStrategy::new(&config(), directory.clone());

        let groups = strategy.list_groups().await.unwrap();
        assert_eq!(
            groups,
            vec![
                "cn=eng,ou=groups,dc=example,dc=com".to_string(),
                "cn=gone,ou=groups,dc=example,dc=com".to_string(),
            ]
        );

        let entry = strategy
            .group_entry_for("cn=eng,ou=groups,dc=example,dc=com")
            .await
            .unwrap();
        assert_eq!(entry.first_value("cn"), Some("eng"));

        // Membership survives even though the group entry is gone.
        let members = strategy
            .extract_members("cn=gone,ou=groups,dc=example,dc=com")
            .await
            .unwrap();
        assert_eq!(members.len(), 1);
        assert!(strategy
            .group_entry_for("cn=gone,ou=groups,dc=example,dc=com")
            .await
            .unwrap_err()
            .is_benign());

        // One scan, one successful group lookup, one failed group lookup.
        assert_eq!(directory.searches.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_group_attributes() {
        let strategy = AugmentedActiveDirectoryStrategy::new(
            &config(),
            Arc::new(Directory {
                searches: AtomicUsize::new(0),
            }),
        );
        assert_eq!(strategy.groups.attributes(), &["cn".to_string()]);
    }
}
