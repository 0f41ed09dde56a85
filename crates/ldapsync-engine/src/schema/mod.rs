//! Directory schema strategies
//!
//! Each supported directory layout answers three questions about remote
//! groups, one trait per question:
//!
//! - [`GroupLister`] - which groups are there?
//! - [`GroupGetter`] - what is the entry for this group?
//! - [`MemberExtractor`] - which user entries are members of this group?
//!
//! | schema | lister | getter | extractor | existence |
//! |---|---|---|---|---|
//! | RFC 2307 | groups query | groups query | membership attribute on the group | group entry |
//! | Active Directory | user scan | - | membership attribute on users | has members |
//! | Augmented AD | user scan | groups query | membership attribute on users | both, per `existence_mode` |
//!
//! [`SchemaBundle::build`] wires a fresh strategy (with fresh caches) for
//! one run from a [`SchemaConfig`].

mod active_directory;
mod augmented;
mod rfc2307;

pub use active_directory::ActiveDirectoryStrategy;
pub use augmented::AugmentedActiveDirectoryStrategy;
pub use rfc2307::Rfc2307Strategy;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use ldapsync_directory::{DirectorySearcher, RemoteEntry};

use crate::config::SchemaConfig;
use crate::detector::{
    CompoundDetector, GroupBasedDetector, GroupDetector, MemberBasedDetector,
};
use crate::error::SyncResult;
use crate::mapping::{
    EntryAttributeGroupNameMapper, GroupNameMapper, IdentifierGroupNameMapper,
    UnionGroupNameMapper, UserDefinedGroupNameMapper, UserNameMapper,
};

/// Lists remote group identifiers.
#[async_trait]
pub trait GroupLister: Send + Sync {
    async fn list_groups(&self) -> SyncResult<Vec<String>>;
}

/// Fetches the entry for a remote group.
#[async_trait]
pub trait GroupGetter: Send + Sync {
    async fn group_entry_for(&self, group_uid: &str) -> SyncResult<RemoteEntry>;
}

/// Resolves the user entries that are members of a remote group.
#[async_trait]
pub trait MemberExtractor: Send + Sync {
    async fn extract_members(&self, group_uid: &str) -> SyncResult<Vec<RemoteEntry>>;
}

/// Everything a sync or prune run needs from the directory side.
///
/// All trait objects of one bundle share a single strategy instance, and so
/// its caches.
#[derive(Clone)]
pub struct SchemaBundle {
    pub group_lister: Arc<dyn GroupLister>,
    pub member_extractor: Arc<dyn MemberExtractor>,
    /// `None` for Active Directory, which has no group entries.
    pub group_getter: Option<Arc<dyn GroupGetter>>,
    pub detector: Arc<dyn GroupDetector>,
    pub group_name_mapper: Arc<dyn GroupNameMapper>,
    pub user_name_mapper: UserNameMapper,
}

impl SchemaBundle {
    /// Build a fresh strategy for one run.
    pub fn build(
        schema: &SchemaConfig,
        group_uid_name_mapping: &BTreeMap<String, String>,
        searcher: Arc<dyn DirectorySearcher>,
    ) -> Self {
        match schema {
            SchemaConfig::Rfc2307(config) => {
                let strategy = Arc::new(Rfc2307Strategy::new(config, searcher));
                let getter: Arc<dyn GroupGetter> = strategy.clone();
                let name_mapper = with_user_defined(
                    group_uid_name_mapping,
                    Arc::new(EntryAttributeGroupNameMapper::new(
                        getter.clone(),
                        config.group_name_attributes.clone(),
                    )),
                );
                Self {
                    group_lister: strategy.clone(),
                    member_extractor: strategy,
                    group_getter: Some(getter.clone()),
                    detector: Arc::new(GroupBasedDetector::new(getter)),
                    group_name_mapper: name_mapper,
                    user_name_mapper: UserNameMapper::new(config.user_name_attributes.clone()),
                }
            }
            SchemaConfig::ActiveDirectory(config) => {
                let strategy = Arc::new(ActiveDirectoryStrategy::new(config, searcher));
                let extractor: Arc<dyn MemberExtractor> = strategy.clone();
                Self {
                    group_lister: strategy,
                    member_extractor: extractor.clone(),
                    group_getter: None,
                    detector: Arc::new(MemberBasedDetector::new(extractor)),
                    group_name_mapper: with_user_defined(
                        group_uid_name_mapping,
                        Arc::new(IdentifierGroupNameMapper),
                    ),
                    user_name_mapper: UserNameMapper::new(config.user_name_attributes.clone()),
                }
            }
            SchemaConfig::AugmentedActiveDirectory(config) => {
                let strategy = Arc::new(AugmentedActiveDirectoryStrategy::new(config, searcher));
                let getter: Arc<dyn GroupGetter> = strategy.clone();
                let extractor: Arc<dyn MemberExtractor> = strategy.clone();
                let detectors: Vec<Arc<dyn GroupDetector>> = vec![
                    Arc::new(GroupBasedDetector::new(getter.clone())),
                    Arc::new(MemberBasedDetector::new(extractor.clone())),
                ];
                let detector = CompoundDetector::new(config.existence_mode, detectors);
                let name_mapper = with_user_defined(
                    group_uid_name_mapping,
                    Arc::new(EntryAttributeGroupNameMapper::new(
                        getter.clone(),
                        config.group_name_attributes.clone(),
                    )),
                );
                Self {
                    group_lister: strategy,
                    member_extractor: extractor,
                    group_getter: Some(getter),
                    detector: Arc::new(detector),
                    group_name_mapper: name_mapper,
                    user_name_mapper: UserNameMapper::new(config.user_name_attributes.clone()),
                }
            }
        }
    }
}

/// Consult the static table first when one is configured.
fn with_user_defined(
    names: &BTreeMap<String, String>,
    fallback: Arc<dyn GroupNameMapper>,
) -> Arc<dyn GroupNameMapper> {
    if names.is_empty() {
        return fallback;
    }
    Arc::new(UnionGroupNameMapper::new(vec![
        Arc::new(UserDefinedGroupNameMapper::new(names.clone())),
        fallback,
    ]))
}
