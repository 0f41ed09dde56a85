//! # Directory Group Synchronization Engine
//!
//! Mirrors group membership from an LDAP directory into a local group store.
//!
//! This crate provides:
//! - Schema strategies for RFC 2307, Active Directory and augmented Active
//!   Directory layouts, each with a per-run entry cache
//! - Member lookup error handlers that turn benign failures into skips
//! - Group existence detectors used by prune
//! - User and group name mapping
//! - The sync and prune orchestrators
//! - Local group stores (in-memory and JSON file)
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌─────────────────┐     ┌──────────────┐
//! │ GroupLister  │────►│   GroupSyncer   │────►│  GroupStore  │
//! └──────────────┘     └────────┬────────┘     └──────────────┘
//!                               │
//!          ┌────────────────────┼────────────────────┐
//!          ▼                    ▼                    ▼
//!  ┌───────────────┐   ┌─────────────────┐   ┌────────────────┐
//!  │MemberExtractor│   │ UserNameMapper  │   │GroupNameMapper │
//!  └───────┬───────┘   └─────────────────┘   └────────────────┘
//!          │
//!          ▼
//!  ┌─────────────────┐
//!  │DirectorySearcher│
//!  └─────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ldapsync_directory::LdapClient;
//! use ldapsync_engine::{GroupSyncer, JsonFileGroupStore, SchemaBundle, SyncConfig, SyncSource};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = SyncConfig::from_file("sync.yaml").await?;
//! let client = Arc::new(LdapClient::new(config.connection.clone())?);
//! let bundle = SchemaBundle::build(&config.schema, &config.group_uid_name_mapping, client);
//!
//! let syncer = GroupSyncer::new(
//!     bundle.group_lister,
//!     bundle.member_extractor,
//!     bundle.user_name_mapper,
//!     bundle.group_name_mapper,
//!     Arc::new(JsonFileGroupStore::new("groups.json")),
//!     SyncSource::from(&config.connection),
//! );
//! let report = syncer.sync(&CancellationToken::new()).await?;
//! ```

pub mod cache;
pub mod config;
pub mod detector;
pub mod error;
pub mod error_handler;
pub mod group;
pub mod listers;
pub mod mapping;
pub mod pruner;
pub mod schema;
pub mod store;
pub mod syncer;

pub use config::{ConfigError, SchemaConfig, SyncConfig};
pub use detector::{CompoundDetector, DetectorMode, GroupDetector};
pub use error::{AggregateError, SyncError, SyncResult};
pub use group::{LocalGroup, SyncSource};
pub use listers::{BlacklistGroupLister, LocalGroupLister, WhitelistGroupLister};
pub use mapping::{GroupNameMapper, UserNameMapper};
pub use pruner::{GroupPruner, PruneReport};
pub use schema::{GroupGetter, GroupLister, MemberExtractor, SchemaBundle};
pub use store::{GroupStore, InMemoryGroupStore, JsonFileGroupStore, StoreError};
pub use syncer::{GroupSyncer, SyncReport};
