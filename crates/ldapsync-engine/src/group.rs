//! Local groups and the annotations that tie them to a directory.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use ldapsync_directory::LdapConfig;
use serde::{Deserialize, Serialize};

/// Annotation holding the `host:port` of the directory a group was synced from.
pub const SOURCE_URL_ANNOTATION: &str = "ldapsync.io/source-url";

/// Annotation holding the remote group identifier.
pub const REMOTE_UID_ANNOTATION: &str = "ldapsync.io/remote-uid";

/// Annotation holding the RFC 3339 time of the last sync.
pub const SYNC_TIME_ANNOTATION: &str = "ldapsync.io/sync-time";

/// Label holding the directory host, for cheap listing.
pub const SOURCE_HOST_LABEL: &str = "ldapsync.io/source-host";

/// The directory a run reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSource {
    /// `host:port`
    pub identity: String,
    pub host: String,
}

impl SyncSource {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        Self {
            identity: format!("{}:{}", host, port),
            host,
        }
    }
}

impl From<&LdapConfig> for SyncSource {
    fn from(config: &LdapConfig) -> Self {
        Self {
            identity: config.source_identity(),
            host: config.host.clone(),
        }
    }
}

/// A group in the local identity store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalGroup {
    pub name: String,

    /// Local user names, in directory order.
    #[serde(default)]
    pub users: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl LocalGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            users: Vec::new(),
            annotations: BTreeMap::new(),
            labels: BTreeMap::new(),
        }
    }

    pub fn source_identity(&self) -> Option<&str> {
        self.annotations.get(SOURCE_URL_ANNOTATION).map(String::as_str)
    }

    pub fn remote_uid(&self) -> Option<&str> {
        self.annotations.get(REMOTE_UID_ANNOTATION).map(String::as_str)
    }

    /// Time of the last sync, if the annotation is present and well formed.
    pub fn last_synced(&self) -> Option<DateTime<Utc>> {
        self.annotations
            .get(SYNC_TIME_ANNOTATION)
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
    }

    /// Check if the group was synced from `source`.
    ///
    /// Requires both the source and remote-id annotations; a group carrying
    /// only one of them was not written by a sync run.
    pub fn is_synced_from(&self, source: &SyncSource) -> bool {
        self.remote_uid().is_some() && self.source_identity() == Some(source.identity.as_str())
    }

    /// Check if this group is the local copy of `remote_uid` from `source`.
    pub fn is_owned_by(&self, source: &SyncSource, remote_uid: &str) -> bool {
        self.source_identity() == Some(source.identity.as_str())
            && self.remote_uid() == Some(remote_uid)
    }

    /// Replace membership and record where it came from.
    pub fn stamp(
        &mut self,
        source: &SyncSource,
        remote_uid: &str,
        users: Vec<String>,
        synced_at: DateTime<Utc>,
    ) {
        self.users = users;
        self.annotations
            .insert(SOURCE_URL_ANNOTATION.to_string(), source.identity.clone());
        self.annotations
            .insert(REMOTE_UID_ANNOTATION.to_string(), remote_uid.to_string());
        self.annotations.insert(
            SYNC_TIME_ANNOTATION.to_string(),
            synced_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        self.labels
            .insert(SOURCE_HOST_LABEL.to_string(), source.host.clone());
    }
}
