//! Sync error types.

use std::fmt;

use ldapsync_directory::DirectoryError;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur while synchronizing or pruning a group.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Directory query failed.
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// A member of a group could not be resolved and the failure was not suppressed.
    #[error("could not look up member {member_uid:?} of group {group_uid:?}: {source}")]
    MemberLookup {
        group_uid: String,
        member_uid: String,
        #[source]
        source: DirectoryError,
    },

    /// No candidate attribute yielded a name for an entry.
    #[error("no name for entry {dn:?}: none of the attributes {attributes:?} has a value")]
    Mapping { dn: String, attributes: Vec<String> },

    /// No mapper knows a local name for a remote group.
    #[error("no local group name known for remote group {group_uid:?}")]
    UnmappedGroup { group_uid: String },

    /// The local group belongs to another source or remote group.
    #[error(
        "group {group:?} is already synced from {found_source:?} (remote id {found_uid:?}), refusing to overwrite with {expected_source:?} (remote id {expected_uid:?})"
    )]
    Conflict {
        group: String,
        expected_source: String,
        expected_uid: String,
        found_source: Option<String>,
        found_uid: Option<String>,
    },

    /// A named local group was not synced from this source.
    #[error("group {group:?} was not synced from {source_identity:?}")]
    NotSyncedFromSource {
        group: String,
        source_identity: String,
    },

    /// Local group store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl SyncError {
    /// Create a mapping error.
    pub fn mapping(dn: impl Into<String>, attributes: &[String]) -> Self {
        Self::Mapping {
            dn: dn.into(),
            attributes: attributes.to_vec(),
        }
    }

    /// Create an unmapped group error.
    pub fn unmapped_group(group_uid: impl Into<String>) -> Self {
        Self::UnmappedGroup {
            group_uid: group_uid.into(),
        }
    }

    /// Create a member lookup error.
    pub fn member_lookup(
        group_uid: impl Into<String>,
        member_uid: impl Into<String>,
        source: DirectoryError,
    ) -> Self {
        Self::MemberLookup {
            group_uid: group_uid.into(),
            member_uid: member_uid.into(),
            source,
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Check if this error only says the remote group is absent.
    ///
    /// Only direct directory failures qualify; member lookups that reach the
    /// caller were already judged fatal by the member error handlers.
    pub fn is_benign(&self) -> bool {
        matches!(self, SyncError::Directory(e) if e.is_benign())
    }

    /// Check if this error indicates a conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, SyncError::Conflict { .. })
    }

    /// Check if this error came from the local store.
    pub fn is_store(&self) -> bool {
        matches!(self, SyncError::Store(_))
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// All per-group failures of one run, in the order they happened.
#[derive(Debug, Default)]
pub struct AggregateError {
    errors: Vec<SyncError>,
}

impl AggregateError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: SyncError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SyncError> {
        self.errors.iter()
    }

    pub fn into_inner(self) -> Vec<SyncError> {
        self.errors
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.len() {
            0 => write!(f, "no errors"),
            1 => write!(f, "{}", self.errors[0]),
            n => {
                write!(f, "{} errors occurred:", n)?;
                for err in &self.errors {
                    write!(f, "\n  * {}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for AggregateError {}

impl From<Vec<SyncError>> for AggregateError {
    fn from(errors: Vec<SyncError>) -> Self {
        Self { errors }
    }
}

impl Serialize for AggregateError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.errors.iter().map(ToString::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::mapping("cn=alice,dc=example,dc=com", &["uid".to_string()]);
        assert!(err.to_string().contains("cn=alice,dc=example,dc=com"));
        assert!(err.to_string().contains("uid"));

        let err = SyncError::member_lookup(
            "cn=eng,dc=example,dc=com",
            "cn=bob,dc=example,dc=com",
            DirectoryError::connection_failed("refused"),
        );
        assert!(err.to_string().contains("cn=bob,dc=example,dc=com"));
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn test_is_benign() {
        assert!(SyncError::from(DirectoryError::no_such_object("dc=example,dc=com")).is_benign());
        assert!(!SyncError::from(DirectoryError::connection_failed("refused")).is_benign());
        // An unsuppressed member failure is fatal for its group even if the
        // underlying directory error is benign.
        assert!(!SyncError::member_lookup(
            "g",
            "m",
            DirectoryError::entry_not_found("dc=example,dc=com", "(uid=m)")
        )
        .is_benign());
    }

    #[test]
    fn test_aggregate_display() {
        let mut agg = AggregateError::new();
        assert_eq!(agg.to_string(), "no errors");

        agg.push(SyncError::unmapped_group("a"));
        assert_eq!(agg.to_string(), SyncError::unmapped_group("a").to_string());

        agg.push(SyncError::unmapped_group("b"));
        let text = agg.to_string();
        assert!(text.starts_with("2 errors occurred:"));
        assert!(text.contains("\"a\""));
        assert!(text.contains("\"b\""));
    }

    #[test]
    fn test_aggregate_serializes_messages() {
        let agg = AggregateError::from(vec![SyncError::configuration("bad")]);
        let json = serde_json::to_value(&agg).unwrap();
        assert_eq!(json, serde_json::json!(["Configuration error: bad"]));
    }
}
