//! Identity mapping
//!
//! Turns remote entries and identifiers into local user and group names.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use ldapsync_directory::query::DN_ATTRIBUTE;
use ldapsync_directory::RemoteEntry;

use crate::error::{SyncError, SyncResult};
use crate::schema::GroupGetter;

/// First non-empty value among `attributes`; `dn` means the entry's DN.
fn first_name(entry: &RemoteEntry, attributes: &[String]) -> Option<String> {
    attributes.iter().find_map(|attr| {
        let value = if attr.eq_ignore_ascii_case(DN_ATTRIBUTE) {
            Some(entry.dn())
        } else {
            entry
                .values(attr)
                .iter()
                .map(String::as_str)
                .find(|v| !v.is_empty())
        };
        value.filter(|v| !v.is_empty()).map(str::to_string)
    })
}

/// Names local users after an ordered list of candidate attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserNameMapper {
    attributes: Vec<String>,
}

impl UserNameMapper {
    pub fn new(attributes: Vec<String>) -> Self {
        Self { attributes }
    }

    pub fn name_for(&self, entry: &RemoteEntry) -> SyncResult<String> {
        first_name(entry, &self.attributes)
            .ok_or_else(|| SyncError::mapping(entry.dn(), &self.attributes))
    }
}

/// Maps a remote group identifier to a local group name.
#[async_trait]
pub trait GroupNameMapper: Send + Sync {
    async fn group_name_for(&self, group_uid: &str) -> SyncResult<String>;
}

/// Names the group after attributes of its own directory entry.
pub struct EntryAttributeGroupNameMapper {
    getter: Arc<dyn GroupGetter>,
    attributes: Vec<String>,
}

impl EntryAttributeGroupNameMapper {
    pub fn new(getter: Arc<dyn GroupGetter>, attributes: Vec<String>) -> Self {
        Self { getter, attributes }
    }
}

#[async_trait]
impl GroupNameMapper for EntryAttributeGroupNameMapper {
    async fn group_name_for(&self, group_uid: &str) -> SyncResult<String> {
        let entry = self.getter.group_entry_for(group_uid).await?;
        first_name(&entry, &self.attributes)
            .ok_or_else(|| SyncError::mapping(entry.dn(), &self.attributes))
    }
}

/// Static identifier to name table.
#[derive(Debug, Clone, Default)]
pub struct UserDefinedGroupNameMapper {
    names: BTreeMap<String, String>,
}

impl UserDefinedGroupNameMapper {
    pub fn new(names: BTreeMap<String, String>) -> Self {
        Self { names }
    }
}

#[async_trait]
impl GroupNameMapper for UserDefinedGroupNameMapper {
    async fn group_name_for(&self, group_uid: &str) -> SyncResult<String> {
        self.names
            .get(group_uid)
            .cloned()
            .ok_or_else(|| SyncError::unmapped_group(group_uid))
    }
}

/// The local name is the remote identifier itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentifierGroupNameMapper;

#[async_trait]
impl GroupNameMapper for IdentifierGroupNameMapper {
    async fn group_name_for(&self, group_uid: &str) -> SyncResult<String> {
        Ok(group_uid.to_string())
    }
}

/// Tries mappers in order and returns the first name found.
///
/// If every mapper fails, the last mapper's error is returned.
pub struct UnionGroupNameMapper {
    mappers: Vec<Arc<dyn GroupNameMapper>>,
}

impl UnionGroupNameMapper {
    pub fn new(mappers: Vec<Arc<dyn GroupNameMapper>>) -> Self {
        Self { mappers }
    }
}

#[async_trait]
impl GroupNameMapper for UnionGroupNameMapper {
    async fn group_name_for(&self, group_uid: &str) -> SyncResult<String> {
        let mut last_error = SyncError::unmapped_group(group_uid);
        for mapper in &self.mappers {
            match mapper.group_name_for(group_uid).await {
                Ok(name) => return Ok(name),
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldapsync_directory::DirectoryError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn alice() -> RemoteEntry {
        RemoteEntry::new("cn=alice,ou=users,dc=example,dc=com")
            .with_attribute("mail", [""])
            .with_attribute("uid", ["alice"])
    }

    fn attrs(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    struct Getter {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GroupGetter for Getter {
        async fn group_entry_for(&self, group_uid: &str) -> SyncResult<RemoteEntry> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if group_uid == "missing" {
                return Err(DirectoryError::entry_not_found("ou=groups", "(cn=missing)").into());
            }
            Ok(RemoteEntry::new(group_uid).with_attribute("cn", ["engineering"]))
        }
    }

    #[test]
    fn test_user_name_first_non_empty() {
        let mapper = UserNameMapper::new(attrs(&["mail", "uid"]));
        assert_eq!(mapper.name_for(&alice()).unwrap(), "alice");
    }

    #[test]
    fn test_user_name_dn_token() {
        let mapper = UserNameMapper::new(attrs(&["displayName", "DN"]));
        assert_eq!(
            mapper.name_for(&alice()).unwrap(),
            "cn=alice,ou=users,dc=example,dc=com"
        );
    }

    #[test]
    fn test_user_name_attribute_case_insensitive() {
        let mapper = UserNameMapper::new(attrs(&["UID"]));
        assert_eq!(mapper.name_for(&alice()).unwrap(), "alice");
    }

    #[test]
    fn test_user_name_unmappable() {
        let mapper = UserNameMapper::new(attrs(&["mail", "sAMAccountName"]));
        let err = mapper.name_for(&alice()).unwrap_err();
        assert!(matches!(
            err,
            SyncError::Mapping { ref dn, .. } if dn == "cn=alice,ou=users,dc=example,dc=com"
        ));
    }

    #[tokio::test]
    async fn test_entry_attribute_mapper() {
        let getter = Arc::new(Getter {
            calls: AtomicUsize::new(0),
        });
        let mapper = EntryAttributeGroupNameMapper::new(getter.clone(), attrs(&["cn"]));
        assert_eq!(mapper.group_name_for("cn=eng").await.unwrap(), "engineering");
        assert!(mapper.group_name_for("missing").await.unwrap_err().is_benign());

        let no_attr = EntryAttributeGroupNameMapper::new(getter, attrs(&["ou"]));
        assert!(matches!(
            no_attr.group_name_for("cn=eng").await.unwrap_err(),
            SyncError::Mapping { .. }
        ));
    }

    #[tokio::test]
    async fn test_user_defined_mapper() {
        let mapper = UserDefinedGroupNameMapper::new(BTreeMap::from([(
            "cn=admins".to_string(),
            "platform-admins".to_string(),
        )]));
        assert_eq!(mapper.group_name_for("cn=admins").await.unwrap(), "platform-admins");
        assert!(matches!(
            mapper.group_name_for("cn=eng").await.unwrap_err(),
            SyncError::UnmappedGroup { .. }
        ));
    }

    #[tokio::test]
    async fn test_union_prefers_user_defined() {
        let getter = Arc::new(Getter {
            calls: AtomicUsize::new(0),
        });
        let mapper = UnionGroupNameMapper::new(vec![
            Arc::new(UserDefinedGroupNameMapper::new(BTreeMap::from([(
                "cn=admins".to_string(),
                "platform-admins".to_string(),
            )]))),
            Arc::new(EntryAttributeGroupNameMapper::new(getter.clone(), attrs(&["cn"]))),
        ]);

        assert_eq!(mapper.group_name_for("cn=admins").await.unwrap(), "platform-admins");
        assert_eq!(getter.calls.load(Ordering::SeqCst), 0);

        assert_eq!(mapper.group_name_for("cn=eng").await.unwrap(), "engineering");
        assert_eq!(getter.calls.load(Ordering::SeqCst), 1);

        // The fallback's error is the one reported.
        assert!(mapper.group_name_for("missing").await.unwrap_err().is_benign());
    }

    #[tokio::test]
    async fn test_identifier_mapper() {
        assert_eq!(
            IdentifierGroupNameMapper
                .group_name_for("cn=eng,dc=example,dc=com")
                .await
                .unwrap(),
            "cn=eng,dc=example,dc=com"
        );
    }
}
