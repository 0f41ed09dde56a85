//! Group existence detection.
//!
//! Prune uses a detector to decide whether a remote group is gone. Failures
//! that only say "absent" count as `false`; anything else is returned.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SyncResult;
use crate::schema::{GroupGetter, MemberExtractor};

/// Decides whether a remote group still exists.
#[async_trait]
pub trait GroupDetector: Send + Sync {
    async fn exists(&self, group_uid: &str) -> SyncResult<bool>;
}

/// Map a benign lookup failure to "does not exist".
fn absent_if_benign<T>(group_uid: &str, result: SyncResult<T>) -> SyncResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_benign() => {
            debug!(group_uid = %group_uid, reason = %e, "Group not found in directory");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// A group exists if its entry can be fetched.
pub struct GroupBasedDetector {
    getter: Arc<dyn GroupGetter>,
}

impl GroupBasedDetector {
    pub fn new(getter: Arc<dyn GroupGetter>) -> Self {
        Self { getter }
    }
}

#[async_trait]
impl GroupDetector for GroupBasedDetector {
    async fn exists(&self, group_uid: &str) -> SyncResult<bool> {
        let entry = absent_if_benign(group_uid, self.getter.group_entry_for(group_uid).await)?;
        Ok(entry.is_some())
    }
}

/// A group exists if it has at least one member.
pub struct MemberBasedDetector {
    extractor: Arc<dyn MemberExtractor>,
}

impl MemberBasedDetector {
    pub fn new(extractor: Arc<dyn MemberExtractor>) -> Self {
        Self { extractor }
    }
}

#[async_trait]
impl GroupDetector for MemberBasedDetector {
    async fn exists(&self, group_uid: &str) -> SyncResult<bool> {
        let members =
            absent_if_benign(group_uid, self.extractor.extract_members(group_uid).await)?;
        Ok(members.is_some_and(|m| !m.is_empty()))
    }
}

/// How a [`CompoundDetector`] combines its detectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorMode {
    /// Exists only if every detector says so.
    AllMustAgree,
    /// Exists if any detector says so.
    AnyMayAgree,
}

/// Combines detectors under an explicit [`DetectorMode`].
///
/// Detectors run in order and evaluation stops as soon as the outcome is
/// known. A non-benign error from any detector aborts the check. With no
/// detectors the group does not exist.
pub struct CompoundDetector {
    mode: DetectorMode,
    detectors: Vec<Arc<dyn GroupDetector>>,
}

impl CompoundDetector {
    pub fn new(mode: DetectorMode, detectors: Vec<Arc<dyn GroupDetector>>) -> Self {
        Self { mode, detectors }
    }

    pub fn mode(&self) -> DetectorMode {
        self.mode
    }
}

#[async_trait]
impl GroupDetector for CompoundDetector {
    async fn exists(&self, group_uid: &str) -> SyncResult<bool> {
        if self.detectors.is_empty() {
            return Ok(false);
        }

        for detector in &self.detectors {
            let exists = detector.exists(group_uid).await?;
            match (self.mode, exists) {
                (DetectorMode::AllMustAgree, false) => return Ok(false),
                (DetectorMode::AnyMayAgree, true) => return Ok(true),
                _ => {}
            }
        }

        Ok(self.mode == DetectorMode::AllMustAgree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use ldapsync_directory::{DirectoryError, RemoteEntry};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Getter and extractor that fail with a fixed error, or succeed.
    struct Stub {
        error: Option<fn() -> DirectoryError>,
        members: usize,
    }

    #[async_trait]
    impl GroupGetter for Stub {
        async fn group_entry_for(&self, group_uid: &str) -> SyncResult<RemoteEntry> {
            match self.error {
                Some(make) => Err(make().into()),
                None => Ok(RemoteEntry::new(group_uid)),
            }
        }
    }

    #[async_trait]
    impl MemberExtractor for Stub {
        async fn extract_members(&self, _group_uid: &str) -> SyncResult<Vec<RemoteEntry>> {
            match self.error {
                Some(make) => Err(make().into()),
                None => Ok(vec![RemoteEntry::new("cn=alice,dc=example,dc=com"); self.members]),
            }
        }
    }

    struct Fixed {
        answer: SyncResult<bool>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(answer: SyncResult<bool>) -> Arc<Self> {
            Arc::new(Self {
                answer,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GroupDetector for Fixed {
        async fn exists(&self, _group_uid: &str) -> SyncResult<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.answer {
                Ok(b) => Ok(*b),
                Err(_) => Err(SyncError::from(DirectoryError::connection_failed("refused"))),
            }
        }
    }

    fn benign_errors() -> Vec<fn() -> DirectoryError> {
        vec![
            || DirectoryError::no_such_object("ou=groups,dc=example,dc=com"),
            || DirectoryError::entry_not_found("ou=groups,dc=example,dc=com", "(cn=eng)"),
            || DirectoryError::out_of_bounds("cn=eng,dc=other", "dc=example,dc=com"),
        ]
    }

    #[tokio::test]
    async fn test_group_based_benign_errors_mean_absent() {
        for make in benign_errors() {
            let detector = GroupBasedDetector::new(Arc::new(Stub {
                error: Some(make),
                members: 0,
            }));
            assert!(!detector.exists("cn=eng").await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_group_based_other_errors_propagate() {
        let detector = GroupBasedDetector::new(Arc::new(Stub {
            error: Some(|| DirectoryError::search_failed("time limit exceeded")),
            members: 0,
        }));
        let err = detector.exists("cn=eng").await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Directory(DirectoryError::SearchFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_group_based_found() {
        let detector = GroupBasedDetector::new(Arc::new(Stub {
            error: None,
            members: 0,
        }));
        assert!(detector.exists("cn=eng").await.unwrap());
    }

    #[tokio::test]
    async fn test_member_based() {
        let with_members = MemberBasedDetector::new(Arc::new(Stub {
            error: None,
            members: 2,
        }));
        assert!(with_members.exists("eng").await.unwrap());

        let empty = MemberBasedDetector::new(Arc::new(Stub {
            error: None,
            members: 0,
        }));
        assert!(!empty.exists("eng").await.unwrap());

        for make in benign_errors() {
            let detector = MemberBasedDetector::new(Arc::new(Stub {
                error: Some(make),
                members: 0,
            }));
            assert!(!detector.exists("eng").await.unwrap());
        }

        let failing = MemberBasedDetector::new(Arc::new(Stub {
            error: Some(|| DirectoryError::connection_failed("refused")),
            members: 0,
        }));
        assert!(failing.exists("eng").await.is_err());
    }

    #[tokio::test]
    async fn test_compound_all_must_agree() {
        let yes = Fixed::new(Ok(true));
        let no = Fixed::new(Ok(false));
        let after = Fixed::new(Ok(true));
        let detector = CompoundDetector::new(
            DetectorMode::AllMustAgree,
            vec![yes.clone(), no.clone(), after.clone()],
        );

        assert!(!detector.exists("eng").await.unwrap());
        assert_eq!(after.calls(), 0);

        let all_yes = CompoundDetector::new(
            DetectorMode::AllMustAgree,
            vec![Fixed::new(Ok(true)), Fixed::new(Ok(true))],
        );
        assert!(all_yes.exists("eng").await.unwrap());
    }

    #[tokio::test]
    async fn test_compound_any_may_agree() {
        let no = Fixed::new(Ok(false));
        let yes = Fixed::new(Ok(true));
        let after = Fixed::new(Ok(false));
        let detector = CompoundDetector::new(
            DetectorMode::AnyMayAgree,
            vec![no.clone(), yes.clone(), after.clone()],
        );

        assert!(detector.exists("eng").await.unwrap());
        assert_eq!(after.calls(), 0);

        let all_no = CompoundDetector::new(
            DetectorMode::AnyMayAgree,
            vec![Fixed::new(Ok(false)), Fixed::new(Ok(false))],
        );
        assert!(!all_no.exists("eng").await.unwrap());
    }

    #[tokio::test]
    async fn test_compound_empty_is_false() {
        for mode in [DetectorMode::AllMustAgree, DetectorMode::AnyMayAgree] {
            let detector = CompoundDetector::new(mode, vec![]);
            assert!(!detector.exists("eng").await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_compound_error_aborts() {
        let failing = Fixed::new(Err(SyncError::configuration("unused")));
        let after = Fixed::new(Ok(true));
        let detector = CompoundDetector::new(
            DetectorMode::AnyMayAgree,
            vec![Fixed::new(Ok(false)), failing, after.clone()],
        );

        assert!(detector.exists("eng").await.is_err());
        assert_eq!(after.calls(), 0);
    }
}
