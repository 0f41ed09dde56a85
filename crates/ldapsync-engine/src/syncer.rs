//! Sync orchestrator.
//!
//! Mirrors remote group membership into local groups. Each group is handled
//! independently: a failure is recorded and the run moves on. Sync never
//! deletes local groups.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{AggregateError, SyncError, SyncResult};
use crate::group::{LocalGroup, SyncSource};
use crate::mapping::{GroupNameMapper, UserNameMapper};
use crate::schema::{GroupLister, MemberExtractor};
use crate::store::GroupStore;

/// What happened to one written group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Created,
    Updated,
}

/// A group written (or, in a dry run, that would have been written).
#[derive(Debug, Clone, Serialize)]
pub struct SyncedGroup {
    pub action: SyncAction,
    pub group: LocalGroup,
}

/// Outcome of one sync run.
#[derive(Debug, Serialize)]
pub struct SyncReport {
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Remote groups returned by the lister.
    pub listed: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    /// True if the run stopped early on cancellation.
    pub cancelled: bool,
    /// Written groups, in processing order.
    pub groups: Vec<SyncedGroup>,
    pub errors: AggregateError,
}

impl SyncReport {
    fn new(dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            dry_run,
            started_at: now,
            completed_at: now,
            listed: 0,
            created: 0,
            updated: 0,
            failed: 0,
            cancelled: false,
            groups: Vec::new(),
            errors: AggregateError::new(),
        }
    }

    /// True if every listed group that was processed succeeded.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Drives one sync run.
pub struct GroupSyncer {
    lister: Arc<dyn GroupLister>,
    extractor: Arc<dyn MemberExtractor>,
    user_name_mapper: UserNameMapper,
    group_name_mapper: Arc<dyn GroupNameMapper>,
    store: Arc<dyn GroupStore>,
    source: SyncSource,
    dry_run: bool,
}

impl GroupSyncer {
    pub fn new(
        lister: Arc<dyn GroupLister>,
        extractor: Arc<dyn MemberExtractor>,
        user_name_mapper: UserNameMapper,
        group_name_mapper: Arc<dyn GroupNameMapper>,
        store: Arc<dyn GroupStore>,
        source: SyncSource,
    ) -> Self {
        Self {
            lister,
            extractor,
            user_name_mapper,
            group_name_mapper,
            store,
            source,
            dry_run: false,
        }
    }

    /// Compute everything but skip writes.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sync every listed group.
    ///
    /// Fails only if the lister fails; per-group failures are collected in
    /// the report.
    #[instrument(skip(self, cancel), fields(source = %self.source.identity, dry_run = self.dry_run))]
    pub async fn sync(&self, cancel: &CancellationToken) -> SyncResult<SyncReport> {
        let mut report = SyncReport::new(self.dry_run);

        let group_uids = self.lister.list_groups().await?;
        report.listed = group_uids.len();
        info!(count = group_uids.len(), "Syncing groups");

        for group_uid in &group_uids {
            if cancel.is_cancelled() {
                warn!("Sync cancelled, remaining groups skipped");
                report.cancelled = true;
                break;
            }

            match self.sync_group(group_uid).await {
                Ok(synced) => {
                    match synced.action {
                        SyncAction::Created => report.created += 1,
                        SyncAction::Updated => report.updated += 1,
                    }
                    info!(
                        group_uid = %group_uid,
                        group = %synced.group.name,
                        members = synced.group.users.len(),
                        action = ?synced.action,
                        dry_run = self.dry_run,
                        "Group synced"
                    );
                    report.groups.push(synced);
                }
                Err(e) => {
                    warn!(group_uid = %group_uid, error = %e, "Group sync failed");
                    report.failed += 1;
                    report.errors.push(e);
                }
            }
        }

        report.completed_at = Utc::now();
        Ok(report)
    }

    async fn sync_group(&self, group_uid: &str) -> SyncResult<SyncedGroup> {
        let members = self.extractor.extract_members(group_uid).await?;

        let users = members
            .iter()
            .map(|entry| self.user_name_mapper.name_for(entry))
            .collect::<SyncResult<Vec<String>>>()?;

        let name = self.group_name_mapper.group_name_for(group_uid).await?;
        debug!(group_uid = %group_uid, group = %name, "Resolved local group name");

        let (mut group, action) = match self.store.get(&name).await? {
            Some(existing) => {
                if !existing.is_owned_by(&self.source, group_uid) {
                    return Err(SyncError::Conflict {
                        group: name,
                        expected_source: self.source.identity.clone(),
                        expected_uid: group_uid.to_string(),
                        found_source: existing.source_identity().map(str::to_string),
                        found_uid: existing.remote_uid().map(str::to_string),
                    });
                }
                (existing, SyncAction::Updated)
            }
            None => (LocalGroup::new(name), SyncAction::Created),
        };

        group.stamp(&self.source, group_uid, users, Utc::now());

        if !self.dry_run {
            match action {
                SyncAction::Created => self.store.create(group.clone()).await?,
                SyncAction::Updated => self.store.update(group.clone()).await?,
            }
        }

        Ok(SyncedGroup { action, group })
    }
}
