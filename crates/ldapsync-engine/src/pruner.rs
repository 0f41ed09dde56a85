//! Prune orchestrator.
//!
//! Deletes local groups whose remote group no longer exists. Deletions are
//! applied one at a time; a later failure does not undo earlier ones.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::detector::GroupDetector;
use crate::error::{AggregateError, SyncResult};
use crate::mapping::GroupNameMapper;
use crate::schema::GroupLister;
use crate::store::GroupStore;

/// Outcome of one prune run.
#[derive(Debug, Serialize)]
pub struct PruneReport {
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Candidate remote groups returned by the lister.
    pub listed: usize,
    /// Groups whose remote counterpart still exists.
    pub kept: usize,
    /// Local names of deleted groups (or groups that would be deleted).
    pub pruned: Vec<String>,
    pub failed: usize,
    pub cancelled: bool,
    pub errors: AggregateError,
}

impl PruneReport {
    fn new(dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            dry_run,
            started_at: now,
            completed_at: now,
            listed: 0,
            kept: 0,
            pruned: Vec::new(),
            failed: 0,
            cancelled: false,
            errors: AggregateError::new(),
        }
    }

    /// One line per pruned group, `group/<name> deleted` or
    /// `group/<name> would be deleted`.
    pub fn transcript(&self) -> Vec<String> {
        self.pruned
            .iter()
            .map(|name| transcript_line(name, self.dry_run))
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

fn transcript_line(name: &str, dry_run: bool) -> String {
    if dry_run {
        format!("group/{} would be deleted", name)
    } else {
        format!("group/{} deleted", name)
    }
}

/// Drives one prune run.
pub struct GroupPruner {
    lister: Arc<dyn GroupLister>,
    detector: Arc<dyn GroupDetector>,
    group_name_mapper: Arc<dyn GroupNameMapper>,
    store: Arc<dyn GroupStore>,
    dry_run: bool,
}

impl GroupPruner {
    pub fn new(
        lister: Arc<dyn GroupLister>,
        detector: Arc<dyn GroupDetector>,
        group_name_mapper: Arc<dyn GroupNameMapper>,
        store: Arc<dyn GroupStore>,
    ) -> Self {
        Self {
            lister,
            detector,
            group_name_mapper,
            store,
            dry_run: false,
        }
    }

    /// Report what would be deleted without deleting it.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Prune every listed group that no longer exists remotely.
    #[instrument(skip(self, cancel), fields(dry_run = self.dry_run))]
    pub async fn prune(&self, cancel: &CancellationToken) -> SyncResult<PruneReport> {
        let mut report = PruneReport::new(self.dry_run);

        let group_uids = self.lister.list_groups().await?;
        report.listed = group_uids.len();
        info!(count = group_uids.len(), "Checking groups for pruning");

        for group_uid in &group_uids {
            if cancel.is_cancelled() {
                warn!("Prune cancelled, remaining groups skipped");
                report.cancelled = true;
                break;
            }

            match self.prune_group(group_uid).await {
                Ok(Some(name)) => {
                    info!(
                        group_uid = %group_uid,
                        "{}",
                        transcript_line(&name, self.dry_run)
                    );
                    report.pruned.push(name);
                }
                Ok(None) => report.kept += 1,
                Err(e) => {
                    warn!(group_uid = %group_uid, error = %e, "Group prune failed");
                    report.failed += 1;
                    report.errors.push(e);
                }
            }
        }

        report.completed_at = Utc::now();
        Ok(report)
    }

    /// Returns the local name if the group was (or would be) deleted.
    async fn prune_group(&self, group_uid: &str) -> SyncResult<Option<String>> {
        if self.detector.exists(group_uid).await? {
            debug!(group_uid = %group_uid, "Remote group still exists");
            return Ok(None);
        }

        let name = self.group_name_mapper.group_name_for(group_uid).await?;
        if !self.dry_run {
            self.store.delete(&name).await?;
        }
        Ok(Some(name))
    }
}
