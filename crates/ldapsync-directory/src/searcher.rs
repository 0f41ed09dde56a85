//! Directory search seam
//!
//! Everything above the transport talks to the directory through
//! [`DirectorySearcher`], which keeps the engine testable without a server.

use async_trait::async_trait;
use tracing::debug;

use crate::entry::RemoteEntry;
use crate::error::{DirectoryError, DirectoryResult};
use crate::query::SearchRequest;

/// Executes searches against a directory.
#[async_trait]
pub trait DirectorySearcher: Send + Sync {
    /// Run a search and return every matching entry.
    ///
    /// A missing search base must be reported as
    /// [`DirectoryError::NoSuchObject`].
    async fn search(&self, request: &SearchRequest) -> DirectoryResult<Vec<RemoteEntry>>;
}

/// Run a search that may return any number of entries.
pub async fn query_for_entries(
    searcher: &dyn DirectorySearcher,
    request: &SearchRequest,
) -> DirectoryResult<Vec<RemoteEntry>> {
    debug!(
        base_dn = %request.base_dn,
        scope = %request.scope,
        filter = %request.filter,
        "Searching for entries"
    );
    searcher.search(request).await
}

/// Run a search that must return exactly one entry.
pub async fn query_for_unique_entry(
    searcher: &dyn DirectorySearcher,
    request: &SearchRequest,
) -> DirectoryResult<RemoteEntry> {
    let mut entries = query_for_entries(searcher, request).await?;
    match entries.len() {
        0 => Err(DirectoryError::entry_not_found(
            &request.base_dn,
            &request.filter,
        )),
        1 => Ok(entries.remove(0)),
        count => Err(DirectoryError::MultipleEntries {
            base_dn: request.base_dn.clone(),
            filter: request.filter.clone(),
            count,
        }),
    }
}
