//! `ldap3` directory client
//!
//! Each search runs on its own bound connection which is unbound before the
//! search returns, on success and on error. Runs are short-lived batch jobs,
//! so there is no connection cache to keep alive.

use std::time::Duration;

use async_trait::async_trait;
use ldap3::adapters::{Adapter, EntriesOnly, PagedResults};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapResult, Scope, SearchEntry, SearchOptions};
use tracing::{debug, info, instrument, warn};

use crate::config::LdapConfig;
use crate::entry::RemoteEntry;
use crate::error::{DirectoryError, DirectoryResult};
use crate::query::SearchRequest;
use crate::searcher::DirectorySearcher;

/// LDAP result codes the client distinguishes.
mod rc {
    pub const SUCCESS: u32 = 0;
    pub const NO_SUCH_OBJECT: u32 = 32;
    pub const INVALID_CREDENTIALS: u32 = 49;
}

/// Directory client backed by `ldap3`.
#[derive(Debug, Clone)]
pub struct LdapClient {
    config: LdapConfig,
}

impl LdapClient {
    /// Create a client after validating the configuration.
    pub fn new(config: LdapConfig) -> DirectoryResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The connection configuration.
    pub fn config(&self) -> &LdapConfig {
        &self.config
    }

    /// Connect, bind and read the root DSE.
    #[instrument(skip(self), fields(url = %self.config.url()))]
    pub async fn test_connection(&self) -> DirectoryResult<()> {
        let mut ldap = self.connect().await?;
        let result = ldap
            .search("", Scope::Base, "(objectClass=*)", vec!["namingContexts"])
            .await;
        release(&mut ldap).await;

        let result = result
            .map_err(|e| {
                DirectoryError::connection_failed_with_source("root DSE search failed", e)
            })?;
        check_result(&result.1, "")?;

        info!("LDAP connection test successful");
        Ok(())
    }

    /// Open a connection and bind with the configured credentials.
    async fn connect(&self) -> DirectoryResult<Ldap> {
        let url = self.config.url();
        debug!(url = %url, "Connecting to LDAP server");

        let settings = LdapConnSettings::new()
            .set_conn_timeout(Duration::from_secs(self.config.connection_timeout_secs))
            .set_starttls(self.config.use_starttls)
            .set_no_tls_verify(!self.config.verify_certificate);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| {
                DirectoryError::connection_failed_with_source(
                    format!("Failed to connect to LDAP server at {}", url),
                    e,
                )
            })?;

        // Spawn the connection driver
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        let bind_dn = self.config.bind_dn.as_deref().unwrap_or("");
        let bind_password = self.config.bind_password.as_deref().unwrap_or("");

        debug!(bind_dn = %bind_dn, "Performing LDAP bind");

        let result = match ldap.simple_bind(bind_dn, bind_password).await {
            Ok(result) => result,
            Err(e) => {
                release(&mut ldap).await;
                return Err(DirectoryError::connection_failed_with_source(
                    format!("LDAP bind failed for {}", bind_dn),
                    e,
                ));
            }
        };

        if result.rc != rc::SUCCESS {
            release(&mut ldap).await;
            if result.rc == rc::INVALID_CREDENTIALS {
                return Err(DirectoryError::AuthenticationFailed {
                    bind_dn: bind_dn.to_string(),
                });
            }
            return Err(DirectoryError::connection_failed(format!(
                "LDAP bind failed with code {}: {}",
                result.rc, result.text
            )));
        }

        Ok(ldap)
    }

    async fn run_search(
        &self,
        ldap: &mut Ldap,
        request: &SearchRequest,
    ) -> DirectoryResult<Vec<RemoteEntry>> {
        let time_limit = i32::try_from(request.time_limit).unwrap_or(i32::MAX);
        let options = SearchOptions::new()
            .deref(request.deref_aliases.into())
            .timelimit(time_limit);

        let mut adapters: Vec<Box<dyn Adapter<_, _>>> = vec![Box::new(EntriesOnly::new())];
        if request.page_size > 0 {
            let page_size = i32::try_from(request.page_size).unwrap_or(i32::MAX);
            adapters.push(Box::new(PagedResults::new(page_size)));
        }

        let attributes: Vec<&str> = request.attributes.iter().map(String::as_str).collect();

        let mut stream = ldap
            .with_search_options(options)
            .streaming_search_with(
                adapters,
                &request.base_dn,
                request.scope.into(),
                &request.filter,
                attributes,
            )
            .await
            .map_err(|e| DirectoryError::search_failed_with_source("LDAP search failed", e))?;

        let mut entries = Vec::new();
        loop {
            match stream.next().await {
                Ok(Some(entry)) => entries.push(RemoteEntry::from(SearchEntry::construct(entry))),
                Ok(None) => break,
                Err(e) => {
                    let _ = stream.finish().await;
                    return Err(DirectoryError::search_failed_with_source(
                        "LDAP search failed",
                        e,
                    ));
                }
            }
        }

        let result = stream.finish().await;
        check_result(&result, &request.base_dn)?;

        debug!(
            base_dn = %request.base_dn,
            count = entries.len(),
            "Search completed"
        );
        Ok(entries)
    }
}

#[async_trait]
impl DirectorySearcher for LdapClient {
    #[instrument(skip(self, request), fields(base_dn = %request.base_dn, filter = %request.filter))]
    async fn search(&self, request: &SearchRequest) -> DirectoryResult<Vec<RemoteEntry>> {
        let mut ldap = self.connect().await?;
        let result = self.run_search(&mut ldap, request).await;
        release(&mut ldap).await;
        result
    }
}

/// Unbind, logging instead of failing: the search outcome is already known.
async fn release(ldap: &mut Ldap) {
    if let Err(e) = ldap.unbind().await {
        warn!(error = %e, "Error during LDAP unbind");
    }
}

/// Map a search result code to a directory error.
fn check_result(result: &LdapResult, base_dn: &str) -> DirectoryResult<()> {
    match result.rc {
        rc::SUCCESS => Ok(()),
        rc::NO_SUCH_OBJECT => Err(DirectoryError::no_such_object(base_dn)),
        code => Err(DirectoryError::search_failed(format!(
            "LDAP search under {:?} failed with code {}: {}",
            base_dn, code, result.text
        ))),
    }
}
