//! # LDAP Directory Access
//!
//! Read-only directory access for ldapsync.
//!
//! This crate owns everything that talks about the directory itself:
//!
//! - [`query`] - Query descriptors (base DN, scope, alias dereferencing,
//!   time limit, filter) and the search requests built from them
//! - [`dn`] - Distinguished name parsing and subtree containment checks
//! - [`entry`] - Immutable remote entries returned by a search
//! - [`searcher`] - The [`DirectorySearcher`] seam plus unique/multi-entry
//!   lookup helpers
//! - [`client`] - The `ldap3`-backed [`LdapClient`]
//! - [`config`] - Connection configuration
//! - [`error`] - Error types with benign/fatal classification
//!
//! ## Example
//!
//! ```ignore
//! use ldapsync_directory::{LdapClient, LdapConfig, QueryDescriptor};
//! use ldapsync_directory::searcher::query_for_entries;
//!
//! let config = LdapConfig::new("ldap.example.com").with_bind("cn=admin,dc=example,dc=com", "secret");
//! let client = LdapClient::new(config)?;
//!
//! let query = QueryDescriptor::new("ou=users,dc=example,dc=com")
//!     .with_filter("(objectClass=inetOrgPerson)");
//! let users = query_for_entries(&client, &query.search_request(vec!["uid".to_string()])).await?;
//! ```

pub mod client;
pub mod config;
pub mod dn;
pub mod entry;
pub mod error;
pub mod query;
pub mod searcher;

// Re-exports
pub use client::LdapClient;
pub use config::LdapConfig;
pub use dn::DistinguishedName;
pub use entry::RemoteEntry;
pub use error::{DirectoryError, DirectoryResult};
pub use query::{DerefAliases, QueryDescriptor, QueryOnAttribute, SearchRequest, SearchScope};
pub use searcher::DirectorySearcher;
