//! Directory error types
//!
//! Error definitions with benign/fatal classification. A benign error means
//! "the thing you asked about is absent", not "the directory is broken".

use thiserror::Error;

/// Error that can occur while querying the directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    // Scope errors (benign: the looked-up object is absent)
    /// The search base itself does not exist (LDAP result code 32).
    #[error("search for entry with base dn=\"{base_dn}\" refers to a non-existent entry")]
    NoSuchObject { base_dn: String },

    /// A unique lookup matched zero entries.
    #[error(
        "search for entry with base dn=\"{base_dn}\" and filter \"{filter}\" did not return any results"
    )]
    EntryNotFound { base_dn: String, filter: String },

    /// A DN-valued lookup points outside the configured base DN.
    #[error(
        "search for entry with dn=\"{dn}\" would search outside of the base dn specified (dn=\"{base_dn}\")"
    )]
    QueryOutOfBounds { dn: String, base_dn: String },

    // Lookup errors (fatal)
    /// A unique lookup matched more than one entry.
    #[error(
        "search for entry with base dn=\"{base_dn}\" and filter \"{filter}\" returned {count} entries, expected exactly one"
    )]
    MultipleEntries {
        base_dn: String,
        filter: String,
        count: usize,
    },

    /// A value could not be parsed as a distinguished name.
    #[error("invalid distinguished name {dn:?}: {message}")]
    InvalidDn { dn: String, message: String },

    /// A query descriptor is malformed.
    #[error("invalid query: {message}")]
    InvalidQuery { message: String },

    // Transport errors (fatal)
    /// Failed to establish a connection to the directory.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Bind was rejected by the directory.
    #[error("authentication failed for bind dn \"{bind_dn}\"")]
    AuthenticationFailed { bind_dn: String },

    /// The search itself failed at the protocol level.
    #[error("search failed: {message}")]
    SearchFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl DirectoryError {
    /// Check if this error only signals that the looked-up object is absent.
    ///
    /// Benign errors are candidates for suppression during member lookups and
    /// map to "does not exist" during existence detection.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            DirectoryError::NoSuchObject { .. }
                | DirectoryError::EntryNotFound { .. }
                | DirectoryError::QueryOutOfBounds { .. }
        )
    }

    /// Check if this is a zero-result or missing-base error.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DirectoryError::NoSuchObject { .. } | DirectoryError::EntryNotFound { .. }
        )
    }

    /// Check if this is an out-of-bounds DN lookup.
    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self, DirectoryError::QueryOutOfBounds { .. })
    }

    /// Check if this error comes from the network or protocol layer.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            DirectoryError::ConnectionFailed { .. }
                | DirectoryError::AuthenticationFailed { .. }
                | DirectoryError::SearchFailed { .. }
        )
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            DirectoryError::NoSuchObject { .. } => "NO_SUCH_OBJECT",
            DirectoryError::EntryNotFound { .. } => "ENTRY_NOT_FOUND",
            DirectoryError::QueryOutOfBounds { .. } => "QUERY_OUT_OF_BOUNDS",
            DirectoryError::MultipleEntries { .. } => "MULTIPLE_ENTRIES",
            DirectoryError::InvalidDn { .. } => "INVALID_DN",
            DirectoryError::InvalidQuery { .. } => "INVALID_QUERY",
            DirectoryError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            DirectoryError::AuthenticationFailed { .. } => "AUTH_FAILED",
            DirectoryError::SearchFailed { .. } => "SEARCH_FAILED",
        }
    }

    // Convenience constructors

    /// Create a no-such-object error.
    pub fn no_such_object(base_dn: impl Into<String>) -> Self {
        DirectoryError::NoSuchObject {
            base_dn: base_dn.into(),
        }
    }

    /// Create an entry-not-found error.
    pub fn entry_not_found(base_dn: impl Into<String>, filter: impl Into<String>) -> Self {
        DirectoryError::EntryNotFound {
            base_dn: base_dn.into(),
            filter: filter.into(),
        }
    }

    /// Create a query-out-of-bounds error.
    pub fn out_of_bounds(dn: impl Into<String>, base_dn: impl Into<String>) -> Self {
        DirectoryError::QueryOutOfBounds {
            dn: dn.into(),
            base_dn: base_dn.into(),
        }
    }

    /// Create an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        DirectoryError::InvalidQuery {
            message: message.into(),
        }
    }

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        DirectoryError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection failed error with source.
    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a search failed error.
    pub fn search_failed(message: impl Into<String>) -> Self {
        DirectoryError::SearchFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a search failed error with source.
    pub fn search_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::SearchFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;
