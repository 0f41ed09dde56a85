//! LDAP connection configuration

use serde::{Deserialize, Serialize};

use crate::error::{DirectoryError, DirectoryResult};

/// Connection settings for the directory server.
#[derive(Clone, Serialize, Deserialize)]
pub struct LdapConfig {
    /// LDAP server hostname or IP address.
    pub host: String,

    /// LDAP server port (389 for LDAP, 636 for LDAPS).
    #[serde(default = "default_ldap_port")]
    pub port: u16,

    /// Use SSL/TLS (LDAPS).
    #[serde(default)]
    pub use_ssl: bool,

    /// Use STARTTLS upgrade on plain LDAP connection.
    #[serde(default)]
    pub use_starttls: bool,

    /// Bind DN; anonymous bind when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_dn: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_password: Option<String>,

    /// Connect timeout in seconds.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Verify the server certificate for LDAPS and STARTTLS.
    #[serde(default = "default_verify_certificate")]
    pub verify_certificate: bool,
}

impl std::fmt::Debug for LdapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_ssl", &self.use_ssl)
            .field("use_starttls", &self.use_starttls)
            .field("bind_dn", &self.bind_dn)
            .field(
                "bind_password",
                &self.bind_password.as_ref().map(|_| "***REDACTED***"),
            )
            .field("connection_timeout_secs", &self.connection_timeout_secs)
            .field("verify_certificate", &self.verify_certificate)
            .finish()
    }
}

fn default_ldap_port() -> u16 {
    389
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_verify_certificate() -> bool {
    true
}

impl LdapConfig {
    /// Create a config for an anonymous plain-LDAP connection.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_ldap_port(),
            use_ssl: false,
            use_starttls: false,
            bind_dn: None,
            bind_password: None,
            connection_timeout_secs: default_connection_timeout(),
            verify_certificate: default_verify_certificate(),
        }
    }

    /// Set bind credentials.
    pub fn with_bind(mut self, bind_dn: impl Into<String>, password: impl Into<String>) -> Self {
        self.bind_dn = Some(bind_dn.into());
        self.bind_password = Some(password.into());
        self
    }

    /// Enable SSL (LDAPS).
    #[must_use]
    pub fn with_ssl(mut self) -> Self {
        self.use_ssl = true;
        self.port = 636;
        self
    }

    /// Enable STARTTLS.
    #[must_use]
    pub fn with_starttls(mut self) -> Self {
        self.use_starttls = true;
        self
    }

    /// Connection URL.
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = if self.use_ssl { "ldaps" } else { "ldap" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// `host:port`, recorded on every synced group to tie it to this server.
    #[must_use]
    pub fn source_identity(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Copy of this config with the bind password removed.
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            bind_password: None,
            ..self.clone()
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> DirectoryResult<()> {
        if self.host.trim().is_empty() {
            return Err(DirectoryError::connection_failed("host must not be empty"));
        }
        if self.port == 0 {
            return Err(DirectoryError::connection_failed("port must not be 0"));
        }
        if self.use_ssl && self.use_starttls {
            return Err(DirectoryError::connection_failed(
                "use_ssl and use_starttls are mutually exclusive",
            ));
        }
        if self.bind_password.is_some() && self.bind_dn.is_none() {
            return Err(DirectoryError::connection_failed(
                "bind_password is set but bind_dn is not",
            ));
        }
        Ok(())
    }
}
