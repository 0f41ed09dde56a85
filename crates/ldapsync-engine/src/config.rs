//! Sync configuration
//!
//! One YAML document selects the directory schema and carries the queries
//! and attribute lists for it. See [`SyncConfig`].

use std::collections::BTreeMap;
use std::path::Path;

use ldapsync_directory::{DirectoryError, LdapConfig, QueryDescriptor, QueryOnAttribute};
use serde::{Deserialize, Serialize};

use crate::detector::DetectorMode;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    fn from_directory(field: &str, error: DirectoryError) -> Self {
        Self::invalid(field, error.to_string())
    }
}

/// Top-level sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub connection: LdapConfig,

    /// Static remote group identifier to local group name table.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub group_uid_name_mapping: BTreeMap<String, String>,

    /// Written as a single-key map (`rfc2307: {...}`) rather than a YAML tag.
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub schema: SchemaConfig,
}

impl SyncConfig {
    /// Load and validate configuration from a YAML file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.connection
            .validate()
            .map_err(|e| ConfigError::from_directory("connection", e))?;

        for (uid, name) in &self.group_uid_name_mapping {
            if name.trim().is_empty() {
                return Err(ConfigError::invalid(
                    format!("group_uid_name_mapping[{:?}]", uid),
                    "local group name must not be empty",
                ));
            }
        }

        self.schema.validate()
    }
}

/// Directory schema and its settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaConfig {
    Rfc2307(Rfc2307Config),
    ActiveDirectory(ActiveDirectoryConfig),
    AugmentedActiveDirectory(AugmentedActiveDirectoryConfig),
}

impl SchemaConfig {
    /// Schema tag as written in configuration.
    pub fn name(&self) -> &'static str {
        match self {
            SchemaConfig::Rfc2307(_) => "rfc2307",
            SchemaConfig::ActiveDirectory(_) => "active_directory",
            SchemaConfig::AugmentedActiveDirectory(_) => "augmented_active_directory",
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            SchemaConfig::Rfc2307(c) => c.validate(),
            SchemaConfig::ActiveDirectory(c) => c.validate(),
            SchemaConfig::AugmentedActiveDirectory(c) => c.validate(),
        }
    }
}

/// Groups and users are both first-class entries; membership is on the group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rfc2307Config {
    pub groups_query: QueryOnAttribute,
    pub group_name_attributes: Vec<String>,
    pub group_membership_attributes: Vec<String>,

    pub users_query: QueryOnAttribute,
    pub user_name_attributes: Vec<String>,

    /// Skip members whose lookup finds nothing instead of failing the group.
    #[serde(default)]
    pub tolerate_member_not_found_errors: bool,

    /// Skip members outside the users query base instead of failing the group.
    #[serde(default)]
    pub tolerate_member_out_of_scope_errors: bool,
}

impl Rfc2307Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_query_on_attribute("groups_query", &self.groups_query)?;
        validate_attributes("group_name_attributes", &self.group_name_attributes)?;
        validate_attributes(
            "group_membership_attributes",
            &self.group_membership_attributes,
        )?;
        validate_query_on_attribute("users_query", &self.users_query)?;
        validate_attributes("user_name_attributes", &self.user_name_attributes)
    }
}

/// Only users are entries; membership is on the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveDirectoryConfig {
    pub all_users_query: QueryDescriptor,
    pub user_name_attributes: Vec<String>,
    pub group_membership_attributes: Vec<String>,
}

impl ActiveDirectoryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_query("all_users_query", &self.all_users_query)?;
        validate_attributes("user_name_attributes", &self.user_name_attributes)?;
        validate_attributes(
            "group_membership_attributes",
            &self.group_membership_attributes,
        )
    }
}

/// Active Directory membership with first-class group entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AugmentedActiveDirectoryConfig {
    pub all_users_query: QueryDescriptor,
    pub user_name_attributes: Vec<String>,
    pub group_membership_attributes: Vec<String>,

    pub groups_query: QueryOnAttribute,
    pub group_name_attributes: Vec<String>,

    /// How group and member evidence combine when deciding if a group still
    /// exists. Required.
    pub existence_mode: DetectorMode,
}

impl AugmentedActiveDirectoryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_query("all_users_query", &self.all_users_query)?;
        validate_attributes("user_name_attributes", &self.user_name_attributes)?;
        validate_attributes(
            "group_membership_attributes",
            &self.group_membership_attributes,
        )?;
        validate_query_on_attribute("groups_query", &self.groups_query)?;
        validate_attributes("group_name_attributes", &self.group_name_attributes)
    }

    /// The Active Directory part of this configuration.
    pub fn active_directory(&self) -> ActiveDirectoryConfig {
        ActiveDirectoryConfig {
            all_users_query: self.all_users_query.clone(),
            user_name_attributes: self.user_name_attributes.clone(),
            group_membership_attributes: self.group_membership_attributes.clone(),
        }
    }
}

fn validate_query(field: &str, query: &QueryDescriptor) -> Result<(), ConfigError> {
    query
        .validate()
        .map_err(|e| ConfigError::from_directory(field, e))
}

fn validate_query_on_attribute(field: &str, query: &QueryOnAttribute) -> Result<(), ConfigError> {
    query
        .validate()
        .map_err(|e| ConfigError::from_directory(field, e))
}

fn validate_attributes(field: &str, attributes: &[String]) -> Result<(), ConfigError> {
    if attributes.is_empty() {
        return Err(ConfigError::invalid(field, "at least one attribute is required"));
    }
    if attributes.iter().any(|a| a.trim().is_empty()) {
        return Err(ConfigError::invalid(field, "attribute names must not be empty"));
    }
    Ok(())
}
