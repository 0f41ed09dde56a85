//! Subcommand implementations.

pub mod prune;
pub mod sync;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use ldapsync_directory::LdapClient;
use ldapsync_engine::{BlacklistGroupLister, GroupLister, JsonFileGroupStore, SyncConfig};
use tracing::info;

use crate::error::{CliError, CliResult};

/// Flags shared by `sync` and `prune`.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Sync configuration (YAML)
    #[arg(long, short = 'c')]
    pub config: PathBuf,

    /// Local group store (JSON), created on first write
    #[arg(long, short = 's')]
    pub store: PathBuf,

    /// File listing the only groups to process, one per line
    #[arg(long)]
    pub whitelist: Option<PathBuf>,

    /// File listing remote group identifiers to skip, one per line
    #[arg(long)]
    pub blacklist: Option<PathBuf>,

    /// Apply changes; without this flag the run is a dry run
    #[arg(long)]
    pub confirm: bool,
}

/// Everything a run needs once configuration has been loaded.
pub struct Session {
    pub config: SyncConfig,
    pub client: Arc<LdapClient>,
    pub store: Arc<JsonFileGroupStore>,
}

impl Session {
    /// Load configuration and check that the directory accepts our bind
    /// before any group is touched.
    pub async fn open(args: &RunArgs) -> CliResult<Self> {
        let config = SyncConfig::from_file(&args.config).await?;
        info!(
            config = %args.config.display(),
            schema = config.schema.name(),
            source = %config.connection.source_identity(),
            "Loaded configuration"
        );

        let client = LdapClient::new(config.connection.clone())?;
        client.test_connection().await?;

        Ok(Self {
            config,
            client: Arc::new(client),
            store: Arc::new(JsonFileGroupStore::new(&args.store)),
        })
    }
}

/// Wrap `lister` with the blacklist, if one was given.
pub async fn apply_blacklist(
    lister: Arc<dyn GroupLister>,
    blacklist: Option<&Path>,
) -> CliResult<Arc<dyn GroupLister>> {
    match blacklist {
        Some(path) => {
            let skipped = read_identifiers(path).await?;
            Ok(Arc::new(BlacklistGroupLister::new(skipped, lister)))
        }
        None => Ok(lister),
    }
}

/// Read an identifier file.
pub async fn read_identifiers(path: &Path) -> CliResult<Vec<String>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CliError::Input {
            path: path.display().to_string(),
            source,
        })?;
    Ok(parse_identifiers(&content))
}

/// One identifier per line; blank lines and `#` comments are ignored.
pub fn parse_identifiers(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldapsync_engine::WhitelistGroupLister;
    use std::io::Write;

    #[test]
    fn test_parse_identifiers() {
        let content = "\
# engineering groups
cn=eng,ou=groups,dc=example,dc=com

  cn=ops,ou=groups,dc=example,dc=com
#cn=old,ou=groups,dc=example,dc=com
";
        assert_eq!(
            parse_identifiers(content),
            vec![
                "cn=eng,ou=groups,dc=example,dc=com".to_string(),
                "cn=ops,ou=groups,dc=example,dc=com".to_string(),
            ]
        );
        assert!(parse_identifiers("").is_empty());
    }

    #[tokio::test]
    async fn test_read_identifiers_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_identifiers(&dir.path().join("missing.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Input { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_apply_blacklist() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "b\n# c").unwrap();

        let lister: Arc<dyn GroupLister> = Arc::new(WhitelistGroupLister::new(vec![
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
        ]));
        let lister = apply_blacklist(lister, Some(file.path())).await.unwrap();
        assert_eq!(
            lister.list_groups().await.unwrap(),
            vec!["a".to_string(), "c".to_string()]
        );
    }
}
