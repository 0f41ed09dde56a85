//! `ldapsync prune`

use std::sync::Arc;

use clap::Args;
use ldapsync_engine::{GroupPruner, LocalGroupLister, SchemaBundle, SyncSource};
use tokio_util::sync::CancellationToken;

use super::{apply_blacklist, read_identifiers, RunArgs, Session};
use crate::error::{CliError, CliResult};

/// Delete local groups whose remote group no longer exists
///
/// With --whitelist, the file names local groups rather than remote
/// identifiers.
#[derive(Debug, Args)]
pub struct PruneArgs {
    #[command(flatten)]
    pub run: RunArgs,
}

pub async fn execute(args: PruneArgs, cancel: CancellationToken) -> CliResult<()> {
    let session = Session::open(&args.run).await?;
    let config = &session.config;
    let source = SyncSource::from(&config.connection);

    let bundle = SchemaBundle::build(
        &config.schema,
        &config.group_uid_name_mapping,
        session.client.clone(),
    );

    let local = Arc::new(match &args.run.whitelist {
        Some(path) => {
            let names = read_identifiers(path).await?;
            LocalGroupLister::named(session.store.clone(), source, names)
        }
        None => LocalGroupLister::all(session.store.clone(), source),
    });
    let lister = apply_blacklist(local.clone(), args.run.blacklist.as_deref()).await?;

    let pruner = GroupPruner::new(lister, bundle.detector, local, session.store.clone())
        .with_dry_run(!args.run.confirm);

    let report = pruner.prune(&cancel).await?;

    for line in report.transcript() {
        println!("{}", line);
    }
    for error in report.errors.iter() {
        println!("error: {}", error);
    }
    if report.cancelled {
        println!("cancelled before all groups were checked");
    }

    if report.is_success() {
        Ok(())
    } else {
        Err(CliError::RunFailed {
            failed: report.failed,
        })
    }
}
