//! `ldapsync sync`

use std::sync::Arc;

use clap::{Args, ValueEnum};
use ldapsync_engine::syncer::SyncAction;
use ldapsync_engine::{
    GroupLister, GroupSyncer, SchemaBundle, SyncReport, SyncSource, WhitelistGroupLister,
};
use tokio_util::sync::CancellationToken;

use super::{apply_blacklist, read_identifiers, RunArgs, Session};
use crate::error::{CliError, CliResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Mirror remote groups into the local store
#[derive(Debug, Args)]
pub struct SyncArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Report format on stdout
    #[arg(long, short = 'o', value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

pub async fn execute(args: SyncArgs, cancel: CancellationToken) -> CliResult<()> {
    let session = Session::open(&args.run).await?;
    let config = &session.config;

    let bundle = SchemaBundle::build(
        &config.schema,
        &config.group_uid_name_mapping,
        session.client.clone(),
    );

    let lister: Arc<dyn GroupLister> = match &args.run.whitelist {
        Some(path) => Arc::new(WhitelistGroupLister::new(read_identifiers(path).await?)),
        None => bundle.group_lister,
    };
    let lister = apply_blacklist(lister, args.run.blacklist.as_deref()).await?;

    let syncer = GroupSyncer::new(
        lister,
        bundle.member_extractor,
        bundle.user_name_mapper,
        bundle.group_name_mapper,
        session.store.clone(),
        SyncSource::from(&config.connection),
    )
    .with_dry_run(!args.run.confirm);

    let report = syncer.sync(&cancel).await?;

    match args.output {
        OutputFormat::Text => print!("{}", render_text(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if report.is_success() {
        Ok(())
    } else {
        Err(CliError::RunFailed {
            failed: report.failed,
        })
    }
}

fn render_text(report: &SyncReport) -> String {
    let mut out = String::new();
    for synced in &report.groups {
        let verb = match (synced.action, report.dry_run) {
            (SyncAction::Created, false) => "created",
            (SyncAction::Updated, false) => "updated",
            (SyncAction::Created, true) => "would be created",
            (SyncAction::Updated, true) => "would be updated",
        };
        out.push_str(&format!(
            "group/{} {} ({} users)\n",
            synced.group.name,
            verb,
            synced.group.users.len()
        ));
    }
    for error in report.errors.iter() {
        out.push_str(&format!("error: {}\n", error));
    }
    if report.cancelled {
        out.push_str("cancelled before all groups were processed\n");
    }
    out
}
