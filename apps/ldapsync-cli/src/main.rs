//! ldapsync - mirror LDAP group membership into a local group store
//!
//! Both commands are dry runs unless `--confirm` is given.

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;

mod commands;
mod error;
mod logging;

use error::CliResult;
use logging::LogFormat;

/// Directory group synchronization
#[derive(Parser)]
#[command(name = "ldapsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Debug logging for ldapsync crates (overridden by RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Log line format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror remote groups into the local store
    Sync(commands::sync::SyncArgs),

    /// Delete local groups whose remote group no longer exists
    Prune(commands::prune::PruneArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.log_format);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing the current group");
            on_signal.cancel();
        }
    });

    match run(cli.command, cancel).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(command: Commands, cancel: CancellationToken) -> CliResult<()> {
    match command {
        Commands::Sync(args) => commands::sync::execute(args, cancel).await,
        Commands::Prune(args) => commands::prune::execute(args, cancel).await,
    }
}
