use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serverkeeper::{Daemon, Layout, LogWriter, MigrationOutcome, Subscribe};
use tracing_subscriber::EnvFilter;

/// Keeps a game server alive and upgrades it through the version catalog.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Base directory holding current/, servers/, settings.json and friends.
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Log filter (overrides RUST_LOG), e.g. `debug` or `serverkeeper=trace`.
    #[arg(long)]
    log_level: Option<String>,

    /// Run one migration to the next cataloged version and exit.
    #[arg(long)]
    upgrade_now: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level).context("invalid --log-level")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(
        dir = %cli.dir.display(),
        "serverkeeper v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let daemon = Daemon::builder(Layout::new(&cli.dir))
        .with_subscribers(subs)
        .build();

    if cli.upgrade_now {
        match daemon.upgrade_once().await.context("upgrade failed")? {
            MigrationOutcome::Upgraded { from, to } => {
                tracing::info!(%from, %to, "upgrade complete");
            }
            MigrationOutcome::NoUpgradeAvailable { current } => {
                tracing::info!(%current, "already on the latest cataloged version");
            }
        }
        return Ok(());
    }

    daemon.run().await.context("daemon failed")?;
    tracing::info!("serverkeeper exiting cleanly");
    Ok(())
}
