//! shotlist: binary entrypoint.
//! Each subcommand is one batch run; schedule them from cron or CI.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shotlist::config::{AppConfig, MAX_WINDOW_DAYS};
use shotlist::ingest::types::SourceKind;
use shotlist::publish::{Notifier, TelegramNotifier};

#[derive(Debug, Parser)]
#[command(name = "shotlist", version, about = "Stock-footage trend scout")]
struct Cli {
    /// Config file (TOML or JSON). Defaults to $SHOTLIST_CONFIG or config/shotlist.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch all sources and append new items to the catalog.
    Collect {
        /// Override the source list path.
        #[arg(long)]
        feeds: Option<PathBuf>,
    },
    /// Rebuild the trend report from the catalog.
    Trends {
        /// Recency window in days.
        #[arg(long)]
        days: Option<i64>,
        /// Skip vendor trend pages.
        #[arg(long)]
        no_vendor: bool,
    },
    /// Write posts for unpublished catalog rows.
    Publish {
        #[arg(long)]
        limit: Option<usize>,
        /// Send a Telegram digest of the new posts.
        #[arg(long)]
        notify: bool,
    },
    /// Send a Telegram digest for the given post files.
    Notify { posts: Vec<PathBuf> },
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shotlist=info,ingest=info,warn"));

    let json = std::env::var("SHOTLIST_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Local .env only; missing file is fine.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let mut cfg = match &cli.config {
        Some(p) => AppConfig::load_from(p)?,
        None => AppConfig::load_default()?,
    };

    match cli.command {
        Command::Collect { feeds } => {
            if let Some(f) = feeds {
                cfg.ingest.feeds_path = f;
            }
            let report = shotlist::run_collect(&cfg).await?;
            println!(
                "Fetched: RSS={}, TG={}",
                report.fetched(SourceKind::Rss),
                report.fetched(SourceKind::Telegram)
            );
            println!(
                "Added:   RSS={}, TG={}, Total unique={}",
                report.added(SourceKind::Rss),
                report.added(SourceKind::Telegram),
                report.total_known
            );
        }
        Command::Trends { days, no_vendor } => {
            if let Some(d) = days.filter(|d| *d > 0) {
                cfg.trends.days = d.min(MAX_WINDOW_DAYS);
            }
            let report = shotlist::run_trends(&cfg, !no_vendor).await?;
            println!(
                "Report written to {} ({} words, {} bigrams, {} trigrams, {} vendor signals)",
                cfg.trends.report_path.display(),
                report.words.len(),
                report.bigrams.len(),
                report.trigrams.len(),
                report.vendor.len()
            );
        }
        Command::Publish { limit, notify } => {
            let limit = limit.unwrap_or(cfg.publish.limit);
            let notifier = notify.then(TelegramNotifier::from_env);
            let created = shotlist::run_publish(
                &cfg,
                limit,
                notifier.as_ref().map(|n| n as &dyn Notifier),
            )
            .await?;
            println!("Created posts:");
            for p in created {
                println!("{}", p.display());
            }
        }
        Command::Notify { posts } => {
            TelegramNotifier::from_env().notify(&posts).await?;
        }
    }

    Ok(())
}
