// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod catalog;
pub mod config;
pub mod domain_weights;
pub mod error;
pub mod http;
pub mod ingest;
pub mod publish;
pub mod text;
pub mod trends;

pub use crate::catalog::{CatalogItem, CatalogRecord, CatalogStore};
pub use crate::config::AppConfig;
pub use crate::error::IngestError;
pub use crate::ingest::{run_once, RunReport};
pub use crate::trends::{TrendAggregator, TrendReport};

use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use crate::http::{HttpTransport, Transport};
use crate::text::Normalizer;

fn http_transport(cfg: &AppConfig) -> anyhow::Result<Arc<dyn Transport>> {
    let t = HttpTransport::new(&cfg.ingest.user_agent, cfg.ingest.timeout_secs)
        .context("building HTTP client")?;
    Ok(Arc::new(t))
}

/// One ingestion run: source list → fetchers → catalog.
pub async fn run_collect(cfg: &AppConfig) -> anyhow::Result<RunReport> {
    let sources = ingest::config::load_sources_from(&cfg.ingest.feeds_path)?;
    let transport = http_transport(cfg)?;
    let fetchers = ingest::default_fetchers(transport, &cfg.ingest);
    let store = CatalogStore::new(&cfg.ingest.catalog_path);
    info!(sources = sources.len(), catalog = %store.path().display(), "collect starting");
    let report = ingest::run_once(&store, &sources, &fetchers)
        .await
        .context("ingest run failed")?;
    Ok(report)
}

/// One trends run: catalog window + vendor pages → report file.
pub async fn run_trends(cfg: &AppConfig, with_vendor: bool) -> anyhow::Result<TrendReport> {
    let normalizer = Normalizer::new(&cfg.lexicon);
    let store = CatalogStore::new(&cfg.ingest.catalog_path);
    let records = store.records().context("reading catalog")?;

    let vendor = if with_vendor {
        let transport = http_transport(cfg)?;
        trends::vendor::fetch_vendor_signals(
            transport.as_ref(),
            &cfg.trends.vendor_pages,
            &normalizer,
            cfg.trends.vendor_weight,
            cfg.trends.top_vendor,
        )
        .await
    } else {
        Vec::new()
    };

    let aggregator = TrendAggregator::new(cfg.trends.clone(), normalizer);
    let report = aggregator.build_report(&records, vendor, chrono::Utc::now());
    trends::report::write_report(&cfg.trends.report_path, &report, &cfg.trends.report)?;
    Ok(report)
}

/// Write pending posts; optionally announce them.
pub async fn run_publish(
    cfg: &AppConfig,
    limit: usize,
    notifier: Option<&dyn publish::Notifier>,
) -> anyhow::Result<Vec<std::path::PathBuf>> {
    let transport = HttpTransport::new(&cfg.ingest.user_agent, cfg.publish.description_timeout_secs)
        .context("building HTTP client")?;
    let writer = publish::MarkdownPostWriter::new(&cfg.publish.posts_dir)
        .with_tag(&cfg.publish.tag)
        .with_transport(Arc::new(transport));
    let store = CatalogStore::new(&cfg.ingest.catalog_path);
    let ledger = publish::PublishedLedger::new(&cfg.publish.published_path);

    let created =
        publish::publish_pending(&store, &ledger, &writer, &cfg.publish.docs_dir, limit).await?;
    info!(created = created.len(), "publish finished");

    if let Some(n) = notifier {
        n.notify(&created).await?;
    }
    Ok(created)
}
