// src/ingest/mod.rs
pub mod config;
pub mod providers;
pub mod types;

use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::CatalogStore;
use crate::config::IngestSettings;
use crate::error::IngestError;
use crate::http::Transport;
use crate::ingest::providers::{rss::RssFetcher, telegram::TelegramFetcher};
use crate::ingest::types::{FeedSource, SourceFetcher, SourceKind};

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_fetched_total", "Items returned by source fetchers.");
        describe_counter!("ingest_added_total", "Items newly appended to the catalog.");
        describe_counter!(
            "ingest_source_errors_total",
            "Sources that failed to fetch or parse."
        );
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
    });
}

/// Per-run counters, keyed by source kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub fetched: BTreeMap<SourceKind, usize>,
    pub added: BTreeMap<SourceKind, usize>,
    pub failed_sources: usize,
    /// Distinct uids in the catalog after the run.
    pub total_known: usize,
}

impl RunReport {
    pub fn fetched(&self, kind: SourceKind) -> usize {
        self.fetched.get(&kind).copied().unwrap_or(0)
    }

    pub fn added(&self, kind: SourceKind) -> usize {
        self.added.get(&kind).copied().unwrap_or(0)
    }

    pub fn total_added(&self) -> usize {
        self.added.values().sum()
    }
}

/// RSS + Telegram fetchers wired from settings.
pub fn default_fetchers(
    transport: Arc<dyn Transport>,
    settings: &IngestSettings,
) -> Vec<Box<dyn SourceFetcher>> {
    vec![
        Box::new(RssFetcher::new(transport.clone())),
        Box::new(
            TelegramFetcher::new(transport)
                .with_endpoints(&settings.telegram_rss_proxy, &settings.telegram_mirror)
                .with_throttle(Duration::from_millis(settings.telegram_throttle_ms)),
        ),
    ]
}

/// Run ingestion once over `sources`, in order.
///
/// Source failures are logged and skipped; rows appended before a failure
/// stay. Only catalog I/O errors abort the run.
pub async fn run_once(
    store: &CatalogStore,
    sources: &[FeedSource],
    fetchers: &[Box<dyn SourceFetcher>],
) -> Result<RunReport, IngestError> {
    ensure_metrics_described();

    store.ensure_initialized()?;
    let mut known = store.existing_keys()?;
    let mut report = RunReport::default();

    for source in sources {
        let Some(fetcher) = fetchers.iter().find(|f| f.kind() == source.kind) else {
            tracing::warn!(kind = %source.kind, source = %source.address, "no fetcher for source kind");
            continue;
        };

        let items = match fetcher.fetch(source).await {
            Ok(items) => items,
            Err(e) if e.is_recoverable() => {
                tracing::warn!(
                    error = %e,
                    kind = %source.kind,
                    source = %source.address,
                    "source failed"
                );
                counter!("ingest_source_errors_total").increment(1);
                report.failed_sources += 1;
                continue;
            }
            Err(e) => return Err(e),
        };

        *report.fetched.entry(source.kind).or_default() += items.len();
        counter!("ingest_fetched_total", "kind" => source.kind.as_str()).increment(items.len() as u64);

        let mut added = 0usize;
        for item in items {
            if item.link.is_empty() || known.contains(&item.uid) {
                continue;
            }
            store.append(&item)?;
            known.insert(item.uid);
            added += 1;
        }
        *report.added.entry(source.kind).or_default() += added;
        counter!("ingest_added_total", "kind" => source.kind.as_str()).increment(added as u64);

        tracing::debug!(kind = %source.kind, source = %source.address, added, "source done");
    }

    report.total_known = known.len();
    tracing::info!(
        target: "ingest",
        fetched_rss = report.fetched(SourceKind::Rss),
        fetched_telegram = report.fetched(SourceKind::Telegram),
        added_rss = report.added(SourceKind::Rss),
        added_telegram = report.added(SourceKind::Telegram),
        failed = report.failed_sources,
        total_unique = report.total_known,
        "ingest run finished"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogItem;
    use async_trait::async_trait;
    use chrono::Utc;

    struct StaticFetcher {
        kind: SourceKind,
        links: Vec<&'static str>,
    }

    #[async_trait]
    impl SourceFetcher for StaticFetcher {
        async fn fetch(&self, _source: &FeedSource) -> Result<Vec<CatalogItem>, IngestError> {
            Ok(self
                .links
                .iter()
                .map(|l| CatalogItem::new("t", *l, "example.com", Utc::now(), ""))
                .collect())
        }
        fn kind(&self) -> SourceKind {
            self.kind
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl SourceFetcher for FailingFetcher {
        async fn fetch(&self, source: &FeedSource) -> Result<Vec<CatalogItem>, IngestError> {
            Err(IngestError::fetch(&source.address, "timeout"))
        }
        fn kind(&self) -> SourceKind {
            SourceKind::Telegram
        }
    }

    #[tokio::test]
    async fn dedups_within_run_and_counts_per_kind() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(dir.path().join("catalog.csv"));
        let fetchers: Vec<Box<dyn SourceFetcher>> = vec![
            Box::new(StaticFetcher {
                kind: SourceKind::Rss,
                links: vec!["https://a.test/1", "https://a.test/2", "https://a.test/1"],
            }),
            Box::new(FailingFetcher),
        ];
        let sources = vec![
            FeedSource::rss("https://a.test/feed"),
            FeedSource::telegram("https://t.me/s/chan"),
            FeedSource::rss("https://a.test/feed-again"),
        ];

        let report = run_once(&store, &sources, &fetchers).await.unwrap();
        assert_eq!(report.fetched(SourceKind::Rss), 6);
        assert_eq!(report.added(SourceKind::Rss), 2);
        assert_eq!(report.fetched(SourceKind::Telegram), 0);
        assert_eq!(report.failed_sources, 1);
        assert_eq!(report.total_known, 2);
        assert_eq!(store.records().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_fetcher_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(dir.path().join("catalog.csv"));
        let report = run_once(&store, &[FeedSource::rss("https://a.test/feed")], &[])
            .await
            .unwrap();
        assert_eq!(report.total_added(), 0);
        assert!(store.path().exists());
    }
}
