// src/config/mod.rs
//! Application configuration.
//!
//! Resolution order:
//! 1) `$SHOTLIST_CONFIG`
//! 2) `config/shotlist.toml`
//! 3) `config/shotlist.json`
//! 4) built-in defaults
//!
//! Every field has a default, so a config file only needs the keys it changes.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain_weights::DomainWeights;
use crate::http::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::ingest::providers::telegram::{DEFAULT_MIRROR_BASE, DEFAULT_RSS_PROXY_BASE};
use crate::text::Lexicon;

pub const ENV_CONFIG_PATH: &str = "SHOTLIST_CONFIG";
pub const DEFAULT_TOML_PATH: &str = "config/shotlist.toml";
pub const DEFAULT_JSON_PATH: &str = "config/shotlist.json";
/// Upper bound for the trend window, about a century.
pub const MAX_WINDOW_DAYS: i64 = 36_500;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ingest: IngestSettings,
    pub trends: TrendsSettings,
    pub lexicon: Lexicon,
    pub publish: PublishSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub feeds_path: PathBuf,
    pub catalog_path: PathBuf,
    /// Per-request deadline.
    pub timeout_secs: u64,
    pub user_agent: String,
    pub telegram_rss_proxy: String,
    pub telegram_mirror: String,
    /// Pause after every Telegram channel.
    pub telegram_throttle_ms: u64,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            feeds_path: PathBuf::from("data/feeds.txt"),
            catalog_path: PathBuf::from("data/catalog.csv"),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            telegram_rss_proxy: DEFAULT_RSS_PROXY_BASE.to_string(),
            telegram_mirror: DEFAULT_MIRROR_BASE.to_string(),
            telegram_throttle_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrendsSettings {
    /// Recency window in days.
    pub days: i64,
    pub top_words: usize,
    pub top_bigrams: usize,
    pub top_trigrams: usize,
    pub top_vendor: usize,
    /// Flat weight for every vendor-page token.
    pub vendor_weight: f64,
    pub vendor_pages: Vec<String>,
    pub domains: DomainWeights,
    pub report_path: PathBuf,
    pub report: ReportSettings,
}

impl Default for TrendsSettings {
    fn default() -> Self {
        Self {
            days: 7,
            top_words: 30,
            top_bigrams: 30,
            top_trigrams: 20,
            top_vendor: 40,
            vendor_weight: 2.0,
            vendor_pages: vec![
                "https://www.gettyimages.com/visualgps/creative-trends".to_string(),
                "https://helpx.adobe.com/stock/contributor/help/artist-hub-migration/creat-what-s-in-demand.html".to_string(),
                "https://www.shutterstock.com/explore/the-shot-list".to_string(),
                "https://blog.pond5.com/".to_string(),
            ],
            domains: DomainWeights::default_seed(),
            report_path: PathBuf::from("docs/trends/index.md"),
            report: ReportSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub title: String,
    pub permalink: String,
    pub bigram_limit: usize,
    pub trigram_limit: usize,
    pub word_limit: usize,
    pub vendor_limit: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            title: "Trends of the week".to_string(),
            permalink: "/trends/".to_string(),
            bigram_limit: 20,
            trigram_limit: 15,
            word_limit: 20,
            vendor_limit: 25,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    pub docs_dir: PathBuf,
    pub posts_dir: PathBuf,
    pub published_path: PathBuf,
    /// Max posts written per run.
    pub limit: usize,
    pub description_timeout_secs: u64,
    pub tag: String,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from("docs"),
            posts_dir: PathBuf::from("docs/_posts"),
            published_path: PathBuf::from("data/published.csv"),
            limit: 5,
            description_timeout_secs: 12,
            tag: "digest".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from an explicit path. TOML or JSON, by extension.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg: AppConfig = if ext == "json" {
            serde_json::from_str(&content)
                .with_context(|| format!("parsing JSON config {}", path.display()))?
        } else {
            toml::from_str(&content)
                .with_context(|| format!("parsing TOML config {}", path.display()))?
        };
        Ok(cfg.sanitized())
    }

    /// Env var, then `config/shotlist.{toml,json}`, then defaults.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        for p in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        Ok(Self::default())
    }

    fn sanitized(mut self) -> Self {
        let defaults = TrendsSettings::default();
        if self.trends.days < 1 {
            self.trends.days = defaults.days;
        }
        self.trends.days = self.trends.days.min(MAX_WINDOW_DAYS);
        if !(self.trends.vendor_weight.is_finite() && self.trends.vendor_weight > 0.0) {
            self.trends.vendor_weight = defaults.vendor_weight;
        }
        if !self.trends.domains.default_weight.is_finite() {
            self.trends.domains.default_weight = 1.0;
        }
        if self.ingest.timeout_secs == 0 {
            self.ingest.timeout_secs = DEFAULT_TIMEOUT_SECS;
        }
        self
    }
}
