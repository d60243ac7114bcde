// src/ingest/types.rs
use std::fmt;

use crate::catalog::CatalogItem;
use crate::error::IngestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceKind {
    Rss,
    Telegram,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Rss => "rss",
            SourceKind::Telegram => "telegram",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSource {
    pub kind: SourceKind,
    pub address: String, // feed URL or channel URL
}

impl FeedSource {
    pub fn rss(address: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Rss,
            address: address.into(),
        }
    }

    pub fn telegram(address: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Telegram,
            address: address.into(),
        }
    }
}

#[async_trait::async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, source: &FeedSource) -> Result<Vec<CatalogItem>, IngestError>;
    fn kind(&self) -> SourceKind;
}
