// src/catalog.rs
//! Append-only CSV catalog keyed by a link fingerprint.
//!
//! Columns: `uid,title,link,source,published,summary`. Rows are appended once
//! and never rewritten; the whole file is the only state carried across runs.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::IngestError;

pub const HEADER: [&str; 6] = ["uid", "title", "link", "source", "published", "summary"];

/// Stable fingerprint of a canonical link: first 16 bytes of SHA-256, hex.
///
/// Depends on the link only, so upstream title or date edits never create a
/// second row for the same post.
pub fn fingerprint(link: &str) -> String {
    use std::fmt::Write as _;
    let digest = Sha256::digest(link.as_bytes());
    let mut out = String::with_capacity(32);
    for b in digest.iter().take(16) {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// A fetched, normalized item ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogItem {
    pub uid: String,
    pub title: String,
    pub link: String,
    pub source: String,
    pub published: DateTime<Utc>,
    pub summary: String,
}

impl CatalogItem {
    /// Build an item; `uid` is derived from `link`.
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        source: impl Into<String>,
        published: DateTime<Utc>,
        summary: impl Into<String>,
    ) -> Self {
        let link = link.into();
        Self {
            uid: fingerprint(&link),
            title: title.into(),
            link,
            source: source.into(),
            published,
            summary: summary.into(),
        }
    }

    pub fn to_record(&self) -> CatalogRecord {
        CatalogRecord {
            uid: self.uid.clone(),
            title: self.title.clone(),
            link: self.link.clone(),
            source: self.source.clone(),
            published: self.published.to_rfc3339_opts(SecondsFormat::Secs, false),
            summary: self.summary.clone(),
        }
    }
}

/// One row as stored on disk. `published` is kept verbatim; use
/// [`CatalogRecord::published_at`] to interpret it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub published: String,
    #[serde(default)]
    pub summary: String,
}

impl CatalogRecord {
    /// Parsed publish time, or `None` when empty or unparseable.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.published)
    }
}

/// Parse ISO-8601 / RFC 3339; a trailing `Z` is accepted and naive
/// timestamps are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(n) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(n.and_utc());
        }
    }
    None
}

#[derive(Debug, Clone)]
pub struct CatalogStore {
    path: PathBuf,
}

impl CatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file with its header row if missing or empty.
    pub fn ensure_initialized(&self) -> Result<(), IngestError> {
        let empty = match fs::metadata(&self.path) {
            Ok(m) => m.len() == 0,
            Err(_) => true,
        };
        if !empty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut w = csv::Writer::from_path(&self.path)?;
        w.write_record(HEADER)?;
        w.flush()?;
        tracing::debug!(path = %self.path.display(), "catalog initialized");
        Ok(())
    }

    /// Every uid currently persisted. Empty when the file does not exist.
    pub fn existing_keys(&self) -> Result<HashSet<String>, IngestError> {
        Ok(self
            .records()?
            .into_iter()
            .map(|r| r.uid)
            .filter(|u| !u.is_empty())
            .collect())
    }

    /// All rows in file order. Empty when the file does not exist.
    pub fn records(&self) -> Result<Vec<CatalogRecord>, IngestError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)?;
        let mut out = Vec::new();
        for row in rdr.deserialize::<CatalogRecord>() {
            out.push(row?);
        }
        Ok(out)
    }

    /// Append one row. Never reads or rewrites existing rows.
    pub fn append(&self, item: &CatalogItem) -> Result<(), IngestError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut w = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        w.serialize(item.to_record())?;
        w.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(link: &str, title: &str) -> CatalogItem {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        CatalogItem::new(title, link, "example.com", ts, "summary, with \"quotes\"")
    }

    #[test]
    fn fingerprint_is_link_only() {
        let a = item("https://example.com/a", "First title");
        let b = item("https://example.com/a", "Edited title");
        assert_eq!(a.uid, b.uid);
        assert_eq!(a.uid.len(), 32);
        assert_ne!(a.uid, item("https://example.com/b", "First title").uid);
    }

    #[test]
    fn ensure_initialized_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(dir.path().join("data/catalog.csv"));
        store.ensure_initialized().unwrap();
        store.append(&item("https://example.com/a", "A")).unwrap();
        store.ensure_initialized().unwrap();
        let content = fs::read_to_string(store.path()).unwrap();
        assert!(content.starts_with("uid,title,link,source,published,summary"));
        assert_eq!(store.records().unwrap().len(), 1);
    }

    #[test]
    fn append_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(dir.path().join("catalog.csv"));
        assert!(store.existing_keys().unwrap().is_empty());

        store.ensure_initialized().unwrap();
        let it = item("https://example.com/a", "Sunset, drone");
        store.append(&it).unwrap();

        let rows = store.records().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Sunset, drone");
        assert_eq!(rows[0].summary, "summary, with \"quotes\"");
        assert_eq!(rows[0].published, "2024-05-01T10:00:00+00:00");
        assert_eq!(rows[0].published_at(), Some(it.published));
        assert!(store.existing_keys().unwrap().contains(&it.uid));
    }

    #[test]
    fn timestamp_parsing() {
        assert!(parse_timestamp("2024-05-01T10:00:00Z").is_some());
        assert!(parse_timestamp("2024-05-01T10:00:00+03:00").is_some());
        assert_eq!(
            parse_timestamp("2024-05-01T10:00:00"),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
        );
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
