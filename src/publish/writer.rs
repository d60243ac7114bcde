// src/publish/writer.rs
//! Turns unpublished catalog rows into Markdown posts and tracks them in a
//! `uid,post_path` ledger.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::catalog::{CatalogRecord, CatalogStore};
use crate::http::Transport;

const SLUG_MAX: usize = 80;
const BLURB_LEN: usize = 200;

#[async_trait]
pub trait PostWriter: Send + Sync {
    /// Write a post for `item` unless its uid is already in `published`.
    /// Returns the generated document path.
    async fn write_post(
        &self,
        item: &CatalogRecord,
        published: &HashSet<String>,
    ) -> Result<Option<PathBuf>>;
}

/// Lowercase, keep Latin/Cyrillic letters, digits, `-` and spaces; spaces
/// become `-`. Never empty.
pub fn slugify(title: &str) -> String {
    let kept: String = title
        .to_lowercase()
        .chars()
        .filter(|c| {
            c.is_ascii_lowercase()
                || c.is_ascii_digit()
                || ('а'..='я').contains(c)
                || *c == 'ё'
                || *c == '-'
                || c.is_whitespace()
        })
        .collect();
    let dashed = kept.split_whitespace().collect::<Vec<_>>().join("-");
    let slug: String = dashed.trim_matches('-').chars().take(SLUG_MAX).collect();
    if slug.is_empty() {
        "post".to_string()
    } else {
        slug
    }
}

/// `og:description`, then `<meta name="description">`.
pub fn meta_description(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    for css in [
        r#"meta[property="og:description"]"#,
        r#"meta[name="description"]"#,
    ] {
        let Ok(sel) = Selector::parse(css) else {
            continue;
        };
        let found = doc
            .select(&sel)
            .filter_map(|m| m.value().attr("content"))
            .map(str::trim)
            .find(|c| !c.is_empty());
        if let Some(c) = found {
            return Some(c.to_string());
        }
    }
    None
}

fn escape_yaml_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Jekyll-style post files under `posts_dir`.
pub struct MarkdownPostWriter {
    posts_dir: PathBuf,
    tag: String,
    transport: Option<Arc<dyn Transport>>,
}

impl MarkdownPostWriter {
    pub fn new(posts_dir: impl Into<PathBuf>) -> Self {
        Self {
            posts_dir: posts_dir.into(),
            tag: "digest".to_string(),
            transport: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Enables fetching the linked page for a meta description.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    async fn description(&self, item: &CatalogRecord) -> String {
        if let Some(t) = &self.transport {
            match t.get_ok(&item.link).await {
                Ok(body) => {
                    if let Some(d) = meta_description(&body) {
                        return d;
                    }
                }
                Err(e) => tracing::debug!(link = %item.link, error = %e, "description fetch failed"),
            }
        }
        item.summary.clone()
    }

    pub fn render(&self, item: &CatalogRecord, description: &str, date: DateTime<Utc>) -> String {
        let blurb: String = description.chars().take(BLURB_LEN).collect();
        format!(
            "---\nlayout: post\ntitle: \"{title}\"\ndate: {date}\ntags: [{tag}]\n---\n\n\
             **Source:** [link]({link})\n\n\
             Summary: {blurb}\n\n\
             ### Where to look\n- Original: [open]({link})\n",
            title = escape_yaml_string(&item.title),
            date = date.format("%Y-%m-%d"),
            tag = self.tag,
            link = item.link,
        )
    }
}

#[async_trait]
impl PostWriter for MarkdownPostWriter {
    async fn write_post(
        &self,
        item: &CatalogRecord,
        published: &HashSet<String>,
    ) -> Result<Option<PathBuf>> {
        if published.contains(&item.uid) {
            return Ok(None);
        }
        let now = Utc::now();
        let description = self.description(item).await;

        fs::create_dir_all(&self.posts_dir)
            .with_context(|| format!("creating {}", self.posts_dir.display()))?;
        let path = self
            .posts_dir
            .join(format!("{}-{}.md", now.format("%Y-%m-%d"), slugify(&item.title)));
        fs::write(&path, self.render(item, &description, now))
            .with_context(|| format!("writing post {}", path.display()))?;
        Ok(Some(path))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LedgerRow {
    uid: String,
    post_path: String,
}

/// `uid,post_path` CSV of already published rows.
#[derive(Debug, Clone)]
pub struct PublishedLedger {
    path: PathBuf,
}

impl PublishedLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<HashSet<String>> {
        if !self.path.exists() {
            return Ok(HashSet::new());
        }
        let mut rdr = csv::Reader::from_path(&self.path)
            .with_context(|| format!("opening ledger {}", self.path.display()))?;
        let mut out = HashSet::new();
        for row in rdr.deserialize::<LedgerRow>() {
            out.insert(row.context("reading ledger row")?.uid);
        }
        Ok(out)
    }

    pub fn append(&self, uid: &str, post_path: &str) -> Result<()> {
        let needs_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening ledger {}", self.path.display()))?;
        let mut w = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        w.serialize(LedgerRow {
            uid: uid.to_string(),
            post_path: post_path.to_string(),
        })?;
        w.flush()?;
        Ok(())
    }
}

/// Write up to `limit` posts for rows not yet in the ledger, in catalog order.
pub async fn publish_pending(
    store: &CatalogStore,
    ledger: &PublishedLedger,
    writer: &dyn PostWriter,
    docs_dir: &Path,
    limit: usize,
) -> Result<Vec<PathBuf>> {
    let mut published = ledger.load()?;
    let mut created = Vec::new();
    if limit == 0 {
        return Ok(created);
    }

    for row in store.records().context("reading catalog")? {
        if row.uid.is_empty() || published.contains(&row.uid) {
            continue;
        }
        let Some(path) = writer.write_post(&row, &published).await? else {
            continue;
        };
        let rel = path.strip_prefix(docs_dir).unwrap_or(&path);
        ledger.append(&row.uid, &rel.to_string_lossy())?;
        published.insert(row.uid.clone());
        tracing::info!(uid = %row.uid, path = %path.display(), "post written");
        created.push(path);
        if created.len() >= limit {
            break;
        }
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::FixtureTransport;

    fn row(uid: &str, title: &str) -> CatalogRecord {
        CatalogRecord {
            uid: uid.into(),
            title: title.into(),
            link: format!("https://example.com/{uid}"),
            source: "example.com".into(),
            published: "2024-06-01T00:00:00+00:00".into(),
            summary: "Fallback summary".into(),
        }
    }

    #[test]
    fn slugs() {
        assert_eq!(slugify("Golden Hour: 10 Tips!"), "golden-hour-10-tips");
        assert_eq!(slugify("Закат над морем"), "закат-над-морем");
        assert_eq!(slugify("!!!"), "post");
        assert_eq!(slugify(&"a".repeat(200)).len(), 80);
    }

    #[test]
    fn meta_description_prefers_og() {
        let html = r#"<head><meta name="description" content="plain"><meta property="og:description" content="og text"></head>"#;
        assert_eq!(meta_description(html).as_deref(), Some("og text"));
        let html = r#"<head><meta name="description" content="plain"></head>"#;
        assert_eq!(meta_description(html).as_deref(), Some("plain"));
        assert_eq!(meta_description("<p>none</p>"), None);
    }

    #[tokio::test]
    async fn writes_post_with_escaped_title_and_description() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FixtureTransport::new().with_page(
            "https://example.com/u1",
            200,
            r#"<meta property="og:description" content="Page description">"#,
        );
        let writer = MarkdownPostWriter::new(dir.path().join("_posts"))
            .with_transport(Arc::new(transport));

        let path = writer
            .write_post(&row("u1", r#"The "best" light"#), &HashSet::new())
            .await
            .unwrap()
            .unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains(r#"title: "The \"best\" light""#));
        assert!(content.contains("Summary: Page description"));
        assert!(path.file_name().unwrap().to_string_lossy().ends_with("-the-best-light.md"));

        let mut done = HashSet::new();
        done.insert("u1".to_string());
        assert!(writer.write_post(&row("u1", "x"), &done).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn publish_pending_respects_ledger_and_limit() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        let store = CatalogStore::new(dir.path().join("catalog.csv"));
        store.ensure_initialized().unwrap();
        for (i, title) in ["One", "Two", "Three"].iter().enumerate() {
            let item = crate::catalog::CatalogItem::new(
                *title,
                format!("https://example.com/{i}"),
                "example.com",
                Utc::now(),
                "",
            );
            store.append(&item).unwrap();
        }
        let ledger = PublishedLedger::new(dir.path().join("published.csv"));
        let writer = MarkdownPostWriter::new(docs.join("_posts"));

        let first = publish_pending(&store, &ledger, &writer, &docs, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        let second = publish_pending(&store, &ledger, &writer, &docs, 5).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(ledger.load().unwrap().len(), 3);

        let ledger_text = fs::read_to_string(dir.path().join("published.csv")).unwrap();
        assert!(ledger_text.starts_with("uid,post_path\n"));
        assert!(ledger_text.contains("_posts/"));
        assert!(publish_pending(&store, &ledger, &writer, &docs, 5).await.unwrap().is_empty());
    }
}
