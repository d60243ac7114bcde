// src/ingest/providers/rss.rs
//! RSS 2.0 / RSS 1.0 (RDF) / Atom feed fetcher.
//!
//! Parsing is split from fetching so the Telegram RSS proxy can reuse it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;
use std::sync::Arc;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::catalog::{self, CatalogItem};
use crate::error::IngestError;
use crate::http::Transport;
use crate::ingest::types::{FeedSource, SourceFetcher, SourceKind};
use crate::text::clean;

pub const TITLE_FROM_SUMMARY_LEN: usize = 80;
pub const SUMMARY_LEN: usize = 500;

#[derive(Debug, Default, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    value: String,
}

// RSS <link>https://...</link> and Atom <link rel=".." href=".."/>
#[derive(Debug, Default, Deserialize)]
struct LinkNode {
    #[serde(rename = "$text", default)]
    text: String,
    #[serde(rename = "@href", default)]
    href: String,
    #[serde(rename = "@rel", default)]
    rel: String,
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct Rdf {
    #[serde(rename = "item", default)]
    item: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<TextNode>,
    #[serde(default)]
    link: Vec<LinkNode>,
    guid: Option<TextNode>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "dc:date", alias = "date")]
    dc_date: Option<String>,
    updated: Option<String>,
    description: Option<TextNode>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<TextNode>,
    #[serde(default)]
    link: Vec<LinkNode>,
    id: Option<String>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<TextNode>,
    content: Option<TextNode>,
}

/// Format-neutral feed entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub id: Option<String>,
    pub published: Option<String>,
    pub updated: Option<String>,
    pub summary: Option<String>,
}

fn non_empty(s: String) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

fn text(node: Option<TextNode>) -> Option<String> {
    node.and_then(|n| non_empty(n.value))
}

fn pick_link(links: Vec<LinkNode>) -> Option<String> {
    let mut fallback = None;
    for l in links {
        if let Some(t) = non_empty(l.text) {
            return Some(t);
        }
        let rel = l.rel.trim().to_ascii_lowercase();
        if let Some(h) = non_empty(l.href) {
            if rel.is_empty() || rel == "alternate" {
                return Some(h);
            }
            fallback.get_or_insert(h);
        }
    }
    fallback
}

impl From<RssItem> for FeedEntry {
    fn from(it: RssItem) -> Self {
        Self {
            title: text(it.title),
            link: pick_link(it.link),
            id: text(it.guid),
            published: it.pub_date.or(it.dc_date).and_then(non_empty),
            updated: it.updated.and_then(non_empty),
            summary: text(it.description),
        }
    }
}

impl From<AtomEntry> for FeedEntry {
    fn from(e: AtomEntry) -> Self {
        Self {
            title: text(e.title),
            link: pick_link(e.link),
            id: e.id.and_then(non_empty),
            published: e.published.and_then(non_empty),
            updated: e.updated.and_then(non_empty),
            summary: text(e.summary).or_else(|| text(e.content)),
        }
    }
}

/// Parse an RSS, RDF or Atom document into entries.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>, IngestError> {
    let t0 = std::time::Instant::now();
    let xml = scrub_html_entities_for_xml(xml);

    let entries: Vec<FeedEntry> = if xml.contains("<rss") {
        let rss: Rss = from_str(&xml).map_err(|e| IngestError::parse("rss feed", e))?;
        rss.channel.item.into_iter().map(FeedEntry::from).collect()
    } else if xml.contains("<rdf:RDF") {
        let rdf: Rdf = from_str(&xml).map_err(|e| IngestError::parse("rdf feed", e))?;
        rdf.item.into_iter().map(FeedEntry::from).collect()
    } else if xml.contains("<feed") {
        let feed: AtomFeed = from_str(&xml).map_err(|e| IngestError::parse("atom feed", e))?;
        feed.entry.into_iter().map(FeedEntry::from).collect()
    } else {
        return Err(IngestError::parse("feed", "no <rss>, <rdf:RDF> or <feed> root"));
    };

    histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(entries)
}

/// Feed timestamps: RFC 2822 (RSS), RFC 3339 (Atom), or naive ISO.
pub fn parse_feed_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    OffsetDateTime::parse(s, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(s, &Rfc3339))
        .ok()
        .and_then(|dt| DateTime::from_timestamp(dt.unix_timestamp(), dt.nanosecond()))
        // named zones such as "GMT"
        .or_else(|| {
            DateTime::parse_from_rfc2822(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
        .or_else(|| catalog::parse_timestamp(s))
}

/// Lowercase host of a URL, or empty when it has none.
pub fn host_label(url: &str) -> String {
    url::Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Absolute form of an entry link. Absolute links are kept as written and
/// relative ones are joined onto the feed URL; `None` when neither works.
pub fn resolve_link(link: &str, feed_url: &str) -> Option<String> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }
    if url::Url::parse(link).is_ok() {
        return Some(link.to_string());
    }
    let base = url::Url::parse(feed_url.trim()).ok()?;
    base.join(link).ok().map(|u| u.to_string())
}

/// Turn one entry into a catalog item. `link` must already be resolved.
pub fn entry_to_item(
    entry: &FeedEntry,
    link: &str,
    feed_url: &str,
    now: DateTime<Utc>,
) -> CatalogItem {
    let summary = clean(entry.summary.as_deref().unwrap_or_default(), Some(SUMMARY_LEN));

    let source = Some(host_label(link))
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| host_label(feed_url));

    let title = Some(clean(entry.title.as_deref().unwrap_or_default(), None))
        .filter(|t| !t.is_empty())
        .or_else(|| Some(clean(&summary, Some(TITLE_FROM_SUMMARY_LEN))).filter(|t| !t.is_empty()))
        .unwrap_or_else(|| source.clone());

    let published = entry
        .published
        .as_deref()
        .and_then(parse_feed_date)
        .or_else(|| entry.updated.as_deref().and_then(parse_feed_date))
        .unwrap_or(now);

    CatalogItem::new(title, link, source, published, summary)
}

/// Entries whose link is missing or cannot be made absolute are dropped.
pub fn entries_to_items(
    entries: &[FeedEntry],
    feed_url: &str,
    now: DateTime<Utc>,
) -> Vec<CatalogItem> {
    entries
        .iter()
        .filter_map(|e| {
            let link = resolve_link(e.link.as_deref()?, feed_url)?;
            Some(entry_to_item(e, &link, feed_url, now))
        })
        .collect()
}

pub struct RssFetcher {
    transport: Arc<dyn Transport>,
}

impl RssFetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn parse_items_from_str(
        xml: &str,
        feed_url: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<CatalogItem>, IngestError> {
        let entries = parse_feed(xml)?;
        Ok(entries_to_items(&entries, feed_url, now))
    }
}

#[async_trait]
impl SourceFetcher for RssFetcher {
    async fn fetch(&self, source: &FeedSource) -> Result<Vec<CatalogItem>, IngestError> {
        let body = self.transport.get_ok(&source.address).await?;
        Self::parse_items_from_str(&body, &source.address, Utc::now())
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Rss
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&hellip;", "…")
        .replace("&laquo;", "\"")
        .replace("&raquo;", "\"")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn rss_title_and_date_fallbacks() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Feed</title>
  <item>
    <title>  Aerial   city </title>
    <link>https://Blog.Example.com/a</link>
    <pubDate>Tue, 28 May 2024 10:00:00 +0000</pubDate>
    <description>Drone&nbsp;shots</description>
  </item>
  <item>
    <link>https://blog.example.com/b</link>
    <description>Only a summary here</description>
  </item>
  <item>
    <link>https://blog.example.com/c</link>
  </item>
  <item>
    <title>No link, dropped</title>
  </item>
</channel></rss>"#;
        let items = RssFetcher::parse_items_from_str(xml, "https://feeds.example.net/x", now()).unwrap();
        assert_eq!(items.len(), 3);

        assert_eq!(items[0].title, "Aerial city");
        assert_eq!(items[0].source, "blog.example.com");
        assert_eq!(items[0].summary, "Drone shots");
        assert_eq!(
            items[0].published,
            Utc.with_ymd_and_hms(2024, 5, 28, 10, 0, 0).unwrap()
        );

        assert_eq!(items[1].title, "Only a summary here");
        assert_eq!(items[1].published, now());

        assert_eq!(items[2].title, "blog.example.com");
        assert_eq!(items[2].summary, "");
    }

    #[test]
    fn atom_links_and_updated_fallback() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom</title>
  <entry>
    <title type="html">Slow motion waves</title>
    <link rel="self" href="https://atom.test/self/1"/>
    <id>tag:atom.test,2024:1</id>
    <link rel="alternate" href="https://atom.test/posts/1"/>
    <updated>2024-05-30T08:00:00Z</updated>
    <summary>Ocean b-roll</summary>
  </entry>
</feed>"#;
        let items = RssFetcher::parse_items_from_str(xml, "https://atom.test/feed", now()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link, "https://atom.test/posts/1");
        assert_eq!(
            items[0].published,
            Utc.with_ymd_and_hms(2024, 5, 30, 8, 0, 0).unwrap()
        );
        assert_eq!(items[0].summary, "Ocean b-roll");
    }

    #[test]
    fn long_summary_is_capped() {
        let long = "word ".repeat(200);
        let xml = format!(
            "<rss><channel><item><link>https://x.test/1</link><description>{long}</description></item></channel></rss>"
        );
        let items = RssFetcher::parse_items_from_str(&xml, "https://x.test/feed", now()).unwrap();
        assert!(items[0].summary.chars().count() <= SUMMARY_LEN + 1);
        assert!(items[0].summary.ends_with('…'));
        assert!(items[0].title.chars().count() <= TITLE_FROM_SUMMARY_LEN + 1);
    }

    #[test]
    fn relative_links_resolve_against_feed_url() {
        let xml = r#"<rss><channel>
  <item><link>/posts/42</link></item>
  <item><title>Sibling</title><link>sibling.html</link></item>
</channel></rss>"#;
        let items = RssFetcher::parse_items_from_str(xml, "https://blog.test/feed/", now()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].link, "https://blog.test/posts/42");
        assert_eq!(items[0].uid, catalog::fingerprint("https://blog.test/posts/42"));
        assert_eq!(items[0].title, "blog.test");
        assert_eq!(items[0].source, "blog.test");
        assert_eq!(items[1].link, "https://blog.test/feed/sibling.html");

        let other = RssFetcher::parse_items_from_str(xml, "https://other.test/rss", now()).unwrap();
        assert_ne!(other[0].uid, items[0].uid);

        let atom = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry><title>Atom relative</title><link href="/a/7"/></entry>
</feed>"#;
        let items = RssFetcher::parse_items_from_str(atom, "https://atom.test/feed.xml", now()).unwrap();
        assert_eq!(items[0].link, "https://atom.test/a/7");
        assert_eq!(items[0].source, "atom.test");
    }

    #[test]
    fn unresolvable_relative_link_is_dropped() {
        let xml = "<rss><channel><item><title>x</title><link>/posts/1</link></item></channel></rss>";
        let items = RssFetcher::parse_items_from_str(xml, "not a url", now()).unwrap();
        assert!(items.is_empty());
        assert_eq!(
            resolve_link(" https://Blog.test/A ", "https://x.test/"),
            Some("https://Blog.test/A".to_string())
        );
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = parse_feed("<html><body>nope</body></html>").unwrap_err();
        assert!(matches!(err, IngestError::Parse { .. }));
    }

    #[test]
    fn host_labels() {
        assert_eq!(host_label("https://WWW.Example.com/path?q=1"), "www.example.com");
        assert_eq!(host_label("not a url"), "");
    }
}
