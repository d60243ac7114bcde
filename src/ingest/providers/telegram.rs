// src/ingest/providers/telegram.rs
//! Public Telegram channel fetcher.
//!
//! A channel is tried through an ordered chain of [`ChannelStrategy`] objects
//! and the first non-empty result wins:
//!
//! 1. [`RssProxyStrategy`]: an RSS bridge keyed by channel name.
//! 2. [`PreviewPageStrategy`]: the `t.me/s/<channel>` preview page, retried
//!    once through a text mirror when the page is unusable.
//!
//! Strategy failures are logged and the chain moves on. A channel that
//! exhausts the chain yields no items, never an error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::catalog::{self, CatalogItem};
use crate::error::IngestError;
use crate::http::Transport;
use crate::ingest::providers::rss;
use crate::ingest::types::{FeedSource, SourceFetcher, SourceKind};
use crate::text::clean;

pub const TELEGRAM_SOURCE: &str = "t.me";
pub const MESSAGE_MARKER: &str = "tgme_widget_message_wrap";
pub const DEFAULT_RSS_PROXY_BASE: &str = "https://rsshub.app/telegram/channel";
pub const DEFAULT_MIRROR_BASE: &str = "https://r.jina.ai";
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(1000);

const TITLE_LEN: usize = 100;
const SUMMARY_LEN: usize = 500;

fn re_channel_url() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"^https?://t\.me/(?:s/)?([^/?#\s]+)").expect("channel regex"))
}

fn re_inline_link() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"!?\[([^\[\]]*)\]\([^)]*\)").expect("inline link regex"))
}

fn re_trailing_digits() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s*$").expect("digits regex"))
}

/// A resolved public channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub name: String,
    pub preview_url: String,
}

impl Channel {
    pub fn post_link(&self, id: &str) -> String {
        format!("https://t.me/{}/{}", self.name, id)
    }
}

/// Accepts `https://t.me/<channel>` and `https://t.me/s/<channel>`.
pub fn resolve_channel(url: &str) -> Result<Channel, IngestError> {
    let caps = re_channel_url()
        .captures(url.trim())
        .ok_or_else(|| IngestError::parse(format!("channel url {url}"), "not a t.me URL"))?;
    let name = caps[1].to_string();
    Ok(Channel {
        preview_url: format!("https://t.me/s/{name}"),
        name,
    })
}

#[async_trait]
pub trait ChannelStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetch posts or return an empty list / error to let the next strategy run.
    async fn fetch(
        &self,
        channel: &Channel,
        transport: &dyn Transport,
        now: DateTime<Utc>,
    ) -> Result<Vec<CatalogItem>, IngestError>;
}

/// RSS bridge (`<base>/<channel>`), parsed like any feed.
pub struct RssProxyStrategy {
    base: String,
}

impl RssProxyStrategy {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, channel: &Channel) -> String {
        format!("{}/{}", self.base, channel.name)
    }
}

impl Default for RssProxyStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_RSS_PROXY_BASE)
    }
}

/// Proxy entries without a link get one built from a numeric id suffix.
pub fn proxy_items_from_feed(
    xml: &str,
    feed_url: &str,
    channel: &Channel,
    now: DateTime<Utc>,
) -> Result<Vec<CatalogItem>, IngestError> {
    let entries = rss::parse_feed(xml)?;
    Ok(entries
        .iter()
        .filter_map(|e| {
            let link = e
                .link
                .as_deref()
                .and_then(|l| rss::resolve_link(l, feed_url))
                .or_else(|| {
                    let id = e.id.as_deref()?;
                    let caps = re_trailing_digits().captures(id)?;
                    Some(channel.post_link(&caps[1]))
                })?;
            let mut item = rss::entry_to_item(e, &link, feed_url, now);
            item.source = TELEGRAM_SOURCE.to_string();
            Some(item)
        })
        .collect())
}

#[async_trait]
impl ChannelStrategy for RssProxyStrategy {
    fn name(&self) -> &'static str {
        "rss-proxy"
    }

    async fn fetch(
        &self,
        channel: &Channel,
        transport: &dyn Transport,
        now: DateTime<Utc>,
    ) -> Result<Vec<CatalogItem>, IngestError> {
        let url = self.url_for(channel);
        let body = transport.get_ok(&url).await?;
        proxy_items_from_feed(&body, &url, channel, now)
    }
}

/// Direct preview page with a single retry through a text mirror.
pub struct PreviewPageStrategy {
    mirror_base: String,
}

impl PreviewPageStrategy {
    pub fn new(mirror_base: impl Into<String>) -> Self {
        Self {
            mirror_base: mirror_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn mirror_url_for(&self, channel: &Channel) -> String {
        format!("{}/http://t.me/s/{}", self.mirror_base, channel.name)
    }
}

impl Default for PreviewPageStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_MIRROR_BASE)
    }
}

#[async_trait]
impl ChannelStrategy for PreviewPageStrategy {
    fn name(&self) -> &'static str {
        "preview-page"
    }

    async fn fetch(
        &self,
        channel: &Channel,
        transport: &dyn Transport,
        now: DateTime<Utc>,
    ) -> Result<Vec<CatalogItem>, IngestError> {
        let direct = transport.get(&channel.preview_url).await;
        let body = match direct {
            Ok(page) if !page.is_error() && page.body.contains(MESSAGE_MARKER) => page.body,
            other => {
                match other {
                    Ok(page) => debug!(
                        channel = %channel.name,
                        status = page.status,
                        "preview page unusable, trying mirror"
                    ),
                    Err(e) => debug!(
                        channel = %channel.name,
                        error = %e,
                        "preview page failed, trying mirror"
                    ),
                }
                let mirror = self.mirror_url_for(channel);
                transport.get_ok(&mirror).await?
            }
        };
        Ok(parse_preview_page(&body, channel, now))
    }
}

fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Visible text of an element: fragments trimmed and joined with a space.
pub(crate) fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a preview page (direct or mirrored).
///
/// Structured message blocks are preferred; pages without them are scanned
/// for post links instead.
pub fn parse_preview_page(html: &str, channel: &Channel, now: DateTime<Utc>) -> Vec<CatalogItem> {
    let doc = Html::parse_document(html);
    let wrap_sel = sel("div.tgme_widget_message_wrap");
    if doc.select(&wrap_sel).next().is_some() {
        return parse_message_blocks(&doc, channel, now);
    }
    let from_anchors = parse_post_anchors(&doc, channel, now);
    if !from_anchors.is_empty() {
        return from_anchors;
    }
    parse_markdown_links(html, channel, now)
}

fn parse_message_blocks(doc: &Html, channel: &Channel, now: DateTime<Utc>) -> Vec<CatalogItem> {
    let wrap_sel = sel("div.tgme_widget_message_wrap");
    let inner_sel = sel(".tgme_widget_message[data-post]");
    let text_sel = sel(".tgme_widget_message_text");
    let js_text_sel = sel(".js-message_text");
    let time_sel = sel("time");

    let mut out = Vec::new();
    for block in doc.select(&wrap_sel) {
        let post = block.value().attr("data-post").or_else(|| {
            block
                .select(&inner_sel)
                .next()
                .and_then(|el| el.value().attr("data-post"))
        });
        let Some((_, id)) = post.and_then(|p| p.split_once('/')) else {
            continue;
        };
        let id = id.trim();
        if id.is_empty() {
            continue;
        }

        let text = block
            .select(&text_sel)
            .next()
            .or_else(|| block.select(&js_text_sel).next())
            .map(|el| element_text(&el))
            .unwrap_or_default();

        let title = Some(clean(&text, Some(TITLE_LEN)))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| format!("Telegram post {id}"));

        let published = block
            .select(&time_sel)
            .next()
            .and_then(|t| {
                t.value()
                    .attr("datetime")
                    .or_else(|| t.value().attr("datetime-original"))
            })
            .and_then(catalog::parse_timestamp)
            .unwrap_or(now);

        out.push(CatalogItem::new(
            title,
            channel.post_link(id),
            TELEGRAM_SOURCE,
            published,
            clean(&text, Some(SUMMARY_LEN)),
        ));
    }
    out
}

fn post_link_regex(channel: &Channel) -> Option<Regex> {
    Regex::new(&format!(r"^https?://t\.me/{}/(\d+)", regex::escape(&channel.name))).ok()
}

fn flattened_item(text: &str, id: &str, channel: &Channel, now: DateTime<Utc>) -> CatalogItem {
    CatalogItem::new(
        clean(text, Some(TITLE_LEN)),
        channel.post_link(id),
        TELEGRAM_SOURCE,
        now,
        clean(text, Some(SUMMARY_LEN)),
    )
}

fn parse_post_anchors(doc: &Html, channel: &Channel, now: DateTime<Utc>) -> Vec<CatalogItem> {
    let Some(re) = post_link_regex(channel) else {
        return Vec::new();
    };
    let anchor_sel = sel("a[href*='t.me/']");
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for a in doc.select(&anchor_sel) {
        let href = a.value().attr("href").unwrap_or_default();
        let Some(caps) = re.captures(href) else {
            continue;
        };
        let text = element_text(&a);
        if text.is_empty() || !seen.insert(caps[1].to_string()) {
            continue;
        }
        out.push(flattened_item(&text, &caps[1], channel, now));
    }
    out
}

/// Text mirrors render links as Markdown: `[text](https://t.me/<channel>/<id>)`.
/// The text may hold one level of nested links or images, e.g.
/// `[![Image](https://cdn/..)](https://t.me/<channel>/<id>)`.
fn parse_markdown_links(body: &str, channel: &Channel, now: DateTime<Utc>) -> Vec<CatalogItem> {
    let pattern = format!(
        r"\[((?:[^\[\]]|!?\[[^\[\]]*\]\([^)]*\))*)\]\(https?://t\.me/{}/(\d+)[^)]*\)",
        regex::escape(&channel.name)
    );
    let Ok(re) = Regex::new(&pattern) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for caps in re.captures_iter(body) {
        let text = clean(&re_inline_link().replace_all(&caps[1], "$1"), None);
        if text.is_empty() || !seen.insert(caps[2].to_string()) {
            continue;
        }
        out.push(flattened_item(&text, &caps[2], channel, now));
    }
    out
}

pub struct TelegramFetcher {
    transport: Arc<dyn Transport>,
    strategies: Vec<Box<dyn ChannelStrategy>>,
    throttle: Duration,
}

impl TelegramFetcher {
    /// Default chain: RSS proxy, then preview page with mirror retry.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            strategies: vec![
                Box::new(RssProxyStrategy::default()),
                Box::new(PreviewPageStrategy::default()),
            ],
            throttle: DEFAULT_THROTTLE,
        }
    }

    pub fn with_endpoints(mut self, rss_proxy_base: &str, mirror_base: &str) -> Self {
        self.strategies = vec![
            Box::new(RssProxyStrategy::new(rss_proxy_base)),
            Box::new(PreviewPageStrategy::new(mirror_base)),
        ];
        self
    }

    pub fn with_strategies(mut self, strategies: Vec<Box<dyn ChannelStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    async fn run_chain(&self, channel: &Channel) -> Vec<CatalogItem> {
        let now = Utc::now();
        for strategy in &self.strategies {
            match strategy.fetch(channel, self.transport.as_ref(), now).await {
                Ok(items) if !items.is_empty() => {
                    debug!(
                        channel = %channel.name,
                        strategy = strategy.name(),
                        items = items.len(),
                        "telegram strategy succeeded"
                    );
                    return items;
                }
                Ok(_) => debug!(
                    channel = %channel.name,
                    strategy = strategy.name(),
                    "telegram strategy returned nothing"
                ),
                Err(e) => warn!(
                    channel = %channel.name,
                    strategy = strategy.name(),
                    error = %e,
                    "telegram strategy failed"
                ),
            }
        }
        Vec::new()
    }
}

#[async_trait]
impl SourceFetcher for TelegramFetcher {
    async fn fetch(&self, source: &FeedSource) -> Result<Vec<CatalogItem>, IngestError> {
        // An unresolvable address makes no request, so it is not throttled.
        let channel = resolve_channel(&source.address)?;
        let items = self.run_chain(&channel).await;
        if !self.throttle.is_zero() {
            tokio::time::sleep(self.throttle).await;
        }
        Ok(items)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Telegram
    }
}
