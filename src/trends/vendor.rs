// src/trends/vendor.rs
//! Secondary signal from vendor trend pages (Getty, Adobe Stock, ...).
//!
//! Only headings, paragraphs, list items and link texts are read so page
//! chrome does not drown the signal.

use scraper::{Html, Selector};
use tracing::debug;

use super::{Ranked, TermCounter};
use crate::http::Transport;
use crate::text::Normalizer;

const VISIBLE_SELECTOR: &str = "h1, h2, h3, p, li, a";

/// Visible text of the content elements, space-joined.
pub fn extract_visible_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let Ok(sel) = Selector::parse(VISIBLE_SELECTOR) else {
        return String::new();
    };
    doc.select(&sel)
        .map(|el| {
            el.text()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fold page texts into a counter with a flat per-token weight.
pub fn accumulate_signals<'a, I>(texts: I, normalizer: &Normalizer, weight: f64) -> TermCounter
where
    I: IntoIterator<Item = &'a str>,
{
    let mut bag = TermCounter::new();
    for text in texts {
        for t in normalizer.tokenize(text) {
            if normalizer.is_gear_token(&t) {
                continue;
            }
            bag.add(&t, weight);
        }
    }
    bag
}

/// Fetch every page in order and rank the combined tokens.
/// A page that fails to load contributes nothing.
pub async fn fetch_vendor_signals(
    transport: &dyn Transport,
    pages: &[String],
    normalizer: &Normalizer,
    weight: f64,
    top: usize,
) -> Ranked {
    let mut texts = Vec::with_capacity(pages.len());
    for url in pages {
        match transport.get_ok(url).await {
            Ok(body) => {
                let text = extract_visible_text(&body);
                if !text.is_empty() {
                    texts.push(text);
                }
            }
            Err(e) => debug!(page = %url, error = %e, "vendor page skipped"),
        }
    }
    accumulate_signals(texts.iter().map(String::as_str), normalizer, weight).most_common(top)
}
