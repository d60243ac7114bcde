// src/ingest/config.rs
//! Line-oriented source list (`data/feeds.txt`).
//!
//! ```text
//! # stock blogs
//! https://blog.pond5.com/feed/          # trailing notes are fine
//! telegram:https://t.me/s/somechannel
//! ```
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::types::FeedSource;

const TELEGRAM_PREFIX: &str = "telegram:";

/// Read and parse a source list file.
pub fn load_sources_from(path: &Path) -> Result<Vec<FeedSource>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading source list from {}", path.display()))?;
    Ok(parse_sources(&content))
}

/// Parse source list text. Comments and blank lines are skipped and only the
/// first whitespace-delimited token of a line counts.
pub fn parse_sources(s: &str) -> Vec<FeedSource> {
    s.lines()
        .filter_map(|line| {
            let line = line.split('#').next().unwrap_or_default().trim();
            let token = line.split_whitespace().next()?;
            match token.strip_prefix(TELEGRAM_PREFIX) {
                Some(rest) => {
                    let rest = rest.trim();
                    (!rest.is_empty()).then(|| FeedSource::telegram(rest))
                }
                None => Some(FeedSource::rss(token)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::SourceKind;

    #[test]
    fn comments_blanks_and_annotations() {
        let text = "\
# header comment

https://blog.pond5.com/feed/   # pond5
https://iso.500px.com/feed/ extra words
telegram:https://t.me/s/stockchannel
   telegram:https://t.me/other  # note
telegram:
";
        let v = parse_sources(text);
        assert_eq!(v.len(), 4);
        assert_eq!(v[0], FeedSource::rss("https://blog.pond5.com/feed/"));
        assert_eq!(v[1].address, "https://iso.500px.com/feed/");
        assert_eq!(v[2].kind, SourceKind::Telegram);
        assert_eq!(v[2].address, "https://t.me/s/stockchannel");
        assert_eq!(v[3].address, "https://t.me/other");
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("feeds.txt");
        fs::write(&p, "https://a.test/rss\n").unwrap();
        let v = load_sources_from(&p).unwrap();
        assert_eq!(v, vec![FeedSource::rss("https://a.test/rss")]);
        assert!(load_sources_from(&dir.path().join("missing.txt")).is_err());
    }
}
