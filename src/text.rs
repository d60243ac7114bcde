// src/text.rs
//! Text normalization shared by ingestion and trend extraction.
//!
//! - [`clean`] collapses whitespace and caps length with an ellipsis.
//! - [`Normalizer`] tokenizes markup-laden text into lowercase word units and
//!   decides which of them are noise or camera gear.
//!
//! The word tables live in a [`Lexicon`] handed to the normalizer at
//! construction, so tests can swap in tiny tables.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;

const ELLIPSIS: char = '…';

fn re_ws() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"))
}

fn re_tags() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("tag regex"))
}

fn re_markup_prefix() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"^(wp-|attachment-|size-)").expect("markup regex"))
}

fn re_urlish() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r"(https?|www\.|\.com\b|\.jpg\b|\.png\b)").expect("urlish regex")
    })
}

fn re_focal_length() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\b\d{2,3}mm\b").expect("focal length regex"))
}

fn re_aperture() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bf/?\d+(\.\d+)?\b").expect("aperture regex"))
}

/// Collapse whitespace runs, trim, and cap at `max_len` characters.
///
/// Truncated output has trailing whitespace removed and `…` appended.
pub fn clean(text: &str, max_len: Option<usize>) -> String {
    if text.is_empty() {
        return String::new();
    }
    let out = re_ws().replace_all(text, " ");
    let out = out.trim();

    match max_len {
        Some(max) if out.chars().count() > max => {
            let mut cut: String = out.chars().take(max).collect();
            cut.truncate(cut.trim_end().len());
            cut.push(ELLIPSIS);
            cut
        }
        _ => out.to_string(),
    }
}

/// Word tables driving noise and gear detection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Lexicon {
    /// Language stop words (English + Russian by default).
    pub stop_words: Vec<String>,
    /// HTML / WordPress residue.
    pub markup: Vec<String>,
    /// Equipment brands and generic gear vocabulary. Always noise, always gear.
    pub brands: Vec<String>,
    /// Short technical tokens that survive the length filter.
    pub keep: Vec<String>,
    /// Nouns that mark a whole phrase as gear talk.
    pub gear_nouns: Vec<String>,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::default_seed()
    }
}

impl Lexicon {
    pub fn default_seed() -> Self {
        fn words(s: &str) -> Vec<String> {
            s.split_whitespace().map(str::to_string).collect()
        }

        Self {
            stop_words: words(
                "and the for you your with from into what when how this that they them are our \
                 more learn click view read see free a an of on in to by as is it its be or not \
                 can new best top news blog post posts page pages site here most tips about \
                 это как что для при или они она он его ее без уже ещё еще если когда куда либо \
                 либо-то либо-либо всех тут",
            ),
            markup: words(
                "amp nbsp href img src class quot ins figure html jpg jpeg png http https www com \
                 assets uploads background height width size card wp wp-post-image attachment \
                 attachment-card-large size-card-large",
            ),
            brands: words(
                "nikon canon sony fuji fujifilm pentax leica sigma tamron viltrox voigtlander \
                 nokton rf ef af dslr mirrorless sensor aperture bokeh lens lenses frame",
            ),
            keep: words("4k 8k 1080p 720p 60fps 30fps hdr 9x16 9:16"),
            gear_nouns: words("lens mm camera"),
        }
    }
}

/// Tokenizer plus noise/gear predicates over a [`Lexicon`].
#[derive(Debug, Clone)]
pub struct Normalizer {
    stop: HashSet<String>,
    brands: HashSet<String>,
    keep: HashSet<String>,
    gear_nouns: HashSet<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&Lexicon::default_seed())
    }
}

impl Normalizer {
    pub fn new(lexicon: &Lexicon) -> Self {
        let lower = |v: &[String]| -> HashSet<String> {
            v.iter().map(|w| w.trim().to_lowercase()).filter(|w| !w.is_empty()).collect()
        };
        let brands = lower(&lexicon.brands);
        let mut stop = lower(&lexicon.stop_words);
        stop.extend(lower(&lexicon.markup));
        stop.extend(brands.iter().cloned());

        Self {
            stop,
            brands,
            keep: lower(&lexicon.keep),
            gear_nouns: lower(&lexicon.gear_nouns),
        }
    }

    /// Split text into lowercase tokens, dropping noise.
    ///
    /// Entities are unescaped and tags stripped first. Only Latin and Cyrillic
    /// letters, digits, `-` and `:` survive, so `9:16` and `9x16` stay whole.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        let decoded = html_escape::decode_html_entities(text);
        let stripped = re_tags().replace_all(&decoded, " ");
        let lowered = stripped.to_lowercase();

        let restricted: String = lowered
            .chars()
            .map(|c| if is_token_char(c) { c } else { ' ' })
            .collect();

        restricted
            .split_whitespace()
            .map(|t| t.trim_matches('-'))
            .filter(|t| self.keep.contains(*t) || !self.is_noise(t))
            .map(str::to_string)
            .collect()
    }

    pub fn is_noise(&self, token: &str) -> bool {
        if token.is_empty() {
            return true;
        }
        if self.stop.contains(token) {
            return true;
        }
        if re_markup_prefix().is_match(token) || re_urlish().is_match(token) {
            return true;
        }
        if token.chars().count() <= 3 && !self.keep.contains(token) {
            return true;
        }
        token.chars().all(|c| c.is_ascii_digit())
    }

    pub fn is_gear_token(&self, token: &str) -> bool {
        self.brands.contains(token)
            || re_focal_length().is_match(token)
            || re_aperture().is_match(token)
    }

    /// A phrase is gear when any word is gear or it names generic equipment.
    pub fn is_gear_phrase(&self, phrase: &str) -> bool {
        let mut parts = phrase.split_whitespace().peekable();
        if parts.peek().is_none() {
            return false;
        }
        parts.any(|p| self.is_gear_token(p) || self.gear_nouns.contains(p))
            || re_focal_length().is_match(phrase)
            || re_aperture().is_match(phrase)
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_lowercase()
        || c.is_ascii_digit()
        || ('а'..='я').contains(&c)
        || c == 'ё'
        || c == '-'
        || c == ':'
        || c.is_whitespace()
}
