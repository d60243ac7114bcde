// src/trends/mod.rs
//! Trend extraction over a recent window of the catalog.
//!
//! Each contributing row adds its domain weight to every non-gear unigram and
//! to every adjacent bigram/trigram that is not a gear phrase. Scores are
//! therefore weighted counts: one mention from a 3.0 source beats two from a
//! 1.0 source.

pub mod report;
pub mod vendor;

use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::catalog::CatalogRecord;
use crate::config::TrendsSettings;
use crate::text::Normalizer;

/// Start of a `days`-long window ending at `now`. A window reaching past the
/// representable range has no lower bound.
fn window_start(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    Duration::try_days(days)
        .and_then(|d| now.checked_sub_signed(d))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Ranked `(phrase, score)` pairs, best first.
pub type Ranked = Vec<(String, f64)>;

/// Additive counter that remembers first-seen order for tie-breaking.
#[derive(Debug, Clone, Default)]
pub struct TermCounter {
    entries: Vec<(String, f64)>,
    index: HashMap<String, usize>,
}

impl TermCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, term: &str, weight: f64) {
        match self.index.get(term) {
            Some(&i) => self.entries[i].1 += weight,
            None => {
                self.index.insert(term.to_string(), self.entries.len());
                self.entries.push((term.to_string(), weight));
            }
        }
    }

    pub fn get(&self, term: &str) -> f64 {
        self.index
            .get(term)
            .map(|&i| self.entries[i].1)
            .unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top `n` by descending score; equal scores keep insertion order.
    pub fn most_common(&self, n: usize) -> Ranked {
        let mut v = self.entries.clone();
        v.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        v.truncate(n);
        v
    }
}

/// Raw weighted counts for one aggregation pass.
#[derive(Debug, Clone, Default)]
pub struct Ngrams {
    pub words: TermCounter,
    pub bigrams: TermCounter,
    pub trigrams: TermCounter,
    /// Rows that passed the allow-list and window.
    pub rows_used: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendReport {
    pub generated: DateTime<Utc>,
    pub words: Ranked,
    pub bigrams: Ranked,
    pub trigrams: Ranked,
    pub vendor: Ranked,
}

pub struct TrendAggregator {
    settings: TrendsSettings,
    normalizer: Normalizer,
}

impl TrendAggregator {
    pub fn new(settings: TrendsSettings, normalizer: Normalizer) -> Self {
        Self {
            settings,
            normalizer,
        }
    }

    /// Allowed source and a parseable `published` no older than the window.
    /// Rows without a usable date are excluded.
    fn contributes(&self, rec: &CatalogRecord, cutoff: DateTime<Utc>) -> bool {
        if !self.settings.domains.is_allowed(&rec.source) {
            return false;
        }
        matches!(rec.published_at(), Some(dt) if dt >= cutoff)
    }

    pub fn aggregate<'a, I>(&self, records: I, now: DateTime<Utc>) -> Ngrams
    where
        I: IntoIterator<Item = &'a CatalogRecord>,
    {
        let cutoff = window_start(now, self.settings.days);
        let mut out = Ngrams::default();

        for rec in records {
            if !self.contributes(rec, cutoff) {
                continue;
            }
            out.rows_used += 1;

            let w = self.settings.domains.weight_for(&rec.source);
            let toks = self
                .normalizer
                .tokenize(&format!("{} {}", rec.title, rec.summary));

            for t in &toks {
                if self.normalizer.is_gear_token(t) {
                    continue;
                }
                out.words.add(t, w);
            }
            for pair in toks.windows(2) {
                let g = pair.join(" ");
                if !self.normalizer.is_gear_phrase(&g) {
                    out.bigrams.add(&g, w);
                }
            }
            for triple in toks.windows(3) {
                let g = triple.join(" ");
                if !self.normalizer.is_gear_phrase(&g) {
                    out.trigrams.add(&g, w);
                }
            }
        }

        tracing::debug!(
            rows = out.rows_used,
            words = out.words.len(),
            bigrams = out.bigrams.len(),
            trigrams = out.trigrams.len(),
            "catalog aggregated"
        );
        out
    }

    /// Ranked lists from the catalog window merged with vendor signals.
    pub fn build_report<'a, I>(&self, records: I, vendor: Ranked, now: DateTime<Utc>) -> TrendReport
    where
        I: IntoIterator<Item = &'a CatalogRecord>,
    {
        let grams = self.aggregate(records, now);
        TrendReport {
            generated: now,
            words: grams.words.most_common(self.settings.top_words),
            bigrams: grams.bigrams.most_common(self.settings.top_bigrams),
            trigrams: grams.trigrams.most_common(self.settings.top_trigrams),
            vendor,
        }
    }
}
