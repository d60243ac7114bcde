//! # Domain Weights
//!
//! Maps catalog source labels (lowercase hosts such as `blog.pond5.com` or
//! `t.me`) to multiplicative trend weights, and decides which sources may
//! contribute to the trend window at all.
//!
//! - Weight lookup is exact on the normalized label; unknown labels get
//!   `default_weight` (1.0 unless configured).
//! - The allow-list matches by suffix, so `shutterstock.com` admits
//!   `www.shutterstock.com`.
//! - `default_seed()` carries the built-in stock-media tables.

use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DomainWeights {
    /// Weight for labels missing from `weights`.
    pub default_weight: f64,
    /// Explicit weights per source label.
    pub weights: HashMap<String, f64>,
    /// Suffixes of source labels allowed into the trend window.
    pub allowed: Vec<String>,
}

impl Default for DomainWeights {
    fn default() -> Self {
        Self::default_seed()
    }
}

impl DomainWeights {
    pub fn new(weights: HashMap<String, f64>, allowed: Vec<String>) -> Self {
        Self {
            default_weight: 1.0,
            weights: weights
                .into_iter()
                .map(|(k, v)| (normalize(&k), v))
                .collect(),
            allowed: allowed.iter().map(|a| normalize(a)).collect(),
        }
    }

    /// Weight for a source label; `default_weight` when unlisted.
    pub fn weight_for(&self, source: &str) -> f64 {
        let s = normalize(source);
        self.weights
            .get(&s)
            .or_else(|| {
                // Config files may carry mixed-case keys.
                self.weights
                    .iter()
                    .find(|(k, _)| normalize(k) == s)
                    .map(|(_, w)| w)
            })
            .copied()
            .unwrap_or(self.default_weight)
    }

    /// True when the label ends with any allow-listed suffix.
    pub fn is_allowed(&self, source: &str) -> bool {
        let s = normalize(source);
        if s.is_empty() {
            return false;
        }
        self.allowed
            .iter()
            .map(|a| normalize(a))
            .any(|a| !a.is_empty() && s.ends_with(&a))
    }

    /// Stock-media oriented seed: photo/video stock blogs ranked up, general
    /// photography blogs ranked down.
    pub fn default_seed() -> Self {
        let mut weights = HashMap::new();
        for (k, v) in [
            ("blog.pond5.com", 3.0),
            ("www.shutterstock.com", 2.5),
            ("shutterstock.com", 2.5),
            ("blog.depositphotos.com", 2.2),
            ("blog.dreamstime.com", 2.0),
            ("www.alamy.com", 2.0),
            ("videvo.net", 2.0),
            ("motionarray.com", 1.8),
            ("feeds.feedburner.com", 1.6),
            ("iso.500px.com", 1.5),
            ("t.me", 2.0),
            ("petapixel.com", 0.6),
            ("www.petapixel.com", 0.6),
            ("fstoppers.com", 0.8),
            ("www.fstoppers.com", 0.8),
            ("ephotozine.com", 0.5),
            ("www.ephotozine.com", 0.5),
            ("photographylife.com", 0.9),
            ("digital-photography-school.com", 1.2),
        ] {
            weights.insert(k.to_string(), v);
        }

        let allowed = [
            "blog.pond5.com",
            "shutterstock.com",
            "www.shutterstock.com",
            "blog.depositphotos.com",
            "blog.dreamstime.com",
            "www.alamy.com",
            "videvo.net",
            "motionarray.com",
            "feeds.feedburner.com",
            "iso.500px.com",
            "t.me",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        Self {
            default_weight: 1.0,
            weights,
            allowed,
        }
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> DomainWeights {
        DomainWeights::default_seed()
    }

    #[test]
    fn exact_match() {
        assert!((cfg().weight_for("blog.pond5.com") - 3.0).abs() < 1e-9);
        assert!((cfg().weight_for("t.me") - 2.0).abs() < 1e-9);
    }

    #[test]
    fn case_insensitive_lookup() {
        let c = cfg();
        assert!((c.weight_for("PetaPixel.com") - 0.6).abs() < 1e-9);
    }

    #[test]
    fn default_weight_used() {
        assert!((cfg().weight_for("example.org") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn allow_list_matches_by_suffix() {
        let c = cfg();
        assert!(c.is_allowed("www.shutterstock.com"));
        assert!(c.is_allowed("T.ME"));
        assert!(!c.is_allowed("petapixel.com"));
        assert!(!c.is_allowed(""));
    }

    #[test]
    fn mixed_case_config_keys_are_found() {
        let mut w = HashMap::new();
        w.insert("Blog.Example.com".to_string(), 4.0);
        let mut c = DomainWeights::default_seed();
        c.weights = w;
        assert!((c.weight_for("blog.example.com") - 4.0).abs() < 1e-9);
    }
}
