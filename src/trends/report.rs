// src/trends/report.rs
//! Markdown rendering of a [`TrendReport`]. The file is rewritten on every run.

use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use super::TrendReport;
use crate::config::ReportSettings;

fn push_section(md: &mut String, heading: &str, items: &[(String, f64)], limit: usize) {
    let _ = writeln!(md, "## {heading}");
    for (phrase, score) in items.iter().take(limit) {
        let _ = writeln!(md, "- {phrase} — {score:.1}");
    }
    md.push('\n');
}

pub fn render_markdown(report: &TrendReport, settings: &ReportSettings) -> String {
    let mut md = String::new();
    md.push_str("---\n");
    md.push_str("layout: page\n");
    let _ = writeln!(md, "title: {}", settings.title);
    let _ = writeln!(md, "permalink: {}", settings.permalink);
    md.push_str("---\n\n");
    let _ = writeln!(
        md,
        "_Updated: {} (UTC)_\n",
        report.generated.format("%Y-%m-%d")
    );

    push_section(&mut md, "Top phrases (bigrams)", &report.bigrams, settings.bigram_limit);
    push_section(&mut md, "Top phrases (trigrams)", &report.trigrams, settings.trigram_limit);
    push_section(&mut md, "Frequent words (noise check)", &report.words, settings.word_limit);
    push_section(
        &mut md,
        "Signals from vendor trend pages",
        &report.vendor,
        settings.vendor_limit,
    );

    md.push_str("> Use the phrases as shooting themes and as upload keywords.\n");
    md
}

/// Write the rendered report, creating parent directories.
pub fn write_report(path: &Path, report: &TrendReport, settings: &ReportSettings) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating report dir {}", parent.display()))?;
    }
    fs::write(path, render_markdown(report, settings))
        .with_context(|| format!("writing report {}", path.display()))?;
    tracing::info!(path = %path.display(), "trend report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn report() -> TrendReport {
        TrendReport {
            generated: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            words: vec![("sunset".into(), 4.0), ("drone".into(), 2.5)],
            bigrams: vec![("golden hour".into(), 3.0)],
            trigrams: vec![],
            vendor: vec![("wellness".into(), 6.0)],
        }
    }

    #[test]
    fn renders_front_matter_and_sections_in_order() {
        let md = render_markdown(&report(), &ReportSettings::default());
        assert!(md.starts_with("---\nlayout: page\ntitle: Trends of the week\npermalink: /trends/\n---\n"));
        assert!(md.contains("_Updated: 2024-06-01 (UTC)_"));
        assert!(md.contains("- golden hour — 3.0\n"));
        assert!(md.contains("- drone — 2.5\n"));

        let bi = md.find("(bigrams)").unwrap();
        let tri = md.find("(trigrams)").unwrap();
        let words = md.find("Frequent words").unwrap();
        let vendor = md.find("vendor trend pages").unwrap();
        assert!(bi < tri && tri < words && words < vendor);
    }

    #[test]
    fn limits_apply_and_file_is_rewritten() {
        let settings = ReportSettings {
            word_limit: 1,
            ..ReportSettings::default()
        };
        let md = render_markdown(&report(), &settings);
        assert!(md.contains("- sunset — 4.0"));
        assert!(!md.contains("- drone"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs/trends/index.md");
        write_report(&path, &report(), &settings).unwrap();
        write_report(&path, &report(), &settings).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("layout: page").count(), 1);
    }
}
