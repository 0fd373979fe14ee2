//! Shared pattern aggregation
//!
//! `PatternAggregator` implements the counting contract every frequency
//! analyzer runs through. Counting is always by distinct-site cardinality:
//! a value observed multiple times on one site contributes one site, and the
//! `min_occurrences` filter is applied exactly once, on `site_count`.

use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};

use crate::types::analysis_thresholds::EXAMPLE_VALUE_MAX_CHARS;
use crate::types::{AnalysisOptions, PatternRecord, ResultMetadata};

/// Fingerprints dropped when `semantic_filtering` is enabled.
///
/// Matching is case-insensitive against the full fingerprint and against the
/// key part after the scope prefix (so `viewport` also drops `name:viewport`).
pub const SEMANTIC_SKIP_LIST: &[&str] = &[
    "viewport",
    "charset",
    "robots",
    "googlebot",
    "http-equiv:content-type",
    "format-detection",
    "theme-color",
];

/// Whether a fingerprint is on the semantic skip list
pub fn is_semantically_skipped(fingerprint: &str) -> bool {
    let lower = fingerprint.to_ascii_lowercase();
    let key_part = lower.split_once(':').map_or(lower.as_str(), |(_, k)| k);
    SEMANTIC_SKIP_LIST
        .iter()
        .any(|skip| *skip == lower || *skip == key_part)
}

/// Render one example as `key="value"`, truncating long values
pub fn render_example(key: &str, value: &str) -> String {
    if value.chars().count() > EXAMPLE_VALUE_MAX_CHARS {
        let truncated: String = value.chars().take(EXAMPLE_VALUE_MAX_CHARS).collect();
        format!("{key}=\"{truncated}...\"")
    } else {
        format!("{key}=\"{value}\"")
    }
}

#[derive(Debug, Default, Clone)]
struct AggregateEntry {
    sites: BTreeSet<String>,
    value_sites: BTreeMap<String, BTreeSet<String>>,
}

/// Accumulates fingerprint observations across one dataset traversal
#[derive(Debug)]
pub struct PatternAggregator {
    total_sites: usize,
    entries: BTreeMap<String, AggregateEntry>,
}

impl PatternAggregator {
    pub fn new(total_sites: usize) -> Self {
        Self {
            total_sites,
            entries: BTreeMap::new(),
        }
    }

    /// Record one observation of `fingerprint` on `site` with its values.
    ///
    /// Observing the same site again only extends the value bookkeeping; the
    /// site set deduplicates by construction.
    pub fn observe<'v>(
        &mut self,
        fingerprint: &str,
        site: &str,
        values: impl IntoIterator<Item = &'v str>,
    ) {
        let entry = self.entries.entry(fingerprint.to_string()).or_default();
        entry.sites.insert(site.to_string());
        for value in values {
            entry
                .value_sites
                .entry(value.to_string())
                .or_default()
                .insert(site.to_string());
        }
    }

    /// Fingerprints observed so far, before any filtering
    pub fn total_found(&self) -> usize {
        self.entries.len()
    }

    /// Apply the single filter pass and build pattern records.
    ///
    /// `with_value_frequencies` attaches a `valueFrequencies` metadata map
    /// (value -> distinct-site count) to each surviving pattern.
    pub fn finish(
        self,
        options: &AnalysisOptions,
        with_value_frequencies: bool,
    ) -> BTreeMap<String, PatternRecord> {
        let total_sites = self.total_sites;
        let mut patterns = BTreeMap::new();

        for (fingerprint, entry) in self.entries {
            let site_count = entry.sites.len();
            if site_count < options.min_occurrences {
                continue;
            }
            if options.semantic_filtering && is_semantically_skipped(&fingerprint) {
                continue;
            }

            let frequency = if total_sites == 0 {
                0.0
            } else {
                site_count as f64 / total_sites as f64
            };

            let examples = if options.include_examples {
                let rendered: BTreeSet<String> = entry
                    .value_sites
                    .keys()
                    .map(|value| render_example(&fingerprint, value))
                    .take(options.max_examples)
                    .collect();
                Some(rendered)
            } else {
                None
            };

            let metadata = if with_value_frequencies {
                let frequencies: serde_json::Map<String, serde_json::Value> = entry
                    .value_sites
                    .iter()
                    .map(|(value, sites)| (value.clone(), serde_json::json!(sites.len())))
                    .collect();
                let mut map = BTreeMap::new();
                map.insert(
                    "valueFrequencies".to_string(),
                    serde_json::Value::Object(frequencies),
                );
                Some(map)
            } else {
                None
            };

            patterns.insert(
                fingerprint.clone(),
                PatternRecord {
                    pattern: fingerprint,
                    site_count,
                    sites: entry.sites,
                    frequency,
                    examples,
                    metadata,
                },
            );
        }

        patterns
    }
}

/// Build the shared envelope metadata for an analyzer run
pub fn result_metadata(
    analyzer: &str,
    total_found: usize,
    after_filtering: usize,
    options: &AnalysisOptions,
) -> ResultMetadata {
    ResultMetadata {
        analyzer: analyzer.to_string(),
        analyzed_at: Utc::now(),
        total_patterns_found: total_found,
        total_patterns_after_filtering: after_filtering,
        options: options.clone(),
    }
}
