//! Meta tag frequency analyzer
//!
//! Fingerprints are already normalized upstream to
//! `{name|property|http-equiv}:{key}`. The analyzer classifies each
//! fingerprint by scope and exposes the OpenGraph and Twitter subsets, which
//! are always subsets of the surviving pattern keys.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::aggregate::{result_metadata, PatternAggregator};
use super::CorpusAnalyzer;
use crate::types::{AnalysisError, AnalysisOptions, AnalysisResult, PreprocessedDataset};

/// Scope of a meta tag fingerprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetaType {
    Name,
    Property,
    HttpEquiv,
    Unknown,
}

impl MetaType {
    /// Classify from the fingerprint's scope prefix
    pub fn from_fingerprint(fingerprint: &str) -> Self {
        match fingerprint.split_once(':').map(|(scope, _)| scope) {
            Some("name") => Self::Name,
            Some("property") => Self::Property,
            Some("http-equiv") => Self::HttpEquiv,
            _ => Self::Unknown,
        }
    }
}

/// Analyzer-specific payload of the meta tag analyzer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaAnalysis {
    /// Surviving fingerprints containing `og:`
    pub og_tags: BTreeSet<String>,
    /// Surviving fingerprints containing `twitter:`
    pub twitter_tags: BTreeSet<String>,
    /// Fingerprint -> scope classification
    pub meta_types: BTreeMap<String, MetaType>,
}

/// Frequency analysis over normalized meta tag fingerprints
#[derive(Debug, Default)]
pub struct MetaAnalyzer;

impl MetaAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl CorpusAnalyzer for MetaAnalyzer {
    type Payload = MetaAnalysis;

    fn name(&self) -> &'static str {
        "MetaAnalyzerV2"
    }

    fn analyze(
        &self,
        dataset: &PreprocessedDataset,
        options: &AnalysisOptions,
    ) -> Result<AnalysisResult<Self::Payload>, AnalysisError> {
        options.validate()?;

        let mut aggregator = PatternAggregator::new(dataset.total_sites);
        for (url, site) in &dataset.sites {
            for (fingerprint, values) in &site.meta_tags {
                aggregator.observe(fingerprint, url, values.iter().map(String::as_str));
            }
        }

        let total_found = aggregator.total_found();
        let patterns = aggregator.finish(options, true);

        // Classifier maps are derived from the *filtered* pattern set so they
        // stay subsets of the output keys
        let mut og_tags = BTreeSet::new();
        let mut twitter_tags = BTreeSet::new();
        let mut meta_types = BTreeMap::new();
        for fingerprint in patterns.keys() {
            if fingerprint.contains("og:") {
                og_tags.insert(fingerprint.clone());
            }
            if fingerprint.contains("twitter:") {
                twitter_tags.insert(fingerprint.clone());
            }
            meta_types.insert(fingerprint.clone(), MetaType::from_fingerprint(fingerprint));
        }

        Ok(AnalysisResult {
            total_sites: dataset.total_sites,
            metadata: result_metadata(self.name(), total_found, patterns.len(), options),
            analyzer_specific: MetaAnalysis {
                og_tags,
                twitter_tags,
                meta_types,
            },
            patterns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    use crate::types::SiteObservation;

    fn make_site(url: &str, tags: &[(&str, &str)]) -> SiteObservation {
        let mut meta_tags: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (fingerprint, value) in tags {
            meta_tags
                .entry(fingerprint.to_string())
                .or_default()
                .insert(value.to_string());
        }
        SiteObservation {
            url: format!("https://{url}"),
            normalized_url: url.to_string(),
            cms: None,
            confidence: 0.5,
            headers: BTreeMap::new(),
            meta_tags,
            scripts: BTreeSet::new(),
            technologies: BTreeSet::new(),
            captured_at: DateTime::<Utc>::UNIX_EPOCH,
            page_types: BTreeMap::new(),
        }
    }

    /// Three sites exercising unique-site counting: generator on all three,
    /// og:type on all three, twitter:card on two, one drupal-only tag, and a
    /// viewport tag that semantic filtering must drop.
    fn scenario_dataset() -> PreprocessedDataset {
        PreprocessedDataset::from_sites(vec![
            make_site(
                "wp.example",
                &[
                    ("name:generator", "WordPress 6.4"),
                    ("property:og:type", "website"),
                    ("name:twitter:card", "summary"),
                    ("name:viewport", "width=device-width"),
                ],
            ),
            make_site(
                "drupal.example",
                &[
                    ("name:generator", "Drupal 10"),
                    ("property:og:type", "article"),
                    ("name:twitter:card", "summary_large_image"),
                    ("name:drupal-specific", "x"),
                ],
            ),
            make_site(
                "joomla.example",
                &[
                    ("name:generator", "Joomla!"),
                    ("property:og:type", "website"),
                    ("name:viewport", "width=device-width"),
                ],
            ),
        ])
    }

    #[test]
    fn unique_site_counting_with_min_occurrences() {
        let options = AnalysisOptions {
            min_occurrences: 2,
            semantic_filtering: true,
            ..AnalysisOptions::default()
        };
        let result = MetaAnalyzer::new()
            .analyze(&scenario_dataset(), &options)
            .expect("analyzes");

        let generator = &result.patterns["name:generator"];
        assert_eq!(generator.site_count, 3);
        assert!((generator.frequency - 1.0).abs() < 1e-9);

        assert_eq!(result.patterns["property:og:type"].site_count, 3);

        let twitter = &result.patterns["name:twitter:card"];
        assert_eq!(twitter.site_count, 2);
        assert!((twitter.frequency - 2.0 / 3.0).abs() < 1e-3);

        assert!(
            !result.patterns.contains_key("name:drupal-specific"),
            "single-site tag must be filtered at min_occurrences=2"
        );
        assert!(
            !result.patterns.contains_key("name:viewport"),
            "skip list must drop viewport under semantic filtering"
        );
    }

    #[test]
    fn classifier_maps_are_subsets_of_patterns() {
        let result = MetaAnalyzer::new()
            .analyze(&scenario_dataset(), &AnalysisOptions::default())
            .expect("analyzes");

        let spec = &result.analyzer_specific;
        for tag in spec.og_tags.iter().chain(spec.twitter_tags.iter()) {
            assert!(result.patterns.contains_key(tag), "{tag} not in patterns");
        }
        assert!(spec.og_tags.contains("property:og:type"));
        assert!(spec.twitter_tags.contains("name:twitter:card"));
    }

    #[test]
    fn meta_types_classified_by_scope() {
        assert_eq!(MetaType::from_fingerprint("name:generator"), MetaType::Name);
        assert_eq!(
            MetaType::from_fingerprint("property:og:type"),
            MetaType::Property
        );
        assert_eq!(
            MetaType::from_fingerprint("http-equiv:refresh"),
            MetaType::HttpEquiv
        );
        assert_eq!(MetaType::from_fingerprint("bogus"), MetaType::Unknown);
    }

    #[test]
    fn value_frequencies_attached_per_fingerprint() {
        let result = MetaAnalyzer::new()
            .analyze(&scenario_dataset(), &AnalysisOptions::default())
            .expect("analyzes");

        let metadata = result.patterns["property:og:type"]
            .metadata
            .as_ref()
            .expect("metadata present");
        assert_eq!(metadata["valueFrequencies"]["website"], 2);
        assert_eq!(metadata["valueFrequencies"]["article"], 1);
    }

    #[test]
    fn disabling_semantic_filtering_only_adds_patterns() {
        let base = AnalysisOptions {
            min_occurrences: 1,
            semantic_filtering: true,
            ..AnalysisOptions::default()
        };
        let filtered = MetaAnalyzer::new()
            .analyze(&scenario_dataset(), &base)
            .expect("filtered run");
        let unfiltered = MetaAnalyzer::new()
            .analyze(
                &scenario_dataset(),
                &AnalysisOptions {
                    semantic_filtering: false,
                    ..base
                },
            )
            .expect("unfiltered run");

        for (key, record) in &filtered.patterns {
            let other = unfiltered
                .patterns
                .get(key)
                .unwrap_or_else(|| panic!("{key} missing from unfiltered run"));
            assert_eq!(record.site_count, other.site_count);
        }
        assert!(unfiltered.patterns.len() > filtered.patterns.len());
    }
}
