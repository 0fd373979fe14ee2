//! Semantic frequency analyzer
//!
//! Consumes the dataset's precomputed semantic block (header -> category,
//! classification, vendor name) and produces category distributions and
//! vendor roll-ups. All distributions are computed from the *filtered*
//! pattern set: a header dropped by `min_occurrences` or the skip list never
//! contributes to a category count, an insight or a quality metric.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use super::aggregate::{result_metadata, PatternAggregator};
use super::CorpusAnalyzer;
use crate::types::{
    AnalysisError, AnalysisOptions, AnalysisResult, PreprocessedDataset, SemanticMetadata,
};

/// Analyzer-specific payload of the semantic analyzer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticAnalysis {
    /// Category -> surviving-pattern count
    pub category_distribution: BTreeMap<String, usize>,
    /// Category -> share of surviving patterns
    pub category_shares: BTreeMap<String, f64>,
    /// Vendor name -> member headers (surviving patterns only)
    pub vendor_rollups: BTreeMap<String, BTreeSet<String>>,
    /// Mean discriminative score over classified surviving patterns
    pub mean_discriminative_score: f64,
    /// Enumerated insight strings
    pub insights: Vec<String>,
}

/// Frequency analysis over semantically classified headers
#[derive(Debug, Default)]
pub struct SemanticAnalyzer;

impl SemanticAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Build the payload from surviving patterns only
    fn build_payload(
        patterns: &BTreeMap<String, crate::types::PatternRecord>,
        semantic: &SemanticMetadata,
    ) -> SemanticAnalysis {
        let mut category_distribution: BTreeMap<String, usize> = BTreeMap::new();
        let mut vendor_rollups: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut score_sum = 0.0;
        let mut score_count = 0usize;

        for header in patterns.keys() {
            let category = semantic
                .categories
                .get(header)
                .cloned()
                .unwrap_or_else(|| "unclassified".to_string());
            *category_distribution.entry(category).or_default() += 1;

            if let Some(vendor) = semantic.vendor_names.get(header) {
                vendor_rollups
                    .entry(vendor.clone())
                    .or_default()
                    .insert(header.clone());
            }
            if let Some(classification) = semantic.classifications.get(header) {
                score_sum += classification.discriminative_score;
                score_count += 1;
            }
        }

        let survivors = patterns.len();
        let category_shares: BTreeMap<String, f64> = category_distribution
            .iter()
            .map(|(category, &count)| {
                (category.clone(), count as f64 / survivors.max(1) as f64)
            })
            .collect();

        let mean_discriminative_score = if score_count > 0 {
            score_sum / score_count as f64
        } else {
            0.0
        };

        let mut insights = Vec::new();
        if let Some((category, &count)) = category_distribution.iter().max_by_key(|(_, &c)| c) {
            insights.push(format!(
                "Category '{category}' accounts for {count} of {survivors} retained header patterns"
            ));
        }
        if let Some((vendor, headers)) = vendor_rollups.iter().max_by_key(|(_, h)| h.len()) {
            insights.push(format!(
                "Vendor '{vendor}' is referenced by {} retained headers",
                headers.len()
            ));
        }
        if score_count > 0 {
            insights.push(format!(
                "Mean discriminative score across {score_count} classified headers is {mean_discriminative_score:.2}"
            ));
        }

        SemanticAnalysis {
            category_distribution,
            category_shares,
            vendor_rollups,
            mean_discriminative_score,
            insights,
        }
    }
}

impl CorpusAnalyzer for SemanticAnalyzer {
    type Payload = SemanticAnalysis;

    fn name(&self) -> &'static str {
        "SemanticAnalyzerV2"
    }

    fn analyze(
        &self,
        dataset: &PreprocessedDataset,
        options: &AnalysisOptions,
    ) -> Result<AnalysisResult<Self::Payload>, AnalysisError> {
        options.validate()?;

        let Some(semantic) = dataset.metadata.semantic.as_ref() else {
            debug!("No semantic metadata present; returning empty semantic analysis");
            return Ok(AnalysisResult {
                patterns: BTreeMap::new(),
                total_sites: dataset.total_sites,
                metadata: result_metadata(self.name(), 0, 0, options),
                analyzer_specific: SemanticAnalysis::default(),
            });
        };

        let mut aggregator = PatternAggregator::new(dataset.total_sites);
        for (url, site) in &dataset.sites {
            for (header, values) in &site.headers {
                if semantic.categories.contains_key(header)
                    || semantic.classifications.contains_key(header)
                    || semantic.vendor_names.contains_key(header)
                {
                    aggregator.observe(header, url, values.iter().map(String::as_str));
                }
            }
        }

        let total_found = aggregator.total_found();
        let patterns = aggregator.finish(options, false);
        let payload = Self::build_payload(&patterns, semantic);

        Ok(AnalysisResult {
            total_sites: dataset.total_sites,
            metadata: result_metadata(self.name(), total_found, patterns.len(), options),
            analyzer_specific: payload,
            patterns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    use crate::types::{HeaderClassification, SiteObservation};

    fn make_site(url: &str, headers: &[&str]) -> SiteObservation {
        SiteObservation {
            url: format!("https://{url}"),
            normalized_url: url.to_string(),
            cms: None,
            confidence: 0.5,
            headers: headers
                .iter()
                .map(|h| {
                    let mut values = BTreeSet::new();
                    values.insert("v".to_string());
                    (h.to_string(), values)
                })
                .collect(),
            meta_tags: BTreeMap::new(),
            scripts: BTreeSet::new(),
            technologies: BTreeSet::new(),
            captured_at: DateTime::<Utc>::UNIX_EPOCH,
            page_types: BTreeMap::new(),
        }
    }

    fn semantic_block() -> SemanticMetadata {
        let mut categories = BTreeMap::new();
        categories.insert("x-frame-options".to_string(), "security".to_string());
        categories.insert("x-cache".to_string(), "caching".to_string());
        categories.insert("x-rare-vendor".to_string(), "infrastructure".to_string());

        let mut vendor_names = BTreeMap::new();
        vendor_names.insert("x-cache".to_string(), "Varnish".to_string());
        vendor_names.insert("x-rare-vendor".to_string(), "RareVendor".to_string());

        let mut classifications = BTreeMap::new();
        classifications.insert(
            "x-frame-options".to_string(),
            HeaderClassification {
                category: "security".to_string(),
                discriminative_score: 0.2,
                recommend_filter: true,
            },
        );

        SemanticMetadata {
            categories,
            classifications,
            vendor_names,
        }
    }

    fn scenario_dataset() -> PreprocessedDataset {
        let mut dataset = PreprocessedDataset::from_sites(vec![
            make_site("a.example", &["x-frame-options", "x-cache", "x-unclassified"]),
            make_site("b.example", &["x-frame-options", "x-cache"]),
            make_site("c.example", &["x-rare-vendor"]),
        ]);
        dataset.metadata.semantic = Some(semantic_block());
        dataset
    }

    #[test]
    fn category_distribution_uses_filtered_patterns_only() {
        let options = AnalysisOptions {
            min_occurrences: 2,
            ..AnalysisOptions::default()
        };
        let result = SemanticAnalyzer::new()
            .analyze(&scenario_dataset(), &options)
            .expect("analyzes");

        // x-rare-vendor appears on one site and is filtered out; its category
        // and vendor must not leak into the distributions
        assert!(!result.patterns.contains_key("x-rare-vendor"));
        let payload = &result.analyzer_specific;
        assert!(!payload.category_distribution.contains_key("infrastructure"));
        assert!(!payload.vendor_rollups.contains_key("RareVendor"));

        assert_eq!(payload.category_distribution["security"], 1);
        assert_eq!(payload.category_distribution["caching"], 1);
        let total: usize = payload.category_distribution.values().sum();
        assert_eq!(
            total,
            result.patterns.len(),
            "category counts must match the filtered pattern set"
        );
    }

    #[test]
    fn vendor_rollups_key_by_vendor_name() {
        let result = SemanticAnalyzer::new()
            .analyze(&scenario_dataset(), &AnalysisOptions::default())
            .expect("analyzes");

        let rollups = &result.analyzer_specific.vendor_rollups;
        assert!(rollups["Varnish"].contains("x-cache"));
    }

    #[test]
    fn missing_semantic_block_yields_empty_result() {
        let dataset = PreprocessedDataset::from_sites(vec![make_site("a.example", &["server"])]);
        let result = SemanticAnalyzer::new()
            .analyze(&dataset, &AnalysisOptions::default())
            .expect("analyzes");
        assert!(result.patterns.is_empty());
        assert!(result.analyzer_specific.insights.is_empty());
    }

    #[test]
    fn unclassified_headers_excluded_from_semantic_patterns() {
        let result = SemanticAnalyzer::new()
            .analyze(&scenario_dataset(), &AnalysisOptions::default())
            .expect("analyzes");
        assert!(!result.patterns.contains_key("x-unclassified"));
    }
}
