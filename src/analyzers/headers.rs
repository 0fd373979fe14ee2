//! Header frequency analyzer
//!
//! Fingerprints are the lowercased header names themselves. Value frequencies
//! ride along as pattern metadata so downstream consumers (bias, vendor) can
//! reuse them without re-traversing the dataset.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::aggregate::{is_semantically_skipped, result_metadata, PatternAggregator};
use super::CorpusAnalyzer;
use crate::types::{AnalysisError, AnalysisOptions, AnalysisResult, PreprocessedDataset};

/// Analyzer-specific payload of the header analyzer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderAnalysis {
    /// Distinct header names observed before filtering
    pub distinct_headers: usize,
    /// Headers dropped by the semantic skip list (empty when filtering off)
    pub semantically_filtered: BTreeSet<String>,
}

/// Frequency analysis over HTTP response header names
#[derive(Debug, Default)]
pub struct HeaderAnalyzer;

impl HeaderAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl CorpusAnalyzer for HeaderAnalyzer {
    type Payload = HeaderAnalysis;

    fn name(&self) -> &'static str {
        "HeaderAnalyzerV2"
    }

    fn analyze(
        &self,
        dataset: &PreprocessedDataset,
        options: &AnalysisOptions,
    ) -> Result<AnalysisResult<Self::Payload>, AnalysisError> {
        options.validate()?;

        let mut aggregator = PatternAggregator::new(dataset.total_sites);
        let mut semantically_filtered = BTreeSet::new();

        for (url, site) in &dataset.sites {
            for (header, values) in &site.headers {
                if options.semantic_filtering && is_semantically_skipped(header) {
                    semantically_filtered.insert(header.clone());
                }
                aggregator.observe(header, url, values.iter().map(String::as_str));
            }
        }

        let total_found = aggregator.total_found();
        let patterns = aggregator.finish(options, true);

        Ok(AnalysisResult {
            total_sites: dataset.total_sites,
            metadata: result_metadata(self.name(), total_found, patterns.len(), options),
            analyzer_specific: HeaderAnalysis {
                distinct_headers: total_found,
                semantically_filtered,
            },
            patterns,
        })
    }
}
