//! Pattern records and the generic analysis result envelope
//!
//! Every frequency analyzer produces the same shape: a map from fingerprint
//! to `PatternRecord`, wrapped in an `AnalysisResult` envelope with stable
//! camelCase field names on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use super::thresholds::analysis_thresholds::{
    DEFAULT_MAX_EXAMPLES, DEFAULT_MIN_OCCURRENCES,
};

/// Fatal analyzer errors. Everything recoverable is reported as warnings on
/// stage results instead; only contract violations surface out of `analyze`.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Options violated an entry contract (e.g. `min_occurrences == 0`)
    #[error("invalid analysis options: {0}")]
    InvalidOptions(String),

    /// The dataset failed an invariant check at analyzer entry
    #[error("invalid dataset: {0}")]
    InvalidDataset(String),
}

/// Recognized analysis options, echoed back in every result envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisOptions {
    /// Filter threshold on distinct-site count (must be >= 1)
    pub min_occurrences: usize,
    /// Attach rendered example values to each pattern
    pub include_examples: bool,
    /// Cap on examples per pattern (must be >= 1)
    pub max_examples: usize,
    /// Drop fingerprints on the static semantic skip list
    pub semantic_filtering: bool,
    /// Vendor analyzer: exclude infrastructure-only vendors from output
    pub focus_platform_discrimination: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            min_occurrences: DEFAULT_MIN_OCCURRENCES,
            include_examples: true,
            max_examples: DEFAULT_MAX_EXAMPLES,
            semantic_filtering: false,
            focus_platform_discrimination: false,
        }
    }
}

impl AnalysisOptions {
    /// Validate the entry contract shared by all analyzers
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.min_occurrences == 0 {
            return Err(AnalysisError::InvalidOptions(
                "min_occurrences must be at least 1".to_string(),
            ));
        }
        if self.max_examples == 0 {
            return Err(AnalysisError::InvalidOptions(
                "max_examples must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// The common output record of every frequency analyzer
///
/// Invariants: `site_count == sites.len()`, `0 <= frequency <= 1`, and
/// `frequency == site_count / total_sites` exactly (within floating point).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternRecord {
    /// Fingerprint string identifying the pattern within its analyzer
    pub pattern: String,
    /// Count of distinct sites, always the cardinality of `sites`
    pub site_count: usize,
    /// Set of `normalized_url`s the pattern was observed on
    pub sites: BTreeSet<String>,
    /// `site_count / total_sites`
    pub frequency: f64,
    /// Up to `max_examples` rendered `key="value"` strings, deduplicated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<BTreeSet<String>>,
    /// Analyzer-specific keyed metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
}

impl PatternRecord {
    /// Descending frequency, ties by descending site_count, then fingerprint.
    /// The explicit comparator is what tests rely on; map iteration order is
    /// never used for ranking.
    pub fn ranking_cmp(&self, other: &Self) -> Ordering {
        other
            .frequency
            .partial_cmp(&self.frequency)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.site_count.cmp(&self.site_count))
            .then_with(|| self.pattern.cmp(&other.pattern))
    }
}

/// Envelope metadata: analyzer identity, timing and filter totals
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    /// Stable analyzer identifier, e.g. `MetaAnalyzerV2`
    pub analyzer: String,
    /// ISO-8601 UTC timestamp of the run
    pub analyzed_at: DateTime<Utc>,
    /// Fingerprints observed before filtering
    pub total_patterns_found: usize,
    /// Fingerprints surviving the filters
    pub total_patterns_after_filtering: usize,
    /// Options the analyzer actually ran with
    pub options: AnalysisOptions,
}

/// Generic result of one analyzer run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult<A> {
    /// Fingerprint -> pattern record
    pub patterns: BTreeMap<String, PatternRecord>,
    /// Total sites in the input dataset
    pub total_sites: usize,
    /// Envelope metadata
    pub metadata: ResultMetadata,
    /// Analyzer-specific payload
    pub analyzer_specific: A,
}

impl<A> AnalysisResult<A> {
    /// Patterns in stable ranking order (frequency desc, site_count desc,
    /// fingerprint asc)
    pub fn ranked_patterns(&self) -> Vec<&PatternRecord> {
        let mut ranked: Vec<&PatternRecord> = self.patterns.values().collect();
        ranked.sort_by(|a, b| a.ranking_cmp(b));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(pattern: &str, site_count: usize, total: usize) -> PatternRecord {
        let sites: BTreeSet<String> = (0..site_count).map(|i| format!("site-{i}")).collect();
        PatternRecord {
            pattern: pattern.to_string(),
            site_count,
            frequency: site_count as f64 / total as f64,
            sites,
            examples: None,
            metadata: None,
        }
    }

    #[test]
    fn zero_min_occurrences_rejected() {
        let options = AnalysisOptions {
            min_occurrences: 0,
            ..AnalysisOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(AnalysisError::InvalidOptions(_))
        ));
    }

    #[test]
    fn default_options_valid() {
        assert!(AnalysisOptions::default().validate().is_ok());
    }

    #[test]
    fn ranking_is_frequency_then_count_then_name() {
        let a = make_record("aaa", 3, 10);
        let b = make_record("bbb", 3, 10);
        let c = make_record("ccc", 5, 10);

        let mut ranked = vec![&b, &a, &c];
        ranked.sort_by(|x, y| x.ranking_cmp(y));

        let names: Vec<&str> = ranked.iter().map(|r| r.pattern.as_str()).collect();
        assert_eq!(names, vec!["ccc", "aaa", "bbb"], "ties break lexicographically");
    }

    #[test]
    fn envelope_serializes_camel_case() {
        let record = make_record("server", 1, 1);
        let mut patterns = BTreeMap::new();
        patterns.insert("server".to_string(), record);
        let result = AnalysisResult {
            patterns,
            total_sites: 1,
            metadata: ResultMetadata {
                analyzer: "HeaderAnalyzerV2".to_string(),
                analyzed_at: DateTime::<Utc>::UNIX_EPOCH,
                total_patterns_found: 1,
                total_patterns_after_filtering: 1,
                options: AnalysisOptions::default(),
            },
            analyzer_specific: serde_json::json!({}),
        };

        let json = serde_json::to_value(&result).expect("serializes");
        assert!(json.get("totalSites").is_some());
        assert!(json["metadata"].get("analyzedAt").is_some());
        assert!(json.get("analyzerSpecific").is_some());
        assert!(json["patterns"]["server"].get("siteCount").is_some());
    }
}
