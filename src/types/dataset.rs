//! Preprocessed dataset types: SiteObservation, PreprocessedDataset, metadata blocks
//!
//! The dataset is the immutable input of every analyzer. It is produced by an
//! external preprocessing step (crawl normalization is out of scope) and is
//! treated as read-only for the whole analysis run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors raised while loading or checking a preprocessed dataset
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Header names must arrive lowercased from preprocessing
    #[error("header '{header}' on site '{site}' is not lowercase-normalized")]
    UnnormalizedHeader { site: String, header: String },

    /// `total_sites` must equal the number of site entries
    #[error("total_sites is {declared} but the dataset contains {actual} sites")]
    SiteCountMismatch { declared: usize, actual: usize },

    /// Input confidence is a probability
    #[error("site '{site}' has confidence {confidence} outside [0, 1]")]
    ConfidenceOutOfRange { site: String, confidence: f64 },
}

/// Per-page-type observation breakdown (e.g. `mainpage` vs `robots`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageObservation {
    /// Lowercased header name -> observed raw values on this page type
    #[serde(default)]
    pub headers: BTreeMap<String, BTreeSet<String>>,
}

/// A single crawled site: normalized observations plus a tentative CMS label
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteObservation {
    /// Original URL as crawled
    pub url: String,
    /// Canonical URL used as the dataset key
    pub normalized_url: String,
    /// Tentative CMS label from upstream detection (None when unlabeled)
    #[serde(default)]
    pub cms: Option<String>,
    /// Confidence of the CMS label, in [0, 1]
    #[serde(default)]
    pub confidence: f64,
    /// Lowercased header name -> set of observed raw values
    #[serde(default)]
    pub headers: BTreeMap<String, BTreeSet<String>>,
    /// Meta tag fingerprint `{name|property|http-equiv}:{key}` -> observed values
    #[serde(default)]
    pub meta_tags: BTreeMap<String, BTreeSet<String>>,
    /// Absolute script URLs observed on the site
    #[serde(default)]
    pub scripts: BTreeSet<String>,
    /// Technology labels carried over from the crawl
    #[serde(default)]
    pub technologies: BTreeSet<String>,
    /// Capture timestamp
    pub captured_at: DateTime<Utc>,
    /// Optional per-page-type breakdowns
    #[serde(default)]
    pub page_types: BTreeMap<String, PageObservation>,
}

impl SiteObservation {
    /// CMS label with the `Unknown` convention applied
    pub fn cms_label(&self) -> &str {
        self.cms.as_deref().unwrap_or("Unknown")
    }
}

/// Precomputed semantic classification for one header
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderClassification {
    /// Semantic category (e.g. `security`, `caching`, `infrastructure`)
    pub category: String,
    /// How useful the header is for CMS discrimination, in [0, 1]
    pub discriminative_score: f64,
    /// Upstream recommendation to filter the header out of reports
    #[serde(default)]
    pub recommend_filter: bool,
}

/// Optional precomputed semantic block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticMetadata {
    /// Header -> semantic category
    #[serde(default)]
    pub categories: BTreeMap<String, String>,
    /// Header -> full classification
    #[serde(default)]
    pub classifications: BTreeMap<String, HeaderClassification>,
    /// Header -> vendor name
    #[serde(default)]
    pub vendor_names: BTreeMap<String, String>,
}

/// Optional precomputed vendor block (reused by the bias analyzer)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorMetadata {
    /// Header -> vendor name
    #[serde(default)]
    pub vendors_by_header: BTreeMap<String, String>,
}

/// One previously validated pattern carried in dataset metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedPattern {
    /// Pattern fingerprint (header name for header patterns)
    pub pattern: String,
    /// Distinct sites the pattern was validated on
    pub site_count: usize,
    /// The validated site set
    #[serde(default)]
    pub sites: BTreeSet<String>,
    /// Validation confidence, in [0, 1]
    pub confidence: f64,
    /// Whether the pattern passed a significance test upstream
    #[serde(default)]
    pub statistically_significant: bool,
}

/// Optional precomputed validation block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationMetadata {
    /// Header -> validated pattern
    #[serde(default)]
    pub validated_patterns: BTreeMap<String, ValidatedPattern>,
    /// Aggregate validation quality, in [0, 1]
    #[serde(default)]
    pub quality_score: f64,
    /// Whether upstream validation passed overall
    #[serde(default)]
    pub validation_passed: bool,
}

/// Dataset-level metadata with the three optional precomputed blocks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetMetadata {
    /// Preprocessing pipeline version
    pub version: String,
    /// When preprocessing ran
    pub preprocessed_at: DateTime<Utc>,
    /// Optional semantic classifications
    #[serde(default)]
    pub semantic: Option<SemanticMetadata>,
    /// Optional vendor mappings
    #[serde(default)]
    pub vendor: Option<VendorMetadata>,
    /// Optional validation results
    #[serde(default)]
    pub validation: Option<ValidationMetadata>,
}

impl Default for DatasetMetadata {
    fn default() -> Self {
        Self {
            version: "unversioned".to_string(),
            preprocessed_at: DateTime::<Utc>::UNIX_EPOCH,
            semantic: None,
            vendor: None,
            validation: None,
        }
    }
}

/// The immutable input of an analysis run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreprocessedDataset {
    /// normalized_url -> site observation
    pub sites: BTreeMap<String, SiteObservation>,
    /// Declared site count; must match `sites.len()`
    pub total_sites: usize,
    /// Preprocessing metadata and optional precomputed blocks
    #[serde(default)]
    pub metadata: DatasetMetadata,
}

impl PreprocessedDataset {
    /// Build a dataset from site observations, deriving `total_sites`
    pub fn from_sites<I>(sites: I) -> Self
    where
        I: IntoIterator<Item = SiteObservation>,
    {
        let sites: BTreeMap<String, SiteObservation> = sites
            .into_iter()
            .map(|s| (s.normalized_url.clone(), s))
            .collect();
        let total_sites = sites.len();
        Self {
            sites,
            total_sites,
            metadata: DatasetMetadata::default(),
        }
    }

    /// Whether the corpus contains no sites
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Check the dataset invariants: lowercase headers, consistent counts,
    /// confidence in range. Called once at load; analyzers assume it holds.
    pub fn check_invariants(&self) -> Result<(), DatasetError> {
        if self.total_sites != self.sites.len() {
            return Err(DatasetError::SiteCountMismatch {
                declared: self.total_sites,
                actual: self.sites.len(),
            });
        }
        for (url, site) in &self.sites {
            if !(0.0..=1.0).contains(&site.confidence) {
                return Err(DatasetError::ConfidenceOutOfRange {
                    site: url.clone(),
                    confidence: site.confidence,
                });
            }
            for header in site.headers.keys() {
                if header.chars().any(|c| c.is_ascii_uppercase()) {
                    return Err(DatasetError::UnnormalizedHeader {
                        site: url.clone(),
                        header: header.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// All distinct lowercased header names across the corpus
    pub fn header_names(&self) -> BTreeSet<String> {
        self.sites
            .values()
            .flat_map(|s| s.headers.keys().cloned())
            .collect()
    }
}
