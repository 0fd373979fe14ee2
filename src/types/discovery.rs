//! Pattern discovery types: inferred name-shape patterns, emerging vendors
//! and semantic anomalies

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::cooccurrence::HeaderClass;

/// Shape of a discovered header-name pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternShape {
    /// Shared leading token, e.g. `x-shopify-*`
    Prefix,
    /// Shared trailing token, e.g. `*-cache-status`
    Suffix,
    /// Shared middle token
    Contains,
    /// Structural shape with digits/IDs substituted, e.g. `x-{word}-{word}`
    RegexShape,
}

/// A header-name pattern inferred from the corpus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredPattern {
    /// Rendered pattern, e.g. `prefix:x-shopify`
    pub pattern: String,
    /// How the pattern was derived
    pub shape: PatternShape,
    /// Header names matching the pattern
    pub headers: BTreeSet<String>,
    /// Distinct sites carrying any matching header
    pub site_count: usize,
    /// The matching site set
    pub sites: BTreeSet<String>,
    /// `site_count / total_sites`
    pub frequency: f64,
    /// Binomial p-value against the baseline occurrence rate
    pub p_value: f64,
    /// Whether the binomial test was significant
    pub significant: bool,
    /// Pattern confidence, in [0, 1]
    pub confidence: f64,
    /// Leading token proposed as a vendor name, if not a generic word
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inferred_vendor: Option<String>,
    /// CMS label -> fraction of matching sites with that label
    pub cms_correlation: BTreeMap<String, f64>,
    /// Whether a validation-context boost was applied to the confidence
    pub validation_boost_applied: bool,
}

/// A vendor-like token seen across headers but absent from the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergingVendor {
    /// Candidate vendor token
    pub token: String,
    /// Headers carrying the token as a prefix
    pub headers: BTreeSet<String>,
    /// Distinct sites carrying any such header
    pub site_count: usize,
    /// Proposal confidence, in [0, 1]
    pub confidence: f64,
}

/// Header whose name suggests one category but whose co-occurrence
/// neighborhood suggests another
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticAnomaly {
    /// The anomalous header
    pub header: String,
    /// Category implied by the header name
    pub declared_class: HeaderClass,
    /// Dominant category of its co-occurrence neighborhood
    pub observed_class: HeaderClass,
    /// Anomaly confidence, in [0, 1]
    pub confidence: f64,
}

/// Analyzer-specific payload of the pattern discovery analyzer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryAnalysis {
    /// Discovered patterns keyed like `prefix:x-shopify`
    pub discovered: Vec<DiscoveredPattern>,
    /// Proposed emerging vendors
    pub emerging_vendors: Vec<EmergingVendor>,
    /// Semantic anomalies
    pub anomalies: Vec<SemanticAnomaly>,
}
