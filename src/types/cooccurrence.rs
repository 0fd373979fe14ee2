//! Co-occurrence types: header pair statistics, stack signatures, platform
//! combinations and mutual-exclusivity groups

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::vendor::VendorCategory;

/// Deterministic name-shape classification of a header
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderClass {
    Security,
    Caching,
    Infrastructure,
    Custom,
}

impl HeaderClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::Caching => "caching",
            Self::Infrastructure => "infrastructure",
            Self::Custom => "custom",
        }
    }
}

/// Statistics for one unordered header pair, stored exactly once
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderPairStat {
    /// First header of the pair (lexicographically smaller)
    pub header_a: String,
    /// Second header of the pair
    pub header_b: String,
    /// Sites carrying both headers
    pub joint_count: usize,
    /// Joint frequency as a percentage of total sites
    pub joint_frequency_pct: f64,
    /// P(header_b | header_a)
    pub conditional_probability: f64,
    /// p(a,b) * ln(p(a,b) / (p(a) * p(b))); zero under independence
    pub mutual_information: f64,
    /// Vendor label for header_a from the injected vendor snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_a: Option<String>,
    /// Vendor label for header_b
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_b: Option<String>,
    /// Name-shape class of header_a
    pub class_a: HeaderClass,
    /// Name-shape class of header_b
    pub class_b: HeaderClass,
}

/// A matched technology-stack signature from the fixed list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackSignatureMatch {
    /// Signature name
    pub name: String,
    /// Owning vendor
    pub vendor: String,
    /// Signature category
    pub category: VendorCategory,
    /// Sites carrying all required and no conflicting headers
    pub sites: BTreeSet<String>,
    /// Mean conditional probability over required header pairs
    pub confidence: f64,
}

/// Header combination concentrated in one CMS platform
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformCombination {
    /// CMS label of the platform group
    pub platform: String,
    /// First header of the combination
    pub header_a: String,
    /// Second header of the combination
    pub header_b: String,
    /// Matching sites within the platform group
    pub group_count: usize,
    /// Frequency within the platform group
    pub group_frequency: f64,
    /// Matches in this platform / matches across all platforms
    pub exclusivity: f64,
}

/// Connected component of mutually exclusive headers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExclusivityGroup {
    /// Headers in the component, at least three
    pub headers: Vec<String>,
    /// Mean pairwise exclusivity across the component's edges
    pub average_exclusivity: f64,
}

/// Pair with both high mutual information and high conditional probability
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrongCorrelation {
    pub header_a: String,
    pub header_b: String,
    pub mutual_information: f64,
    pub conditional_probability: f64,
}

/// Analyzer-specific payload of the co-occurrence analyzer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CooccurrenceAnalysis {
    /// All retained pair statistics
    pub pairs: Vec<HeaderPairStat>,
    /// Matched stack signatures
    pub signatures: Vec<StackSignatureMatch>,
    /// Platform-exclusive combinations
    pub platform_combinations: Vec<PlatformCombination>,
    /// Mutual-exclusivity groups of size >= 3
    pub exclusivity_groups: Vec<ExclusivityGroup>,
    /// Top pairs by mutual information with strong conditionals
    pub strong_correlations: Vec<StrongCorrelation>,
}
