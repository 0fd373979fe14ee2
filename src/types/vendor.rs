//! Vendor analysis types: detections, technology stack, signatures, conflicts

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Vendor/technology category from the static catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VendorCategory {
    Cdn,
    Cms,
    Ecommerce,
    Analytics,
    Security,
    Framework,
    Hosting,
}

impl VendorCategory {
    /// Display string matching the wire format
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cdn => "cdn",
            Self::Cms => "cms",
            Self::Ecommerce => "ecommerce",
            Self::Analytics => "analytics",
            Self::Security => "security",
            Self::Framework => "framework",
            Self::Hosting => "hosting",
        }
    }

    /// Categories that describe serving infrastructure rather than the
    /// application platform. Excluded under `focus_platform_discrimination`.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Cdn | Self::Security | Self::Hosting)
    }
}

impl std::fmt::Display for VendorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One vendor detected from a header name
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorDetection {
    /// Vendor name from the catalog
    pub vendor: String,
    /// Catalog category
    pub category: VendorCategory,
    /// Catalog description of the vendor
    pub description: String,
    /// Detection confidence, in [0, 1]
    pub confidence: f64,
    /// Header names that matched this vendor
    pub matched_headers: BTreeSet<String>,
    /// Sites carrying any matched header
    pub sites: BTreeSet<String>,
    /// `sites.len() / total_sites`
    pub frequency: f64,
}

/// Aggregate statistics for one detected vendor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorSummary {
    /// Vendor name
    pub vendor: String,
    /// Catalog category
    pub category: VendorCategory,
    /// Matched header names
    pub headers: BTreeSet<String>,
    /// Share of all matched headers attributed to this vendor
    pub share_of_matched_headers: f64,
    /// Highest per-header detection confidence
    pub max_confidence: f64,
}

/// Corpus-wide vendor statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorStatistics {
    /// Distinct header names in the corpus
    pub total_headers: usize,
    /// Header names that matched some vendor
    pub matched_headers: usize,
    /// Per-vendor summaries
    pub vendors: BTreeMap<String, VendorSummary>,
    /// Detection counts per category
    pub category_counts: BTreeMap<VendorCategory, usize>,
}

/// Inferred stack complexity by detection count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackComplexity {
    /// At most 2 detections
    Simple,
    /// At most 5 detections
    Moderate,
    Complex,
}

impl StackComplexity {
    /// Bucket a detection count
    pub fn from_detection_count(n: usize) -> Self {
        match n {
            0..=2 => Self::Simple,
            3..=5 => Self::Moderate,
            _ => Self::Complex,
        }
    }
}

impl Default for StackComplexity {
    fn default() -> Self {
        Self::Simple
    }
}

/// Technology stack inferred from vendor detections
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnologyStack {
    /// Highest-confidence vendor per category
    pub primary: BTreeMap<VendorCategory, String>,
    /// All CDN vendors, sorted by confidence
    pub cdn: Vec<String>,
    /// All analytics vendors, sorted by confidence
    pub analytics: Vec<String>,
    /// All security vendors, sorted by confidence
    pub security: Vec<String>,
    /// Mean of detection confidences
    pub overall_confidence: f64,
    /// Complexity bucket
    pub complexity: StackComplexity,
}

/// A matched multi-header technology signature
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureMatch {
    /// Signature name from the catalog
    pub name: String,
    /// Owning vendor
    pub vendor: String,
    /// Catalog category
    pub category: VendorCategory,
    /// Sites with all required and no conflicting headers
    pub sites: BTreeSet<String>,
    /// `sites.len() / total_sites`
    pub frequency: f64,
    /// Match confidence, in [0, 1]
    pub confidence: f64,
    /// Fraction of the signature's optional headers seen on matching sites
    pub optional_overlap: f64,
}

/// Kind of vendor conflict detected across the corpus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    CmsConflict,
    FrameworkConflict,
    IncompatibleStack,
}

/// Conflict severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
}

/// Simultaneous detection of vendors that should not coexist
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorConflict {
    /// Conflict classification
    pub kind: ConflictKind,
    /// How seriously to take the conflict
    pub severity: ConflictSeverity,
    /// Vendors involved
    pub vendors: Vec<String>,
    /// Human-readable explanation
    pub description: String,
}

/// Analyzer-specific payload of the vendor analyzer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorAnalysis {
    /// Header name -> detection
    pub detections: BTreeMap<String, VendorDetection>,
    /// Aggregate statistics
    pub statistics: VendorStatistics,
    /// Inferred technology stack
    pub stack: TechnologyStack,
    /// Matched multi-header signatures
    pub signatures: Vec<SignatureMatch>,
    /// Detected conflicts
    pub conflicts: Vec<VendorConflict>,
}
