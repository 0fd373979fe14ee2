//! Bias analysis types: CMS distribution, concentration metrics, header-CMS
//! correlations, bias adjustments, recommendation risk and cross-analyzer
//! assessments
//!
//! These records make up the payload of the bias analyzer, the largest
//! consumer of the statistical kernel.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::validation::WarningSeverity;

/// Risk bucket shared across concentration and recommendation scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sample adequacy bucket for per-header statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleAdequacy {
    Low,
    Medium,
    High,
}

impl SampleAdequacy {
    /// Bucket by raw occurrence count (100 / 30 thresholds)
    pub fn from_occurrences(n: usize) -> Self {
        use super::thresholds::analysis_thresholds::{
            ADEQUACY_HIGH_OCCURRENCES, ADEQUACY_MEDIUM_OCCURRENCES,
        };
        if n >= ADEQUACY_HIGH_OCCURRENCES {
            Self::High
        } else if n >= ADEQUACY_MEDIUM_OCCURRENCES {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Per-CMS bucket of the corpus distribution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CmsBucket {
    /// CMS label (missing labels bucket under `Unknown`)
    pub cms: String,
    /// Sites with this label
    pub count: usize,
    /// Percentage of total sites (0-100)
    pub percentage: f64,
    /// Site set
    pub sites: BTreeSet<String>,
    /// Mean input confidence of the label
    pub mean_confidence: f64,
    /// Union of technology labels across the bucket
    pub technologies: BTreeSet<String>,
}

/// Finer categorization of `Unknown` sites by observable markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownCategory {
    /// Enterprise security header profile
    Enterprise,
    /// Known CDN markers present
    Cdn,
    /// No deterministic rule matched
    Unknown,
}

/// CMS distribution over the corpus
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CmsDistribution {
    /// CMS label -> bucket
    pub buckets: BTreeMap<String, CmsBucket>,
    /// Categorization counts for `Unknown` sites
    pub unknown_breakdown: BTreeMap<UnknownCategory, usize>,
    /// Total sites in the corpus
    pub total_sites: usize,
}

/// Concentration metrics over the CMS distribution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcentrationMetrics {
    /// Herfindahl-Hirschman index, in [0, 1]
    pub hhi: f64,
    /// Shannon diversity of the distribution
    pub shannon_diversity: f64,
    /// exp(H), the effective number of platforms
    pub effective_platforms: f64,
    /// p1 / p2; 1.0 by convention when only one platform exists
    pub dominance_ratio: f64,
    /// Risk from HHI thresholds
    pub concentration_risk: RiskLevel,
    /// Risk from diversity thresholds
    pub diversity_risk: RiskLevel,
    /// Worse of the two risks
    pub overall_risk: RiskLevel,
}

/// Per-CMS observation metrics for one header
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderCmsMetrics {
    /// CMS label
    pub cms: String,
    /// Sites in this CMS carrying the header
    pub observed: usize,
    /// Expected count under independence: overall_freq * sites_in_cms
    pub expected: f64,
    /// (observed - expected)^2 / expected
    pub chi_square_contribution: f64,
    /// Normal-approximation significance of the deviation
    pub significant: bool,
    /// Header frequency within the CMS group
    pub frequency_in_cms: f64,
    /// Up to three most common values in the group
    pub top_values: Vec<(String, usize)>,
    /// Normalized Shannon entropy of value usage, in [0, 1]
    pub value_uniqueness: f64,
}

/// One direction of the conditional-probability matrix
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalProbability {
    /// Point estimate
    pub probability: f64,
    /// Wilson score interval lower bound
    pub wilson_low: f64,
    /// Wilson score interval upper bound
    pub wilson_high: f64,
    /// Whether the interval excludes the base rate
    pub significant: bool,
}

/// Conditional probabilities in both directions for one header
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalMatrix {
    /// CMS -> P(cms | header)
    pub cms_given_header: BTreeMap<String, ConditionalProbability>,
    /// CMS -> P(header | cms)
    pub header_given_cms: BTreeMap<String, ConditionalProbability>,
    /// max over P(cms | header)
    pub max_cms_given_header: f64,
    /// H(CMS) - H(CMS | header)
    pub information_gain: f64,
    /// max(P) / mean(others)
    pub discriminative_power: f64,
}

/// Scoring method used for platform specificity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecificityMethod {
    /// Discriminative scoring for headers with >= 30 occurrences
    Discriminative,
    /// Coefficient-of-variation fallback for sparse headers
    CoefficientVariation,
}

/// How concentrated a header is toward a single CMS
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSpecificity {
    /// Specificity score, in [0, 1]
    pub score: f64,
    /// Scoring method applied
    pub method: SpecificityMethod,
    /// CMS the header points at, when discriminative scoring applies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_cms: Option<String>,
    /// Sample adequacy of the estimate
    pub sample_adequacy: SampleAdequacy,
}

/// Reliability of a bias adjustment by major-CMS coverage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentReliability {
    Low,
    Medium,
    High,
}

/// Size of the adjustment's effect on the reported frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentImpact {
    Minimal,
    Moderate,
    Significant,
}

/// Raw versus composition-corrected frequency for one header
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiasAdjustment {
    /// Mean of per-CMS frequencies as observed
    pub raw_frequency: f64,
    /// Equal-weighted mean across major CMS platforms
    pub adjusted_frequency: f64,
    /// adjusted / raw, capped
    pub adjustment_factor: f64,
    /// Major platforms contributing to the adjustment
    pub major_cms_count: usize,
    /// Reliability bucket by major-CMS count
    pub reliability: AdjustmentReliability,
    /// Impact bucket by relative shift
    pub impact: AdjustmentImpact,
}

/// Enumerated risk factor attached to a header recommendation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "factor", rename_all = "snake_case")]
pub enum RiskFactor {
    PlatformSpecificity { level: RiskLevel, score: f64 },
    DatasetBias { level: RiskLevel, adjustment_factor: f64 },
    SampleSize { level: RiskLevel, occurrences: usize },
    StatisticalSignificance { level: RiskLevel, significant_groups: usize },
    ValueDiversity { level: RiskLevel, unique_values: usize },
}

impl RiskFactor {
    /// The level carried by any variant
    pub fn level(&self) -> RiskLevel {
        match self {
            Self::PlatformSpecificity { level, .. }
            | Self::DatasetBias { level, .. }
            | Self::SampleSize { level, .. }
            | Self::StatisticalSignificance { level, .. }
            | Self::ValueDiversity { level, .. } => *level,
        }
    }
}

/// Aggregate recommendation risk for one header
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRisk {
    /// Contributing factors
    pub factors: Vec<RiskFactor>,
    /// High if any factor is high; medium if more than one medium
    pub overall: RiskLevel,
    /// Confidence in the risk call, in [0, 1]
    pub confidence: f64,
    /// Mitigation strategies, one per elevated factor
    pub mitigation: Vec<String>,
}

/// Full correlation record for one header against the CMS distribution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderCorrelation {
    /// Header name
    pub header: String,
    /// Overall frequency across the corpus
    pub frequency: f64,
    /// Total sites carrying the header
    pub occurrences: usize,
    /// Page type -> occurrence count
    pub page_type_distribution: BTreeMap<String, usize>,
    /// Distinct observed values
    pub unique_values: usize,
    /// Mean number of values per carrying site
    pub avg_values_per_site: f64,
    /// Most common value across the corpus
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_common_value: Option<String>,
    /// Per-CMS metrics
    pub per_cms: BTreeMap<String, HeaderCmsMetrics>,
    /// Chi-square statistic (sum of per-CMS contributions)
    pub chi_square: f64,
    /// Conditional probabilities both directions
    pub conditionals: ConditionalMatrix,
    /// Platform specificity
    pub specificity: PlatformSpecificity,
    /// Bias adjustment
    pub adjustment: BiasAdjustment,
    /// Recommendation risk
    pub risk: RecommendationRisk,
}

/// Tagged bias warnings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BiasWarning {
    /// HHI above the risk threshold
    HighConcentration { hhi: f64 },
    /// One platform above the dominance share
    PlatformDominance { cms: String, share: f64 },
    /// Two or fewer distinct CMS labels
    LowDiversity { distinct_cms: usize },
    /// Unlabeled share above threshold
    ManyUnknownSites { share: f64 },
    /// Large set of highly platform-specific headers
    HighSpecificityHeaders { count: usize },
    /// Raised from an injected cross-analyzer snapshot
    CrossAnalyzer { source: String, message: String },
}

impl BiasWarning {
    pub fn severity(&self) -> WarningSeverity {
        match self {
            Self::HighConcentration { .. } | Self::PlatformDominance { .. } => {
                WarningSeverity::High
            }
            Self::LowDiversity { .. } | Self::HighSpecificityHeaders { .. } => {
                WarningSeverity::Medium
            }
            Self::ManyUnknownSites { .. } | Self::CrossAnalyzer { .. } => WarningSeverity::Low,
        }
    }
}

/// Aggregated statistical summary of the bias analysis
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiasStatisticalSummary {
    /// Mean detection confidence across headers
    pub mean_confidence: f64,
    /// Mean chi-square statistic
    pub average_chi_square: f64,
    /// Mean p-value across header tests
    pub average_p_value: f64,
    /// Headers with a significant CMS association
    pub significant_headers: usize,
    /// Adequacy bucket -> header count
    pub sample_adequacy: BTreeMap<SampleAdequacy, usize>,
    /// mean(diversity/3, 1 - HHI, min(1, log10(n)/log10(1000)))
    pub dataset_quality_score: f64,
}

/// Technology bias assessment from the injected vendor snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnologyBiasAssessment {
    /// HHI over vendor detection shares
    pub vendor_hhi: f64,
    /// Vendors holding outsized shares
    pub dominant_vendors: Vec<String>,
    /// Categories with concentrated detections
    pub biased_categories: Vec<String>,
    /// Vendors expected for major CMS platforms but absent
    pub technology_gaps: Vec<String>,
    /// Overall level
    pub level: RiskLevel,
    /// Remediation recommendations
    pub recommendations: Vec<String>,
}

/// Semantic bias assessment from the injected semantic snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticBiasAssessment {
    /// Categories holding an outsized pattern share
    pub overrepresented_categories: Vec<String>,
    /// Categories nearly absent from the corpus
    pub underrepresented_categories: Vec<String>,
    /// Headers whose semantic category disagrees with observed usage
    pub misaligned_headers: Vec<String>,
    /// Overall level
    pub level: RiskLevel,
    /// Remediation recommendations
    pub recommendations: Vec<String>,
}

/// Pattern-discovery bias assessment from the injected discovery snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryBiasAssessment {
    /// Evenness of discovered patterns across platforms, in [0, 1]
    pub platform_balance: f64,
    /// Evenness across pattern shapes, in [0, 1]
    pub category_balance: f64,
    /// Estimated completeness of discovery, in [0, 1]
    pub discovery_completeness: f64,
    /// Overall level
    pub level: RiskLevel,
    /// Remediation recommendations
    pub recommendations: Vec<String>,
}

/// One cross-analyzer consistency check from the enhancement pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyCheck {
    /// What was compared
    pub check: String,
    pub passed: bool,
    pub message: String,
}

/// Statistical enhancement of one header's correlation record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderEnhancement {
    /// Header name
    pub header: String,
    /// Chi-square p-value for the header's CMS table
    pub p_value: f64,
    /// Wilson interval on the overall frequency
    pub frequency_interval: (f64, f64),
    /// Sample adequacy
    pub adequacy: SampleAdequacy,
    /// specificity * max P(CMS | header) * HHI
    pub sensitivity: f64,
}

/// Enhancement pass output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiasEnhancement {
    /// Cross-analyzer consistency checks
    pub consistency_checks: Vec<ConsistencyCheck>,
    /// Per-header statistical refinements
    pub headers: Vec<HeaderEnhancement>,
}

/// One row of the risk matrix visualization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskMatrixRow {
    pub header: String,
    pub specificity: f64,
    pub frequency: f64,
    pub risk: RiskLevel,
}

/// One cell of the correlation heatmap visualization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapCell {
    pub header: String,
    pub cms: String,
    pub value: f64,
}

/// Visualization-ready structures from the reporting pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiasVisuals {
    /// CMS label -> percentage, for the concentration chart
    pub concentration_chart: Vec<(String, f64)>,
    /// Specificity-by-frequency risk matrix
    pub risk_matrix: Vec<RiskMatrixRow>,
    /// Header-by-CMS frequency heatmap
    pub correlation_heatmap: Vec<HeatmapCell>,
}

/// Impact assessment of the reporting pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiasImpact {
    /// Severity score per category (concentration, statistical, ...)
    pub severity_by_category: BTreeMap<String, f64>,
    /// Header -> multiplicative confidence adjustment (e.g. 0.7 for -30%)
    pub confidence_adjustments: BTreeMap<String, f64>,
}

/// Analyzer-specific payload of the bias analyzer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiasAnalysis {
    /// CMS distribution with unknown-site categorization
    pub distribution: CmsDistribution,
    /// Concentration metrics
    pub concentration: ConcentrationMetrics,
    /// Header -> correlation record
    pub correlations: BTreeMap<String, HeaderCorrelation>,
    /// Tagged warnings
    pub warnings: Vec<BiasWarning>,
    /// Aggregated statistical summary
    pub summary: BiasStatisticalSummary,
    /// Present only when a vendor snapshot was injected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technology_bias: Option<TechnologyBiasAssessment>,
    /// Present only when semantic metadata was available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_bias: Option<SemanticBiasAssessment>,
    /// Present only when a discovery snapshot was injected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery_bias: Option<DiscoveryBiasAssessment>,
    /// Statistical enhancement pass
    pub enhancement: BiasEnhancement,
    /// Visualization structures
    pub visuals: BiasVisuals,
    /// Impact assessment
    pub impact: BiasImpact,
}
