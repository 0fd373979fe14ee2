//! Validation pipeline types: tagged warnings, per-stage results and the
//! final quality summary

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Warning severity across the validation and bias layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Tagged validation warnings. Each variant carries its stage-specific
/// payload; reporting dispatches on the tag instead of parsing messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationWarning {
    /// Pattern frequency below the actionable floor
    RarePattern { pattern: String, frequency: f64 },
    /// Pattern frequency suspiciously close to universal
    UniversalPattern { pattern: String, frequency: f64 },
    /// Distribution skew beyond the comfortable range
    ExtremeSkew { skewness: f64 },
    /// Outlier patterns flagged by |Z| threshold
    OutlierPatterns { count: usize },
    /// One CMS label dominates the corpus
    ImbalancedCms { dominant: String, share: f64 },
    /// A statistical sanity check failed
    SanityCheckFailed { check: String, message: String },
    /// Patterns failing their significance test
    NonSignificantPatterns { count: usize },
    /// Mean recommendation confidence too low to act on
    LowRecommendationConfidence { mean_confidence: f64 },
    /// Statistical power below the adequate threshold
    LowStatisticalPower { observed: f64 },
}

impl ValidationWarning {
    /// Severity used when aggregating stage results
    pub fn severity(&self) -> WarningSeverity {
        match self {
            Self::RarePattern { .. } | Self::OutlierPatterns { .. } => WarningSeverity::Low,
            Self::UniversalPattern { .. }
            | Self::ExtremeSkew { .. }
            | Self::NonSignificantPatterns { .. }
            | Self::LowStatisticalPower { .. } => WarningSeverity::Medium,
            Self::ImbalancedCms { .. } | Self::LowRecommendationConfidence { .. } => {
                WarningSeverity::High
            }
            Self::SanityCheckFailed { .. } => WarningSeverity::Critical,
        }
    }
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RarePattern { pattern, frequency } => {
                write!(f, "pattern '{pattern}' is rare (frequency {frequency:.4})")
            }
            Self::UniversalPattern { pattern, frequency } => {
                write!(f, "pattern '{pattern}' is near-universal (frequency {frequency:.4})")
            }
            Self::ExtremeSkew { skewness } => {
                write!(f, "pattern frequency distribution is heavily skewed ({skewness:.2})")
            }
            Self::OutlierPatterns { count } => write!(f, "{count} outlier patterns flagged"),
            Self::ImbalancedCms { dominant, share } => {
                write!(f, "CMS '{dominant}' holds {:.1}% of the corpus", share * 100.0)
            }
            Self::SanityCheckFailed { check, message } => {
                write!(f, "sanity check '{check}' failed: {message}")
            }
            Self::NonSignificantPatterns { count } => {
                write!(f, "{count} patterns failed significance testing")
            }
            Self::LowRecommendationConfidence { mean_confidence } => {
                write!(f, "mean recommendation confidence is {mean_confidence:.2}")
            }
            Self::LowStatisticalPower { observed } => {
                write!(f, "observed statistical power is {observed:.2}")
            }
        }
    }
}

/// Result of one validation stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageResult {
    /// Stage name, e.g. `FrequencyValidation`
    pub stage: String,
    /// Score >= 0.5 and no errors
    pub passed: bool,
    /// Stage score, in [0, 1]
    pub score: f64,
    /// Patterns surviving this stage
    pub patterns_validated: usize,
    /// Patterns dropped by this stage
    pub patterns_filtered: usize,
    /// Tagged warnings
    pub warnings: Vec<ValidationWarning>,
    /// Stage errors; any entry fails the stage
    pub errors: Vec<String>,
    /// Named numeric metrics
    pub metrics: BTreeMap<String, f64>,
    /// Free-form recommendations aggregated by the final stage
    pub recommendations: Vec<String>,
}

impl StageResult {
    /// Empty result shell for a named stage
    pub fn new(stage: &str) -> Self {
        Self {
            stage: stage.to_string(),
            passed: false,
            score: 0.0,
            patterns_validated: 0,
            patterns_filtered: 0,
            warnings: Vec::new(),
            errors: Vec::new(),
            metrics: BTreeMap::new(),
            recommendations: Vec::new(),
        }
    }
}

/// Accumulated quality metrics across stages, each in [0, 1]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    pub data_completeness: f64,
    pub statistical_reliability: f64,
    pub pattern_consistency: f64,
    pub correlation_strength: f64,
    pub recommendation_accuracy: f64,
    pub sample_adequacy: f64,
    pub distribution_health: f64,
}

impl Default for QualityMetrics {
    fn default() -> Self {
        Self {
            data_completeness: 1.0,
            statistical_reliability: 1.0,
            pattern_consistency: 1.0,
            correlation_strength: 1.0,
            recommendation_accuracy: 1.0,
            sample_adequacy: 1.0,
            distribution_health: 1.0,
        }
    }
}

/// Letter grade derived from the accumulated quality score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityGrade {
    A,
    B,
    C,
    D,
    F,
}

impl QualityGrade {
    /// Grade thresholds: 0.9 / 0.8 / 0.7 / 0.6
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Self::A
        } else if score >= 0.8 {
            Self::B
        } else if score >= 0.7 {
            Self::C
        } else if score >= 0.6 {
            Self::D
        } else {
            Self::F
        }
    }
}

impl std::fmt::Display for QualityGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let letter = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        };
        write!(f, "{letter}")
    }
}

/// Final validation pipeline summary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    /// All seven stage results, in execution order
    pub stages: Vec<StageResult>,
    /// Stages with `passed == true`
    pub stages_passed: usize,
    /// Stages with `passed == false`
    pub stages_failed: usize,
    /// At least 5 of 7 passed with no critical errors
    pub overall_passed: bool,
    /// Accumulated quality score, in [0, 1]
    pub quality_score: f64,
    /// Letter grade for the accumulated score
    pub quality_grade: QualityGrade,
    /// Accumulated quality metrics
    pub quality_metrics: QualityMetrics,
    /// Patterns surviving all filtering stages, keyed `{domain}:{fingerprint}`
    pub validated_pattern_count: usize,
    /// Patterns flagged as outliers or non-significant
    pub flagged_patterns: BTreeSet<String>,
}
