//! Analysis thresholds: every tunable constant of the corpus analysis pipeline.

/// Shared thresholds for frequency, validation and bias analysis
pub mod analysis_thresholds {
    /// Default filter threshold on distinct-site count
    pub const DEFAULT_MIN_OCCURRENCES: usize = 1;
    /// Default cap on rendered examples per pattern
    pub const DEFAULT_MAX_EXAMPLES: usize = 5;
    /// Rendered example values are truncated beyond this many characters
    pub const EXAMPLE_VALUE_MAX_CHARS: usize = 100;

    /// Patterns below this frequency are warned as too rare to act on
    pub const RARE_FREQUENCY: f64 = 0.01;
    /// Patterns above this frequency are warned as suspiciously universal
    pub const UNIVERSAL_FREQUENCY: f64 = 0.95;
    /// Minimum corpus size before the sample-size stage stops erroring
    pub const MIN_CORPUS_SITES: usize = 5;

    /// Significance level for `caution` recommendations
    pub const SIGNIFICANCE_ALPHA: f64 = 0.05;
    /// Significance level for `use` recommendations
    pub const STRICT_ALPHA: f64 = 0.01;
    /// |Z| beyond which a value counts as a distribution outlier
    pub const OUTLIER_Z_THRESHOLD: f64 = 2.5;
    /// Expected cell count below which chi-square is unreliable
    pub const LOW_EXPECTED_COUNT: f64 = 5.0;
    /// Sample size at or below which Fisher's exact test is preferred
    pub const FISHER_MAX_N: usize = 100;

    /// HHI above which platform concentration is high risk
    pub const HHI_HIGH_RISK: f64 = 0.6;
    /// HHI above which platform concentration is medium risk
    pub const HHI_MEDIUM_RISK: f64 = 0.3;
    /// Shannon diversity below which the corpus is high risk
    pub const DIVERSITY_HIGH_RISK: f64 = 1.0;
    /// Shannon diversity below which the corpus is medium risk
    pub const DIVERSITY_MEDIUM_RISK: f64 = 2.0;
    /// Single-platform share above which a dominance warning fires
    pub const PLATFORM_DOMINANCE_SHARE: f64 = 0.6;
    /// Unknown-CMS share above which an unknown-sites warning fires
    pub const UNKNOWN_SITES_SHARE: f64 = 0.3;
    /// Specificity above which a header counts as platform-specific
    pub const HIGH_SPECIFICITY: f64 = 0.7;

    /// Non-Unknown CMS share above which a platform counts as "major"
    pub const MAJOR_CMS_SHARE: f64 = 0.05;
    /// Occurrence count at which specificity switches to discriminative scoring
    pub const DISCRIMINATIVE_MIN_OCCURRENCES: usize = 30;
    /// Top conditional probability required for a discriminative score
    pub const DISCRIMINATIVE_MIN_TOP_PROBABILITY: f64 = 0.4;
    /// Occurrences for high sample adequacy
    pub const ADEQUACY_HIGH_OCCURRENCES: usize = 100;
    /// Occurrences for medium sample adequacy
    pub const ADEQUACY_MEDIUM_OCCURRENCES: usize = 30;

    /// Mutual information above which a pair correlation is strong
    pub const STRONG_MI: f64 = 0.1;
    /// Conditional probability above which a pair correlation is strong
    pub const STRONG_CONDITIONAL_PROBABILITY: f64 = 0.7;
    /// Strong correlations reported, ranked by mutual information
    pub const STRONG_CORRELATION_LIMIT: usize = 10;
    /// Joint frequency below which a pair is a mutual-exclusivity candidate
    pub const EXCLUSIVITY_MAX_JOINT_FREQUENCY: f64 = 0.05;
    /// Conditional probability below which a pair is a mutual-exclusivity candidate
    pub const EXCLUSIVITY_MAX_CONDITIONAL: f64 = 0.1;
    /// Minimum connected-component size for an exclusivity group
    pub const EXCLUSIVITY_MIN_GROUP: usize = 3;
    /// Per-platform frequency floor for platform header combinations
    pub const PLATFORM_COMBINATION_MIN_FREQUENCY: f64 = 0.1;

    /// Baseline occurrence rate for discovered-pattern significance testing
    pub const DISCOVERY_BASELINE_RATE: f64 = 0.05;
    /// Cap on the multiplicative validation confidence boost
    pub const VALIDATION_BOOST_CAP: f64 = 1.2;

    /// Tolerance for frequency == site_count / total_sites consistency
    pub const FREQUENCY_TOLERANCE: f64 = 1e-3;
    /// Tolerance for correlation distributions summing to one
    pub const CORRELATION_SUM_TOLERANCE: f64 = 0.01;
    /// Relative tolerance for the Bayesian consistency check
    pub const BAYES_TOLERANCE: f64 = 0.05;
    /// Division guard against near-zero denominators
    pub const EPSILON: f64 = 1e-12;
    /// Bias adjustment factors are clamped to this cap
    pub const ADJUSTMENT_FACTOR_CAP: f64 = 100.0;

    /// Adjustment impact below this ratio shift is minimal
    pub const IMPACT_MINIMAL: f64 = 0.1;
    /// Adjustment impact below this ratio shift is moderate
    pub const IMPACT_MODERATE: f64 = 0.3;

    /// Validation stages that must pass for an overall pass
    pub const MIN_STAGES_PASSED: usize = 5;
    /// Total validation stages, fixed by the pipeline definition
    pub const VALIDATION_STAGE_COUNT: usize = 7;
    /// Stage score below which the stage fails
    pub const STAGE_PASS_SCORE: f64 = 0.5;
    /// Confidence mean below which the recommendation stage warns
    pub const RECOMMENDATION_MIN_CONFIDENCE: f64 = 0.5;

    /// Expected cell count for an adequate statistical sample
    pub const SAMPLE_ADEQUATE_EXPECTED: f64 = 5.0;
    /// Expected cell count for a marginal statistical sample
    pub const SAMPLE_MARGINAL_EXPECTED: f64 = 2.0;
}
