//! Cross-analyzer sanity checks
//!
//! Six checks the validation pipeline runs verbatim. Each returns pass/fail
//! plus a message; none of them ever panics on degenerate input.

use serde::{Deserialize, Serialize};

use crate::types::analysis_thresholds::{
    BAYES_TOLERANCE, CORRELATION_SUM_TOLERANCE, EPSILON, FREQUENCY_TOLERANCE,
};

/// Identifier of one sanity check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SanityCheck {
    CorrelationSum,
    CorrelationRange,
    BayesianConsistency,
    FrequencyConsistency,
    SiteCountCardinality,
    FrequencyBounds,
}

impl SanityCheck {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CorrelationSum => "correlation_sum",
            Self::CorrelationRange => "correlation_range",
            Self::BayesianConsistency => "bayesian_consistency",
            Self::FrequencyConsistency => "frequency_consistency",
            Self::SiteCountCardinality => "site_count_cardinality",
            Self::FrequencyBounds => "frequency_bounds",
        }
    }
}

/// Result of one sanity check
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanityOutcome {
    pub check: SanityCheck,
    pub passed: bool,
    pub message: String,
}

impl SanityOutcome {
    fn pass(check: SanityCheck) -> Self {
        Self {
            check,
            passed: true,
            message: "ok".to_string(),
        }
    }

    fn fail(check: SanityCheck, message: String) -> Self {
        Self {
            check,
            passed: false,
            message,
        }
    }
}

/// Correlations over a partition must sum to 1 within tolerance
pub fn check_correlation_sum(correlations: &[f64]) -> SanityOutcome {
    if correlations.is_empty() {
        return SanityOutcome::pass(SanityCheck::CorrelationSum);
    }
    let total: f64 = correlations.iter().sum();
    if (total - 1.0).abs() <= CORRELATION_SUM_TOLERANCE {
        SanityOutcome::pass(SanityCheck::CorrelationSum)
    } else {
        SanityOutcome::fail(
            SanityCheck::CorrelationSum,
            format!("correlations sum to {total:.4}, expected 1.0 +/- {CORRELATION_SUM_TOLERANCE}"),
        )
    }
}

/// Every correlation is a probability
pub fn check_correlation_range(correlations: &[f64]) -> SanityOutcome {
    match correlations
        .iter()
        .find(|c| !c.is_finite() || **c < 0.0 || **c > 1.0)
    {
        None => SanityOutcome::pass(SanityCheck::CorrelationRange),
        Some(bad) => SanityOutcome::fail(
            SanityCheck::CorrelationRange,
            format!("correlation {bad} outside [0, 1]"),
        ),
    }
}

/// |P(A|B)P(B) - P(B|A)P(A)| relative to the larger product stays small
pub fn check_bayesian_consistency(
    p_a_given_b: f64,
    p_b: f64,
    p_b_given_a: f64,
    p_a: f64,
) -> SanityOutcome {
    let left = p_a_given_b * p_b;
    let right = p_b_given_a * p_a;
    let denom = left.max(right);
    if denom <= EPSILON {
        return SanityOutcome::pass(SanityCheck::BayesianConsistency);
    }
    let relative = (left - right).abs() / denom;
    if relative < BAYES_TOLERANCE {
        SanityOutcome::pass(SanityCheck::BayesianConsistency)
    } else {
        SanityOutcome::fail(
            SanityCheck::BayesianConsistency,
            format!("joint probability mismatch: relative error {relative:.4}"),
        )
    }
}

/// frequency == site_count / total_sites within tolerance
pub fn check_frequency_consistency(
    frequency: f64,
    site_count: usize,
    total_sites: usize,
) -> SanityOutcome {
    if total_sites == 0 {
        return SanityOutcome::pass(SanityCheck::FrequencyConsistency);
    }
    let derived = site_count as f64 / total_sites as f64;
    if (frequency - derived).abs() <= FREQUENCY_TOLERANCE {
        SanityOutcome::pass(SanityCheck::FrequencyConsistency)
    } else {
        SanityOutcome::fail(
            SanityCheck::FrequencyConsistency,
            format!("frequency {frequency:.6} != {site_count}/{total_sites}"),
        )
    }
}

/// site_count equals the cardinality of the site set
pub fn check_site_count_cardinality(site_count: usize, distinct_sites: usize) -> SanityOutcome {
    if site_count == distinct_sites {
        SanityOutcome::pass(SanityCheck::SiteCountCardinality)
    } else {
        SanityOutcome::fail(
            SanityCheck::SiteCountCardinality,
            format!("site_count {site_count} != |sites| {distinct_sites}"),
        )
    }
}

/// Frequencies are probabilities
pub fn check_frequency_bounds(frequencies: &[f64]) -> SanityOutcome {
    match frequencies
        .iter()
        .find(|f| !f.is_finite() || **f < 0.0 || **f > 1.0)
    {
        None => SanityOutcome::pass(SanityCheck::FrequencyBounds),
        Some(bad) => SanityOutcome::fail(
            SanityCheck::FrequencyBounds,
            format!("frequency {bad} outside [0, 1]"),
        ),
    }
}

/// Sample input for `run_all_checks`: one pattern's bookkeeping plus one
/// representative conditional-probability pair
#[derive(Debug, Clone, Default)]
pub struct SanityInputs {
    /// A correlation distribution expected to sum to 1
    pub correlations: Vec<f64>,
    /// (P(A|B), P(B), P(B|A), P(A))
    pub bayes: Option<(f64, f64, f64, f64)>,
    /// (frequency, site_count, total_sites) triples
    pub frequencies: Vec<(f64, usize, usize)>,
    /// (site_count, |sites|) pairs
    pub cardinalities: Vec<(usize, usize)>,
}

/// Run all six checks over the provided inputs.
///
/// Always returns exactly six outcomes, one per check, aggregating over the
/// supplied samples (a check fails if any sample fails it).
pub fn run_all_checks(inputs: &SanityInputs) -> Vec<SanityOutcome> {
    let mut outcomes = Vec::with_capacity(6);

    outcomes.push(check_correlation_sum(&inputs.correlations));
    outcomes.push(check_correlation_range(&inputs.correlations));
    outcomes.push(match inputs.bayes {
        Some((pab, pb, pba, pa)) => check_bayesian_consistency(pab, pb, pba, pa),
        None => SanityOutcome::pass(SanityCheck::BayesianConsistency),
    });

    let frequency_failure = inputs
        .frequencies
        .iter()
        .map(|&(f, count, total)| check_frequency_consistency(f, count, total))
        .find(|o| !o.passed);
    outcomes.push(
        frequency_failure.unwrap_or_else(|| SanityOutcome::pass(SanityCheck::FrequencyConsistency)),
    );

    let cardinality_failure = inputs
        .cardinalities
        .iter()
        .map(|&(count, distinct)| check_site_count_cardinality(count, distinct))
        .find(|o| !o.passed);
    outcomes.push(
        cardinality_failure
            .unwrap_or_else(|| SanityOutcome::pass(SanityCheck::SiteCountCardinality)),
    );

    let bare_frequencies: Vec<f64> = inputs.frequencies.iter().map(|&(f, _, _)| f).collect();
    outcomes.push(check_frequency_bounds(&bare_frequencies));

    outcomes
}
