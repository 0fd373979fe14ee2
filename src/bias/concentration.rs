//! Concentration metrics over the CMS distribution

use crate::stats::{effective_count, hhi, shannon_diversity};
use crate::types::analysis_thresholds::{
    DIVERSITY_HIGH_RISK, DIVERSITY_MEDIUM_RISK, HHI_HIGH_RISK, HHI_MEDIUM_RISK,
};
use crate::types::{CmsDistribution, ConcentrationMetrics, RiskLevel};

/// Derive HHI, Shannon diversity, dominance ratio and risk levels.
///
/// The dominance ratio is p1/p2 over the two largest platforms; a
/// single-platform distribution returns 1.0 by convention.
pub fn concentration_metrics(distribution: &CmsDistribution) -> ConcentrationMetrics {
    let percentages: Vec<f64> = distribution
        .buckets
        .values()
        .map(|b| b.percentage)
        .collect();
    let proportions: Vec<f64> = percentages.iter().map(|p| p / 100.0).collect();

    let concentration = hhi(&percentages);
    let diversity = shannon_diversity(&proportions);
    let effective_platforms = effective_count(&proportions);

    let mut sorted = percentages.clone();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let dominance_ratio = match (sorted.first(), sorted.get(1)) {
        (Some(&first), Some(&second)) if second > 0.0 => first / second,
        _ => 1.0,
    };

    let concentration_risk = if concentration > HHI_HIGH_RISK {
        RiskLevel::High
    } else if concentration > HHI_MEDIUM_RISK {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };
    let diversity_risk = if diversity < DIVERSITY_HIGH_RISK {
        RiskLevel::High
    } else if diversity < DIVERSITY_MEDIUM_RISK {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    ConcentrationMetrics {
        hhi: concentration,
        shannon_diversity: diversity,
        effective_platforms,
        dominance_ratio,
        concentration_risk,
        diversity_risk,
        overall_risk: concentration_risk.max(diversity_risk),
    }
}
