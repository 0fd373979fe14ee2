//! Reporting pass: visualization structures, severity scores and the impact
//! assessment with per-header confidence adjustments

use std::collections::BTreeMap;

use crate::types::analysis_thresholds::HIGH_SPECIFICITY;
use crate::types::{
    BiasImpact, BiasVisuals, BiasWarning, CmsDistribution, ConcentrationMetrics,
    HeaderCorrelation, HeatmapCell, RiskLevel, RiskMatrixRow, WarningSeverity,
};

/// Confidence multiplier for high-risk, platform-specific headers (-30%)
const HIGH_RISK_CONFIDENCE_MULTIPLIER: f64 = 0.7;

/// Heatmap rows are capped to the busiest headers
const HEATMAP_HEADER_LIMIT: usize = 20;

fn risk_score(level: RiskLevel) -> f64 {
    match level {
        RiskLevel::Low => 0.2,
        RiskLevel::Medium => 0.5,
        RiskLevel::High => 0.9,
    }
}

fn warning_score(severity: WarningSeverity) -> f64 {
    match severity {
        WarningSeverity::Low => 0.2,
        WarningSeverity::Medium => 0.5,
        WarningSeverity::High => 0.8,
        WarningSeverity::Critical => 1.0,
    }
}

/// Build the visualization structures
pub fn visuals(
    distribution: &CmsDistribution,
    correlations: &BTreeMap<String, HeaderCorrelation>,
) -> BiasVisuals {
    let mut concentration_chart: Vec<(String, f64)> = distribution
        .buckets
        .values()
        .map(|b| (b.cms.clone(), b.percentage))
        .collect();
    concentration_chart.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    let mut risk_matrix: Vec<RiskMatrixRow> = correlations
        .values()
        .map(|c| RiskMatrixRow {
            header: c.header.clone(),
            specificity: c.specificity.score,
            frequency: c.frequency,
            risk: c.risk.overall,
        })
        .collect();
    risk_matrix.sort_by(|a, b| {
        b.specificity
            .partial_cmp(&a.specificity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.header.cmp(&b.header))
    });

    // Busiest headers by occurrence, one cell per CMS
    let mut busiest: Vec<&HeaderCorrelation> = correlations.values().collect();
    busiest.sort_by(|a, b| {
        b.occurrences
            .cmp(&a.occurrences)
            .then_with(|| a.header.cmp(&b.header))
    });
    let correlation_heatmap: Vec<HeatmapCell> = busiest
        .iter()
        .take(HEATMAP_HEADER_LIMIT)
        .flat_map(|c| {
            c.per_cms.values().map(|m| HeatmapCell {
                header: c.header.clone(),
                cms: m.cms.clone(),
                value: m.frequency_in_cms,
            })
        })
        .collect();

    BiasVisuals {
        concentration_chart,
        risk_matrix,
        correlation_heatmap,
    }
}

/// Severity scores per category plus per-header confidence adjustments
pub fn impact(
    concentration: &ConcentrationMetrics,
    correlations: &BTreeMap<String, HeaderCorrelation>,
    warnings: &[BiasWarning],
    cross_analyzer_levels: &[RiskLevel],
) -> BiasImpact {
    let mut severity_by_category = BTreeMap::new();

    severity_by_category.insert(
        "concentration".to_string(),
        risk_score(concentration.overall_risk),
    );

    let statistical = if correlations.is_empty() {
        0.0
    } else {
        correlations
            .values()
            .map(|c| risk_score(c.risk.overall))
            .sum::<f64>()
            / correlations.len() as f64
    };
    severity_by_category.insert("statistical".to_string(), statistical);

    let cross = if cross_analyzer_levels.is_empty() {
        0.0
    } else {
        cross_analyzer_levels
            .iter()
            .map(|&level| risk_score(level))
            .sum::<f64>()
            / cross_analyzer_levels.len() as f64
    };
    severity_by_category.insert("crossAnalyzer".to_string(), cross);

    let warning_severity = warnings
        .iter()
        .map(|w| warning_score(w.severity()))
        .fold(0.0, f64::max);
    severity_by_category.insert("warnings".to_string(), warning_severity);

    // Platform-specific high-risk headers lose 30% of downstream confidence
    let confidence_adjustments: BTreeMap<String, f64> = correlations
        .values()
        .filter(|c| c.specificity.score > HIGH_SPECIFICITY && c.risk.overall == RiskLevel::High)
        .map(|c| (c.header.clone(), HIGH_RISK_CONFIDENCE_MULTIPLIER))
        .collect();

    BiasImpact {
        severity_by_category,
        confidence_adjustments,
    }
}
