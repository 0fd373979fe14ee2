//! The seven validation stage implementations

use std::collections::BTreeMap;

use crate::stats::{
    binomial_test, detect_outliers, hhi, moments, run_all_checks, statistical_power,
    SanityInputs,
};
use crate::types::analysis_thresholds::{
    DISCOVERY_BASELINE_RATE, MIN_CORPUS_SITES, OUTLIER_Z_THRESHOLD, RARE_FREQUENCY,
    RECOMMENDATION_MIN_CONFIDENCE, UNIVERSAL_FREQUENCY,
};
use crate::types::{AnalysisError, StageResult, ValidationWarning};

use super::{ValidationContext, ValidationStage};

/// The standard stage sequence in canonical order
pub fn default_stages() -> Vec<Box<dyn ValidationStage>> {
    vec![
        Box::new(FrequencyValidation),
        Box::new(SampleSizeValidation),
        Box::new(DistributionValidation),
        Box::new(CorrelationValidation),
        Box::new(SanityValidation),
        Box::new(SignificanceValidation),
        Box::new(RecommendationValidation),
    ]
}

/// CMS label shares of the corpus as (labels, percentages, proportions)
fn cms_shares(ctx: &ValidationContext<'_>) -> (Vec<String>, Vec<f64>, Vec<f64>) {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for site in ctx.dataset.sites.values() {
        *counts.entry(site.cms_label()).or_default() += 1;
    }
    let total = ctx.dataset.total_sites.max(1) as f64;
    let labels: Vec<String> = counts.keys().map(|l| l.to_string()).collect();
    let percentages: Vec<f64> = counts.values().map(|&c| c as f64 / total * 100.0).collect();
    let proportions: Vec<f64> = counts.values().map(|&c| c as f64 / total).collect();
    (labels, percentages, proportions)
}

/// Stage 1: drop sub-threshold patterns and warn on frequency extremes
pub struct FrequencyValidation;

impl ValidationStage for FrequencyValidation {
    fn name(&self) -> &'static str {
        "FrequencyValidation"
    }

    fn execute(&self, ctx: &mut ValidationContext<'_>) -> Result<StageResult, AnalysisError> {
        let mut result = StageResult::new(self.name());
        let total = ctx.validated_patterns.len();

        let min_occurrences = ctx.options.min_occurrences;
        ctx.validated_patterns
            .retain(|_, record| record.site_count >= min_occurrences);
        let retained = ctx.validated_patterns.len();

        let mut rare = 0usize;
        let mut universal = 0usize;
        for record in ctx.validated_patterns.values() {
            if record.frequency < RARE_FREQUENCY {
                rare += 1;
                result.warnings.push(ValidationWarning::RarePattern {
                    pattern: record.pattern.clone(),
                    frequency: record.frequency,
                });
            } else if record.frequency > UNIVERSAL_FREQUENCY {
                universal += 1;
                result.warnings.push(ValidationWarning::UniversalPattern {
                    pattern: record.pattern.clone(),
                    frequency: record.frequency,
                });
            }
        }

        result.patterns_validated = retained;
        result.patterns_filtered = total - retained;
        result.score = if total == 0 {
            1.0
        } else {
            retained as f64 / total as f64
        };
        result.metrics.insert("totalPatterns".to_string(), total as f64);
        result.metrics.insert("rareCount".to_string(), rare as f64);
        result
            .metrics
            .insert("universalCount".to_string(), universal as f64);

        ctx.quality_metrics.data_completeness = result.score;
        Ok(result)
    }
}

/// Stage 2: corpus size checks and observed statistical power
pub struct SampleSizeValidation;

impl ValidationStage for SampleSizeValidation {
    fn name(&self) -> &'static str {
        "SampleSizeValidation"
    }

    fn execute(&self, ctx: &mut ValidationContext<'_>) -> Result<StageResult, AnalysisError> {
        let mut result = StageResult::new(self.name());
        let total_sites = ctx.dataset.total_sites;

        if total_sites < MIN_CORPUS_SITES {
            result.errors.push(format!(
                "corpus has {total_sites} sites; at least {MIN_CORPUS_SITES} required for validation"
            ));
        }

        // Power is judged against the rarest retained pattern
        let min_detectable = ctx
            .validated_patterns
            .values()
            .map(|r| r.frequency)
            .fold(f64::INFINITY, f64::min)
            .clamp(RARE_FREQUENCY, 1.0);
        let min_detectable = if ctx.validated_patterns.is_empty() {
            DISCOVERY_BASELINE_RATE
        } else {
            min_detectable
        };

        let power = statistical_power(total_sites, min_detectable);
        if !power.adequate {
            result.warnings.push(ValidationWarning::LowStatisticalPower {
                observed: power.observed,
            });
            result
                .recommendations
                .push(format!("Collect at least {} sites for adequate power", power.required));
        }

        result.patterns_validated = ctx.validated_patterns.len();
        result.score = power.observed;
        result
            .metrics
            .insert("observedPower".to_string(), power.observed);
        result
            .metrics
            .insert("requiredSamples".to_string(), power.required as f64);
        result
            .metrics
            .insert("totalSites".to_string(), total_sites as f64);

        ctx.quality_metrics.statistical_reliability = power.observed;
        ctx.quality_metrics.sample_adequacy = if power.adequate { 1.0 } else { power.observed };
        Ok(result)
    }
}

/// Stage 3: frequency distribution shape and outliers
pub struct DistributionValidation;

impl ValidationStage for DistributionValidation {
    fn name(&self) -> &'static str {
        "DistributionValidation"
    }

    fn execute(&self, ctx: &mut ValidationContext<'_>) -> Result<StageResult, AnalysisError> {
        let mut result = StageResult::new(self.name());

        let keys: Vec<String> = ctx.validated_patterns.keys().cloned().collect();
        let frequencies: Vec<f64> = ctx
            .validated_patterns
            .values()
            .map(|r| r.frequency)
            .collect();

        let stats = moments(&frequencies);
        let outliers = detect_outliers(&frequencies, OUTLIER_Z_THRESHOLD);
        for &index in &outliers {
            if let Some(key) = keys.get(index) {
                ctx.flagged_patterns.insert(key.clone());
            }
        }

        let extreme_skew = stats.skewness.abs() > 2.0;
        if extreme_skew {
            result.warnings.push(ValidationWarning::ExtremeSkew {
                skewness: stats.skewness,
            });
        }
        if !outliers.is_empty() {
            result.warnings.push(ValidationWarning::OutlierPatterns {
                count: outliers.len(),
            });
        }

        let outlier_fraction = if frequencies.is_empty() {
            0.0
        } else {
            outliers.len() as f64 / frequencies.len() as f64
        };
        result.score = (1.0 - outlier_fraction) * if extreme_skew { 0.8 } else { 1.0 };
        result.patterns_validated = ctx.validated_patterns.len();
        result.metrics.insert("skewness".to_string(), stats.skewness);
        result
            .metrics
            .insert("excessKurtosis".to_string(), stats.excess_kurtosis);
        result
            .metrics
            .insert("outlierCount".to_string(), outliers.len() as f64);

        ctx.quality_metrics.distribution_health = result.score;
        Ok(result)
    }
}

/// Stage 4: CMS balance and correlation strength
pub struct CorrelationValidation;

impl ValidationStage for CorrelationValidation {
    fn name(&self) -> &'static str {
        "CorrelationValidation"
    }

    fn execute(&self, ctx: &mut ValidationContext<'_>) -> Result<StageResult, AnalysisError> {
        let mut result = StageResult::new(self.name());
        let (labels, percentages, proportions) = cms_shares(ctx);

        let max_share = proportions.iter().copied().fold(0.0, f64::max);
        if max_share > 0.8 {
            let dominant = labels
                .iter()
                .zip(proportions.iter())
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
                .map(|(label, _)| label.clone())
                .unwrap_or_default();
            result.warnings.push(ValidationWarning::ImbalancedCms {
                dominant,
                share: max_share,
            });
            result
                .recommendations
                .push("Rebalance the corpus across CMS platforms".to_string());
        }

        let concentration = hhi(&percentages);
        result.score = if ctx.dataset.total_sites == 0 {
            1.0
        } else {
            (1.0 - concentration).clamp(0.0, 1.0)
        };
        result.patterns_validated = ctx.validated_patterns.len();
        result.metrics.insert("cmsCount".to_string(), labels.len() as f64);
        result.metrics.insert("maxShare".to_string(), max_share);
        result.metrics.insert("hhi".to_string(), concentration);

        ctx.quality_metrics.correlation_strength = result.score;
        Ok(result)
    }
}

/// Stage 5: the six statistical kernel sanity checks
pub struct SanityValidation;

impl ValidationStage for SanityValidation {
    fn name(&self) -> &'static str {
        "SanityValidation"
    }

    fn execute(&self, ctx: &mut ValidationContext<'_>) -> Result<StageResult, AnalysisError> {
        let mut result = StageResult::new(self.name());
        let total_sites = ctx.dataset.total_sites;

        let (_, _, proportions) = cms_shares(ctx);

        // Representative Bayes inputs from the most frequent pattern and the
        // CMS group it overlaps most
        let bayes = ctx
            .validated_patterns
            .values()
            .max_by(|a, b| {
                a.frequency
                    .partial_cmp(&b.frequency)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .and_then(|record| {
                let mut best: Option<(usize, usize)> = None;
                let mut group_counts: BTreeMap<&str, usize> = BTreeMap::new();
                for url in &record.sites {
                    if let Some(site) = ctx.dataset.sites.get(url) {
                        *group_counts.entry(site.cms_label()).or_default() += 1;
                    }
                }
                let mut cms_totals: BTreeMap<&str, usize> = BTreeMap::new();
                for site in ctx.dataset.sites.values() {
                    *cms_totals.entry(site.cms_label()).or_default() += 1;
                }
                for (cms, &joint) in &group_counts {
                    let total = cms_totals.get(cms).copied().unwrap_or(0);
                    if best.map_or(true, |(best_joint, _)| joint > best_joint) {
                        best = Some((joint, total));
                    }
                }
                best.map(|(joint, cms_total)| {
                    let p_pattern = record.site_count as f64 / total_sites.max(1) as f64;
                    let p_cms = cms_total as f64 / total_sites.max(1) as f64;
                    let p_pattern_given_cms = joint as f64 / cms_total.max(1) as f64;
                    let p_cms_given_pattern = joint as f64 / record.site_count.max(1) as f64;
                    (p_pattern_given_cms, p_cms, p_cms_given_pattern, p_pattern)
                })
            });

        let frequencies: Vec<(f64, usize, usize)> = ctx
            .validated_patterns
            .values()
            .map(|r| (r.frequency, r.site_count, total_sites))
            .collect();
        let cardinalities: Vec<(usize, usize)> = ctx
            .validated_patterns
            .values()
            .map(|r| (r.site_count, r.sites.len()))
            .collect();

        let inputs = SanityInputs {
            correlations: proportions,
            bayes,
            frequencies,
            cardinalities,
        };
        let outcomes = run_all_checks(&inputs);
        let passed = outcomes.iter().filter(|o| o.passed).count();
        let success_rate = passed as f64 / outcomes.len().max(1) as f64;

        for outcome in outcomes.iter().filter(|o| !o.passed) {
            result.warnings.push(ValidationWarning::SanityCheckFailed {
                check: outcome.check.as_str().to_string(),
                message: outcome.message.clone(),
            });
        }

        result.score = success_rate;
        result.patterns_validated = ctx.validated_patterns.len();
        result
            .metrics
            .insert("sanityChecksPassed".to_string(), passed as f64);
        result
            .metrics
            .insert("sanitySuccessRate".to_string(), success_rate);

        ctx.quality_metrics.pattern_consistency = success_rate;
        Ok(result)
    }
}

/// Stage 6: per-pattern significance testing
pub struct SignificanceValidation;

impl ValidationStage for SignificanceValidation {
    fn name(&self) -> &'static str {
        "SignificanceValidation"
    }

    fn execute(&self, ctx: &mut ValidationContext<'_>) -> Result<StageResult, AnalysisError> {
        let mut result = StageResult::new(self.name());
        let total_sites = ctx.dataset.total_sites;

        let mut p_sum = 0.0;
        let mut significant = 0usize;
        let mut tested = 0usize;

        for (key, record) in &ctx.validated_patterns {
            let test = binomial_test(record.site_count, total_sites, DISCOVERY_BASELINE_RATE);
            p_sum += test.p_value;
            tested += 1;
            if test.significant {
                significant += 1;
            } else {
                ctx.flagged_patterns.insert(key.clone());
            }
        }

        let non_significant = tested - significant;
        if non_significant > 0 {
            result
                .warnings
                .push(ValidationWarning::NonSignificantPatterns {
                    count: non_significant,
                });
        }

        let rate = if tested == 0 {
            1.0
        } else {
            significant as f64 / tested as f64
        };
        result.score = rate;
        result.patterns_validated = significant;
        result.patterns_filtered = non_significant;
        result.metrics.insert(
            "averagePValue".to_string(),
            if tested == 0 { 1.0 } else { p_sum / tested as f64 },
        );
        result.metrics.insert("significanceRate".to_string(), rate);
        result
            .metrics
            .insert("testedPatterns".to_string(), tested as f64);
        Ok(result)
    }
}

/// Stage 7: aggregate recommendations from every prior stage
pub struct RecommendationValidation;

impl ValidationStage for RecommendationValidation {
    fn name(&self) -> &'static str {
        "RecommendationValidation"
    }

    fn execute(&self, ctx: &mut ValidationContext<'_>) -> Result<StageResult, AnalysisError> {
        let mut result = StageResult::new(self.name());

        for prior in &ctx.stage_results {
            result
                .recommendations
                .extend(prior.recommendations.iter().cloned());
        }

        let mean_confidence = if ctx.stage_results.is_empty() {
            1.0
        } else {
            ctx.stage_results.iter().map(|r| r.score).sum::<f64>()
                / ctx.stage_results.len() as f64
        };
        if mean_confidence < RECOMMENDATION_MIN_CONFIDENCE {
            result
                .warnings
                .push(ValidationWarning::LowRecommendationConfidence { mean_confidence });
        }

        result.score = mean_confidence;
        result.patterns_validated = ctx.validated_patterns.len();
        result
            .metrics
            .insert("recommendationCount".to_string(), result.recommendations.len() as f64);
        result
            .metrics
            .insert("meanConfidence".to_string(), mean_confidence);

        ctx.quality_metrics.recommendation_accuracy = mean_confidence;
        Ok(result)
    }
}
