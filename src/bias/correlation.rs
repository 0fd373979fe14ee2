//! Header-CMS correlation engine
//!
//! One scan over the site index yields, per header: overall occurrence
//! metrics, per-CMS chi-square contributions with a normal-approximation
//! significance flag, two-way conditional probabilities with Wilson score
//! intervals, information gain, discriminative power, a two-tier platform
//! specificity score, a bias adjustment against corpus composition, and an
//! enumerated recommendation risk.

use std::collections::{BTreeMap, BTreeSet};

use crate::dataset::SiteIndex;
use crate::stats::moments;
use crate::types::analysis_thresholds::{
    ADJUSTMENT_FACTOR_CAP, DISCRIMINATIVE_MIN_OCCURRENCES, DISCRIMINATIVE_MIN_TOP_PROBABILITY,
    EPSILON, HIGH_SPECIFICITY, IMPACT_MINIMAL, IMPACT_MODERATE, MAJOR_CMS_SHARE,
};
use crate::types::{
    AdjustmentImpact, AdjustmentReliability, AnalysisOptions, BiasAdjustment, CmsDistribution,
    ConditionalMatrix, ConditionalProbability, HeaderCmsMetrics, HeaderCorrelation,
    PlatformSpecificity, PreprocessedDataset, RecommendationRisk, RiskFactor, RiskLevel,
    SampleAdequacy, SpecificityMethod,
};

/// CMS labels excluded from discriminative specificity scoring
const NON_DISCRIMINATIVE_LABELS: &[&str] = &["Unknown", "Enterprise", "CDN"];

/// Wilson score interval for a binomial proportion at z = 1.96
pub fn wilson_interval(successes: usize, n: usize) -> (f64, f64) {
    if n == 0 {
        return (0.0, 1.0);
    }
    let z = 1.96_f64;
    let nf = n as f64;
    let p = successes as f64 / nf;
    let z2 = z * z;
    let denom = 1.0 + z2 / nf;
    let center = (p + z2 / (2.0 * nf)) / denom;
    let margin = (z / denom) * (p * (1.0 - p) / nf + z2 / (4.0 * nf * nf)).sqrt();
    ((center - margin).max(0.0), (center + margin).min(1.0))
}

/// Shannon entropy of a count distribution, in nats
fn entropy_of_counts(counts: &[usize]) -> f64 {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    -counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total as f64;
            p * p.ln()
        })
        .sum::<f64>()
}

/// Major CMS platforms: labeled buckets holding more than 5% of the corpus
fn major_cms(distribution: &CmsDistribution) -> Vec<&str> {
    distribution
        .buckets
        .values()
        .filter(|b| b.cms != "Unknown" && b.percentage / 100.0 > MAJOR_CMS_SHARE)
        .map(|b| b.cms.as_str())
        .collect()
}

/// Build the full correlation record set for every header clearing the
/// occurrence threshold
pub fn header_correlations(
    dataset: &PreprocessedDataset,
    index: &SiteIndex,
    distribution: &CmsDistribution,
    options: &AnalysisOptions,
) -> BTreeMap<String, HeaderCorrelation> {
    let total_sites = dataset.total_sites;
    let majors = major_cms(distribution);
    let cms_entropy = entropy_of_counts(
        &distribution
            .buckets
            .values()
            .map(|b| b.count)
            .collect::<Vec<_>>(),
    );

    let cms_shares: BTreeMap<String, f64> = index
        .cms_groups()
        .iter()
        .map(|(cms, members)| {
            (
                cms.clone(),
                members.len() as f64 / total_sites.max(1) as f64,
            )
        })
        .collect();

    let mut correlations = BTreeMap::new();

    for header in index.header_names() {
        let Some(carrier_sites) = index.sites_with(header) else {
            continue;
        };
        let occurrences = carrier_sites.len();
        if occurrences < options.min_occurrences || occurrences == 0 {
            continue;
        }
        let frequency = occurrences as f64 / total_sites.max(1) as f64;

        // Value bookkeeping over the carrying sites
        let mut value_sites: BTreeMap<&str, usize> = BTreeMap::new();
        let mut value_slots = 0usize;
        let mut page_type_distribution: BTreeMap<String, usize> = BTreeMap::new();
        for id in carrier_sites.iter() {
            let Some(site) = index.site(dataset, id) else {
                continue;
            };
            if let Some(values) = site.headers.get(header) {
                value_slots += values.len();
                for value in values {
                    *value_sites.entry(value.as_str()).or_default() += 1;
                }
            }
            for (page_type, page) in &site.page_types {
                if page.headers.contains_key(header) {
                    *page_type_distribution.entry(page_type.clone()).or_default() += 1;
                }
            }
        }
        let unique_values = value_sites.len();
        let avg_values_per_site = value_slots as f64 / occurrences.max(1) as f64;
        let most_common_value = value_sites
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(value, _)| value.to_string());

        // Per-CMS metrics and chi-square contributions
        let mut per_cms: BTreeMap<String, HeaderCmsMetrics> = BTreeMap::new();
        let mut chi_square = 0.0;
        let mut per_cms_frequencies: Vec<(String, f64, usize)> = Vec::new();
        let mut joint_counts: BTreeMap<&str, usize> = BTreeMap::new();

        for (cms, members) in index.cms_groups() {
            let group_size = members.len();
            if group_size == 0 {
                continue;
            }
            let observed = carrier_sites.intersection_count(members);
            joint_counts.insert(cms.as_str(), observed);
            let expected = frequency * group_size as f64;
            let contribution = if expected > EPSILON {
                let diff = observed as f64 - expected;
                diff * diff / expected
            } else {
                0.0
            };
            chi_square += contribution;

            let deviation = (observed as f64 - expected).abs();
            let significance_band =
                1.96 * (expected * (1.0 - frequency)).max(0.0).sqrt();
            let significant = expected > EPSILON && deviation > significance_band;

            // Top values within the group
            let mut group_values: BTreeMap<&str, usize> = BTreeMap::new();
            for id in members.iter() {
                if !carrier_sites.contains(id) {
                    continue;
                }
                if let Some(site) = index.site(dataset, id) {
                    if let Some(values) = site.headers.get(header) {
                        for value in values {
                            *group_values.entry(value.as_str()).or_default() += 1;
                        }
                    }
                }
            }
            let mut top_values: Vec<(String, usize)> = group_values
                .iter()
                .map(|(value, &count)| (value.to_string(), count))
                .collect();
            top_values.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            top_values.truncate(3);

            let value_counts: Vec<usize> = group_values.values().copied().collect();
            let value_uniqueness = if value_counts.len() > 1 {
                entropy_of_counts(&value_counts) / (value_counts.len() as f64).ln()
            } else {
                0.0
            };

            let frequency_in_cms = observed as f64 / group_size as f64;
            per_cms_frequencies.push((cms.clone(), frequency_in_cms, observed));

            per_cms.insert(
                cms.clone(),
                HeaderCmsMetrics {
                    cms: cms.clone(),
                    observed,
                    expected,
                    chi_square_contribution: contribution,
                    significant,
                    frequency_in_cms,
                    top_values,
                    value_uniqueness,
                },
            );
        }

        // Conditional probabilities in both directions
        let mut cms_given_header: BTreeMap<String, ConditionalProbability> = BTreeMap::new();
        let mut header_given_cms: BTreeMap<String, ConditionalProbability> = BTreeMap::new();
        let mut max_cms_given_header = 0.0_f64;
        let mut conditional_entropy_counts: Vec<usize> = Vec::new();

        for (cms, members) in index.cms_groups() {
            let joint = joint_counts.get(cms.as_str()).copied().unwrap_or(0);
            let group_size = members.len();
            let cms_share = group_size as f64 / total_sites.max(1) as f64;

            let p_cms = joint as f64 / occurrences.max(1) as f64;
            let (low, high) = wilson_interval(joint, occurrences);
            cms_given_header.insert(
                cms.clone(),
                ConditionalProbability {
                    probability: p_cms,
                    wilson_low: low,
                    wilson_high: high,
                    significant: low > cms_share || high < cms_share,
                },
            );
            max_cms_given_header = max_cms_given_header.max(p_cms);
            conditional_entropy_counts.push(joint);

            let p_header = joint as f64 / group_size.max(1) as f64;
            let (low, high) = wilson_interval(joint, group_size);
            header_given_cms.insert(
                cms.clone(),
                ConditionalProbability {
                    probability: p_header,
                    wilson_low: low,
                    wilson_high: high,
                    significant: low > frequency || high < frequency,
                },
            );
        }

        // Information gain: entropy of the CMS distribution minus entropy of
        // CMS among carriers
        let information_gain =
            (cms_entropy - entropy_of_counts(&conditional_entropy_counts)).max(0.0);

        // Discriminative power: top conditional against the mean of the rest
        let mut probabilities: Vec<f64> = cms_given_header
            .values()
            .map(|c| c.probability)
            .collect();
        probabilities.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        let discriminative_power = match probabilities.split_first() {
            Some((&max, others)) if !others.is_empty() => {
                let mean_others = others.iter().sum::<f64>() / others.len() as f64;
                (max / mean_others.max(EPSILON)).min(ADJUSTMENT_FACTOR_CAP)
            }
            _ => 1.0,
        };

        let specificity = platform_specificity(
            occurrences,
            frequency,
            &cms_given_header,
            &per_cms_frequencies,
            &cms_shares,
        );

        let adjustment = bias_adjustment(&per_cms_frequencies, &majors);

        let significant_groups = per_cms.values().filter(|m| m.significant).count();
        let risk = recommendation_risk(
            &specificity,
            &adjustment,
            occurrences,
            significant_groups,
            unique_values,
        );

        correlations.insert(
            header.to_string(),
            HeaderCorrelation {
                header: header.to_string(),
                frequency,
                occurrences,
                page_type_distribution,
                unique_values,
                avg_values_per_site,
                most_common_value,
                per_cms,
                chi_square,
                conditionals: ConditionalMatrix {
                    cms_given_header,
                    header_given_cms,
                    max_cms_given_header,
                    information_gain,
                    discriminative_power,
                },
                specificity,
                adjustment,
                risk,
            },
        );
    }

    correlations
}

/// Two-tier platform specificity: discriminative scoring for well-sampled
/// headers, coefficient of variation for sparse ones
fn platform_specificity(
    occurrences: usize,
    frequency: f64,
    cms_given_header: &BTreeMap<String, ConditionalProbability>,
    per_cms_frequencies: &[(String, f64, usize)],
    cms_shares: &BTreeMap<String, f64>,
) -> PlatformSpecificity {
    let sample_adequacy = SampleAdequacy::from_occurrences(occurrences);

    if occurrences >= DISCRIMINATIVE_MIN_OCCURRENCES {
        // Restrict to real platform labels
        let candidates: Vec<(&str, f64)> = cms_given_header
            .iter()
            .filter(|(cms, _)| !NON_DISCRIMINATIVE_LABELS.contains(&cms.as_str()))
            .map(|(cms, c)| (cms.as_str(), c.probability))
            .collect();
        let top = candidates
            .iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let (score, top_cms) = match top {
            Some(&(cms, top_p)) if top_p > DISCRIMINATIVE_MIN_TOP_PROBABILITY => {
                // Concentration is the excess of P(cms | header) over the
                // platform's base rate, normalized to [0, 1]; a universal
                // header on a skewed corpus scores zero here
                let base = cms_shares.get(cms).copied().unwrap_or(0.0);
                let concentration =
                    ((top_p - base).max(0.0) / (1.0 - base).max(EPSILON)).clamp(0.0, 1.0);
                let sample_size = (occurrences as f64 / 100.0).min(1.0);
                let freq_in_top = per_cms_frequencies
                    .iter()
                    .find(|(label, _, _)| label == cms)
                    .map_or(0.0, |(_, f, _)| *f);
                let background_contrast = ((freq_in_top - frequency).max(0.0)
                    / (1.0 - frequency).max(EPSILON))
                .clamp(0.0, 1.0);
                (
                    0.5 * concentration + 0.3 * sample_size + 0.2 * background_contrast,
                    Some(cms.to_string()),
                )
            }
            _ => (0.0, None),
        };

        return PlatformSpecificity {
            score: score.clamp(0.0, 1.0),
            method: SpecificityMethod::Discriminative,
            top_cms,
            sample_adequacy,
        };
    }

    // Sparse fallback: coefficient of variation across per-CMS frequencies
    let frequencies: Vec<f64> = per_cms_frequencies.iter().map(|(_, f, _)| *f).collect();
    let stats = moments(&frequencies);
    let cv = if stats.mean > EPSILON {
        stats.std_dev / stats.mean
    } else {
        0.0
    };

    PlatformSpecificity {
        score: cv.min(1.0),
        method: SpecificityMethod::CoefficientVariation,
        top_cms: None,
        sample_adequacy,
    }
}

/// Equal-weighted frequency across major CMS versus the raw per-CMS mean
fn bias_adjustment(
    per_cms_frequencies: &[(String, f64, usize)],
    majors: &[&str],
) -> BiasAdjustment {
    let raw_frequency = if per_cms_frequencies.is_empty() {
        0.0
    } else {
        per_cms_frequencies.iter().map(|(_, f, _)| f).sum::<f64>()
            / per_cms_frequencies.len() as f64
    };

    let major_frequencies: Vec<f64> = per_cms_frequencies
        .iter()
        .filter(|(cms, _, _)| majors.contains(&cms.as_str()))
        .map(|(_, f, _)| *f)
        .collect();
    let major_cms_count = major_frequencies.len();

    let adjusted_frequency = if major_frequencies.is_empty() {
        raw_frequency
    } else {
        major_frequencies.iter().sum::<f64>() / major_frequencies.len() as f64
    };

    let adjustment_factor = if raw_frequency > EPSILON {
        (adjusted_frequency / raw_frequency).min(ADJUSTMENT_FACTOR_CAP)
    } else {
        1.0
    };

    let reliability = match major_cms_count {
        n if n >= 3 => AdjustmentReliability::High,
        2 => AdjustmentReliability::Medium,
        _ => AdjustmentReliability::Low,
    };

    let shift = (adjustment_factor - 1.0).abs();
    let impact = if shift < IMPACT_MINIMAL {
        AdjustmentImpact::Minimal
    } else if shift < IMPACT_MODERATE {
        AdjustmentImpact::Moderate
    } else {
        AdjustmentImpact::Significant
    };

    BiasAdjustment {
        raw_frequency,
        adjusted_frequency,
        adjustment_factor,
        major_cms_count,
        reliability,
        impact,
    }
}

/// Enumerated recommendation-risk factors with the worst-of aggregation
fn recommendation_risk(
    specificity: &PlatformSpecificity,
    adjustment: &BiasAdjustment,
    occurrences: usize,
    significant_groups: usize,
    unique_values: usize,
) -> RecommendationRisk {
    let mut factors = Vec::new();
    let mut mitigation = Vec::new();

    let specificity_level = if specificity.score > HIGH_SPECIFICITY {
        RiskLevel::High
    } else if specificity.score > 0.4 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };
    if specificity_level > RiskLevel::Low {
        mitigation.push(
            "Validate the header against corpora with a different platform mix".to_string(),
        );
    }
    factors.push(RiskFactor::PlatformSpecificity {
        level: specificity_level,
        score: specificity.score,
    });

    let bias_level = match adjustment.impact {
        AdjustmentImpact::Significant => RiskLevel::High,
        AdjustmentImpact::Moderate => RiskLevel::Medium,
        AdjustmentImpact::Minimal => {
            // Strongly skewed per-CMS significance is still a bias signal
            // even when the equal-weighted mean barely moves
            if significant_groups > 0 && specificity.score > HIGH_SPECIFICITY {
                RiskLevel::Medium
            } else {
                RiskLevel::Low
            }
        }
    };
    if bias_level > RiskLevel::Low {
        mitigation.push("Report bias-adjusted frequency alongside the raw figure".to_string());
    }
    factors.push(RiskFactor::DatasetBias {
        level: bias_level,
        adjustment_factor: adjustment.adjustment_factor,
    });

    let sample_level = match specificity.sample_adequacy {
        SampleAdequacy::Low => RiskLevel::High,
        SampleAdequacy::Medium => RiskLevel::Medium,
        SampleAdequacy::High => RiskLevel::Low,
    };
    if sample_level > RiskLevel::Low {
        mitigation.push("Collect more observations before acting on this header".to_string());
    }
    factors.push(RiskFactor::SampleSize {
        level: sample_level,
        occurrences,
    });

    let significance_level = if significant_groups == 0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };
    factors.push(RiskFactor::StatisticalSignificance {
        level: significance_level,
        significant_groups,
    });

    let diversity_level = if occurrences > 0 && unique_values >= occurrences.max(10) {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };
    if diversity_level > RiskLevel::Low {
        mitigation.push("Treat per-site unique values as identifiers, not signals".to_string());
    }
    factors.push(RiskFactor::ValueDiversity {
        level: diversity_level,
        unique_values,
    });

    let highs = factors.iter().filter(|f| f.level() == RiskLevel::High).count();
    let mediums = factors
        .iter()
        .filter(|f| f.level() == RiskLevel::Medium)
        .count();
    let overall = if highs > 0 {
        RiskLevel::High
    } else if mediums > 1 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    let confidence = match specificity.sample_adequacy {
        SampleAdequacy::High => 0.9,
        SampleAdequacy::Medium => 0.7,
        SampleAdequacy::Low => 0.5,
    };

    RecommendationRisk {
        factors,
        overall,
        confidence,
        mitigation,
    }
}

/// Headers whose specificity marks them platform-specific
pub fn high_specificity_headers(
    correlations: &BTreeMap<String, HeaderCorrelation>,
) -> BTreeSet<String> {
    correlations
        .iter()
        .filter(|(_, c)| c.specificity.score > HIGH_SPECIFICITY)
        .map(|(header, _)| header.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bias::distribution::cms_distribution;
    use crate::types::SiteObservation;
    use chrono::{DateTime, Utc};

    fn make_site(url: &str, cms: Option<&str>, headers: &[(&str, &str)]) -> SiteObservation {
        let mut header_map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (name, value) in headers {
            header_map
                .entry(name.to_string())
                .or_default()
                .insert(value.to_string());
        }
        SiteObservation {
            url: format!("https://{url}"),
            normalized_url: url.to_string(),
            cms: cms.map(str::to_string),
            confidence: 0.9,
            headers: header_map,
            meta_tags: BTreeMap::new(),
            scripts: BTreeSet::new(),
            technologies: BTreeSet::new(),
            captured_at: DateTime::<Utc>::UNIX_EPOCH,
            page_types: BTreeMap::new(),
        }
    }

    /// 90% WordPress / 10% Drupal; one header on every WordPress site and
    /// 10% of Drupal sites
    fn biased_dataset() -> PreprocessedDataset {
        let mut sites = Vec::new();
        for i in 0..90 {
            sites.push(make_site(
                &format!("wp{i}.example"),
                Some("WordPress"),
                &[("x-wp-marker", "1"), ("server", "nginx")],
            ));
        }
        for i in 0..10 {
            let headers: Vec<(&str, &str)> = if i == 0 {
                vec![("x-wp-marker", "1"), ("server", "apache")]
            } else {
                vec![("server", "apache")]
            };
            sites.push(make_site(&format!("d{i}.example"), Some("Drupal"), &headers));
        }
        PreprocessedDataset::from_sites(sites)
    }

    fn correlations_for(
        dataset: &PreprocessedDataset,
    ) -> BTreeMap<String, HeaderCorrelation> {
        let index = SiteIndex::build(dataset);
        let distribution = cms_distribution(dataset);
        header_correlations(dataset, &index, &distribution, &AnalysisOptions::default())
    }

    #[test]
    fn wilson_interval_brackets_the_proportion() {
        let (low, high) = wilson_interval(50, 100);
        assert!(low < 0.5 && 0.5 < high);
        assert!(low > 0.39 && high < 0.61);

        let (low, high) = wilson_interval(0, 0);
        assert!((low, high) == (0.0, 1.0));
    }

    #[test]
    fn chi_square_is_sum_of_contributions() {
        let correlations = correlations_for(&biased_dataset());
        let marker = &correlations["x-wp-marker"];
        let manual: f64 = marker
            .per_cms
            .values()
            .map(|m| m.chi_square_contribution)
            .sum();
        assert!((manual - marker.chi_square).abs() < 1e-9);
    }

    #[test]
    fn expected_counts_follow_overall_frequency() {
        let correlations = correlations_for(&biased_dataset());
        let marker = &correlations["x-wp-marker"];
        // overall freq = 91/100; expected in WordPress = 0.91 * 90
        let wp = &marker.per_cms["WordPress"];
        assert!((wp.expected - 0.91 * 90.0).abs() < 1e-9);
        assert_eq!(wp.observed, 90);
    }

    #[test]
    fn conditionals_are_bayes_consistent() {
        let correlations = correlations_for(&biased_dataset());
        let marker = &correlations["x-wp-marker"];
        // P(cms|header) * P(header) == P(header|cms) * P(cms)
        let p_header = marker.frequency;
        for (cms, forward) in &marker.conditionals.cms_given_header {
            let backward = &marker.conditionals.header_given_cms[cms];
            let p_cms = match cms.as_str() {
                "WordPress" => 0.9,
                "Drupal" => 0.1,
                other => panic!("unexpected cms {other}"),
            };
            let left = forward.probability * p_header;
            let right = backward.probability * p_cms;
            assert!(
                (left - right).abs() < 1e-9,
                "joint mismatch for {cms}: {left} vs {right}"
            );
        }
    }

    #[test]
    fn platform_specific_header_scores_high() {
        let correlations = correlations_for(&biased_dataset());
        let marker = &correlations["x-wp-marker"];
        assert_eq!(marker.specificity.method, SpecificityMethod::Discriminative);
        assert_eq!(marker.specificity.top_cms.as_deref(), Some("WordPress"));
        assert!(
            marker.specificity.score > HIGH_SPECIFICITY,
            "score = {}",
            marker.specificity.score
        );
        assert!(marker.per_cms["WordPress"].significant || marker.per_cms["Drupal"].significant);
    }

    #[test]
    fn universal_header_scores_low() {
        let correlations = correlations_for(&biased_dataset());
        let server = &correlations["server"];
        assert!(
            server.specificity.score < 0.6,
            "server is everywhere, score = {}",
            server.specificity.score
        );
    }

    #[test]
    fn bias_adjustment_scenario_mixed_presence() {
        // 100% of WordPress, 10% of Drupal: raw mean = 0.55, equal-weighted
        // over both majors = 0.55, factor ~ 1.0, impact minimal
        let correlations = correlations_for(&biased_dataset());
        let marker = &correlations["x-wp-marker"];
        assert!((marker.adjustment.raw_frequency - 0.55).abs() < 1e-9);
        assert!((marker.adjustment.adjusted_frequency - 0.55).abs() < 1e-9);
        assert!((marker.adjustment.adjustment_factor - 1.0).abs() < 1e-9);
        assert_eq!(marker.adjustment.impact, AdjustmentImpact::Minimal);
        assert_eq!(marker.adjustment.major_cms_count, 2);
        assert_eq!(marker.adjustment.reliability, AdjustmentReliability::Medium);
    }

    #[test]
    fn minimal_impact_with_significance_still_reports_dataset_bias() {
        let correlations = correlations_for(&biased_dataset());
        let marker = &correlations["x-wp-marker"];
        let bias_factor = marker
            .risk
            .factors
            .iter()
            .find(|f| matches!(f, RiskFactor::DatasetBias { .. }))
            .expect("dataset_bias factor present");
        assert!(
            bias_factor.level() > RiskLevel::Low,
            "platform-specific significant header carries dataset bias risk"
        );
    }

    #[test]
    fn sparse_header_uses_coefficient_of_variation() {
        let mut sites = vec![
            make_site("a.example", Some("WordPress"), &[("x-sparse", "1")]),
            make_site("b.example", Some("WordPress"), &[("x-sparse", "1")]),
        ];
        for i in 0..20 {
            sites.push(make_site(&format!("f{i}.example"), Some("Drupal"), &[("server", "x")]));
        }
        let dataset = PreprocessedDataset::from_sites(sites);
        let correlations = correlations_for(&dataset);

        let sparse = &correlations["x-sparse"];
        assert_eq!(
            sparse.specificity.method,
            SpecificityMethod::CoefficientVariation
        );
        assert_eq!(sparse.specificity.sample_adequacy, SampleAdequacy::Low);
        assert!(sparse.specificity.score > 0.5, "concentrated in one CMS");
    }

    #[test]
    fn information_gain_positive_for_discriminative_header() {
        let correlations = correlations_for(&biased_dataset());
        let marker = &correlations["x-wp-marker"];
        let server = &correlations["server"];
        assert!(marker.conditionals.information_gain >= server.conditionals.information_gain);
    }

    #[test]
    fn value_metadata_collected() {
        let correlations = correlations_for(&biased_dataset());
        let server = &correlations["server"];
        assert_eq!(server.unique_values, 2);
        assert_eq!(server.most_common_value.as_deref(), Some("nginx"));
        let wp = &server.per_cms["WordPress"];
        assert_eq!(wp.top_values[0].0, "nginx");
    }
}
