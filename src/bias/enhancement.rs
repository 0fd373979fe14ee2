//! Statistical enhancement pass
//!
//! Re-derives per-header statistics through the kernel proper: a full r x 2
//! contingency test per header, Wilson intervals on overall frequency,
//! adequacy buckets, and a sensitivity score. Also runs the cross-analyzer
//! consistency checks (totals match, frequencies derive from counts).

use std::collections::BTreeMap;

use crate::dataset::SiteIndex;
use crate::stats::chi_square;
use crate::types::analysis_thresholds::FREQUENCY_TOLERANCE;
use crate::types::{
    BiasEnhancement, CmsDistribution, ConcentrationMetrics, ConsistencyCheck, HeaderCorrelation,
    HeaderEnhancement, SampleAdequacy,
};

use super::correlation::wilson_interval;

/// Run the enhancement pass over the finished correlation records
pub fn enhance(
    index: &SiteIndex,
    distribution: &CmsDistribution,
    concentration: &ConcentrationMetrics,
    correlations: &BTreeMap<String, HeaderCorrelation>,
) -> BiasEnhancement {
    let total_sites = index.total_sites();
    let mut consistency_checks = Vec::new();

    // Distribution buckets must partition the corpus
    let bucket_total: usize = distribution.buckets.values().map(|b| b.count).sum();
    consistency_checks.push(ConsistencyCheck {
        check: "distribution_partitions_corpus".to_string(),
        passed: bucket_total == total_sites,
        message: format!("buckets sum to {bucket_total}, corpus has {total_sites}"),
    });

    // Every correlation's occurrence count derives its frequency
    let frequency_mismatch = correlations.values().find(|c| {
        let derived = c.occurrences as f64 / total_sites.max(1) as f64;
        (c.frequency - derived).abs() > FREQUENCY_TOLERANCE
    });
    consistency_checks.push(ConsistencyCheck {
        check: "frequency_derives_from_counts".to_string(),
        passed: frequency_mismatch.is_none(),
        message: frequency_mismatch
            .map(|c| format!("header '{}' frequency drifts from its count", c.header))
            .unwrap_or_else(|| "ok".to_string()),
    });

    // Occurrences never exceed the corpus
    let overflow = correlations.values().find(|c| c.occurrences > total_sites);
    consistency_checks.push(ConsistencyCheck {
        check: "occurrences_bounded_by_corpus".to_string(),
        passed: overflow.is_none(),
        message: overflow
            .map(|c| format!("header '{}' counts more sites than exist", c.header))
            .unwrap_or_else(|| "ok".to_string()),
    });

    // Per-header refinement through the kernel's r x 2 test
    let mut headers = Vec::new();
    for correlation in correlations.values() {
        let mut table: Vec<Vec<f64>> = Vec::new();
        for (cms, members) in index.cms_groups() {
            let group_size = members.len() as f64;
            let observed = correlation
                .per_cms
                .get(cms)
                .map_or(0.0, |m| m.observed as f64);
            table.push(vec![observed, group_size - observed]);
        }

        let p_value = chi_square(&table).map_or(1.0, |result| result.p_value);
        let frequency_interval = wilson_interval(correlation.occurrences, total_sites);
        let sensitivity = correlation.specificity.score
            * correlation.conditionals.max_cms_given_header
            * concentration.hhi;

        headers.push(HeaderEnhancement {
            header: correlation.header.clone(),
            p_value,
            frequency_interval,
            adequacy: SampleAdequacy::from_occurrences(correlation.occurrences),
            sensitivity,
        });
    }

    BiasEnhancement {
        consistency_checks,
        headers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bias::concentration::concentration_metrics;
    use crate::bias::correlation::header_correlations;
    use crate::bias::distribution::cms_distribution;
    use crate::types::{AnalysisOptions, PreprocessedDataset, SiteObservation};
    use chrono::{DateTime, Utc};
    use std::collections::BTreeSet;

    fn make_site(url: &str, cms: &str, headers: &[&str]) -> SiteObservation {
        SiteObservation {
            url: format!("https://{url}"),
            normalized_url: url.to_string(),
            cms: Some(cms.to_string()),
            confidence: 0.9,
            headers: headers
                .iter()
                .map(|h| (h.to_string(), BTreeSet::new()))
                .collect(),
            meta_tags: BTreeMap::new(),
            scripts: BTreeSet::new(),
            technologies: BTreeSet::new(),
            captured_at: DateTime::<Utc>::UNIX_EPOCH,
            page_types: BTreeMap::new(),
        }
    }

    fn scenario() -> PreprocessedDataset {
        let mut sites = Vec::new();
        for i in 0..50 {
            sites.push(make_site(&format!("wp{i}.example"), "WordPress", &["x-wp", "server"]));
        }
        for i in 0..50 {
            sites.push(make_site(&format!("d{i}.example"), "Drupal", &["server"]));
        }
        PreprocessedDataset::from_sites(sites)
    }

    #[test]
    fn consistency_checks_pass_on_clean_corpus() {
        let dataset = scenario();
        let index = SiteIndex::build(&dataset);
        let distribution = cms_distribution(&dataset);
        let concentration = concentration_metrics(&distribution);
        let correlations =
            header_correlations(&dataset, &index, &distribution, &AnalysisOptions::default());

        let enhancement = enhance(&index, &distribution, &concentration, &correlations);
        assert_eq!(enhancement.consistency_checks.len(), 3);
        assert!(enhancement.consistency_checks.iter().all(|c| c.passed));
    }

    #[test]
    fn discriminative_header_has_small_p_value() {
        let dataset = scenario();
        let index = SiteIndex::build(&dataset);
        let distribution = cms_distribution(&dataset);
        let concentration = concentration_metrics(&distribution);
        let correlations =
            header_correlations(&dataset, &index, &distribution, &AnalysisOptions::default());

        let enhancement = enhance(&index, &distribution, &concentration, &correlations);
        let wp_marker = enhancement
            .headers
            .iter()
            .find(|h| h.header == "x-wp")
            .expect("x-wp enhanced");
        assert!(wp_marker.p_value < 0.01, "p = {}", wp_marker.p_value);

        let server = enhancement
            .headers
            .iter()
            .find(|h| h.header == "server")
            .expect("server enhanced");
        assert!(server.p_value > 0.5, "universal header is independent of CMS");
    }

    #[test]
    fn sensitivity_scales_with_specificity() {
        let dataset = scenario();
        let index = SiteIndex::build(&dataset);
        let distribution = cms_distribution(&dataset);
        let concentration = concentration_metrics(&distribution);
        let correlations =
            header_correlations(&dataset, &index, &distribution, &AnalysisOptions::default());

        let enhancement = enhance(&index, &distribution, &concentration, &correlations);
        let by_name: BTreeMap<&str, f64> = enhancement
            .headers
            .iter()
            .map(|h| (h.header.as_str(), h.sensitivity))
            .collect();
        assert!(by_name["x-wp"] > by_name["server"]);
    }
}
