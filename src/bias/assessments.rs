//! Bias warnings and cross-analyzer assessments
//!
//! Warnings derive from the distribution and correlation passes alone; the
//! technology, semantic and discovery assessments exist only when the
//! corresponding producer snapshot was injected — a missing snapshot omits
//! the assessment rather than degrading it.

use std::collections::BTreeMap;

use crate::stats::hhi;
use crate::types::analysis_thresholds::{
    HHI_HIGH_RISK, PLATFORM_DOMINANCE_SHARE, UNKNOWN_SITES_SHARE,
};
use crate::analyzers::SemanticAnalysis;
use crate::types::{
    BiasWarning, CmsDistribution, ConcentrationMetrics, DiscoveryAnalysis,
    DiscoveryBiasAssessment, HeaderCorrelation, RiskLevel,
    SemanticBiasAssessment, TechnologyBiasAssessment, VendorAnalysis,
};
use crate::vendor::EXPECTED_VENDORS_BY_CMS;

/// Vendor-share HHI above which technology detection is considered biased
const VENDOR_HHI_WARNING: f64 = 0.7;

/// High-specificity header count above which a warning fires
const SPECIFICITY_WARNING_COUNT: usize = 5;

/// Corpus-level bias warnings
pub fn bias_warnings(
    distribution: &CmsDistribution,
    concentration: &ConcentrationMetrics,
    correlations: &BTreeMap<String, HeaderCorrelation>,
    vendor: Option<&VendorAnalysis>,
) -> Vec<BiasWarning> {
    let mut warnings = Vec::new();

    if concentration.hhi > HHI_HIGH_RISK {
        warnings.push(BiasWarning::HighConcentration {
            hhi: concentration.hhi,
        });
    }

    if let Some(bucket) = distribution
        .buckets
        .values()
        .max_by(|a, b| a.count.cmp(&b.count))
    {
        let share = bucket.percentage / 100.0;
        if share > PLATFORM_DOMINANCE_SHARE {
            warnings.push(BiasWarning::PlatformDominance {
                cms: bucket.cms.clone(),
                share,
            });
        }
    }

    let distinct_cms = distribution
        .buckets
        .keys()
        .filter(|cms| cms.as_str() != "Unknown")
        .count();
    if distinct_cms <= 2 && distribution.total_sites > 0 {
        warnings.push(BiasWarning::LowDiversity { distinct_cms });
    }

    if let Some(unknown) = distribution.buckets.get("Unknown") {
        let share = unknown.percentage / 100.0;
        if share > UNKNOWN_SITES_SHARE {
            warnings.push(BiasWarning::ManyUnknownSites { share });
        }
    }

    let high_specificity = super::correlation::high_specificity_headers(correlations);
    if high_specificity.len() > SPECIFICITY_WARNING_COUNT {
        warnings.push(BiasWarning::HighSpecificityHeaders {
            count: high_specificity.len(),
        });
    }

    if let Some(vendor) = vendor {
        let shares: Vec<f64> = vendor
            .statistics
            .vendors
            .values()
            .map(|s| s.share_of_matched_headers * 100.0)
            .collect();
        let vendor_hhi = hhi(&shares);
        if vendor_hhi > VENDOR_HHI_WARNING {
            warnings.push(BiasWarning::CrossAnalyzer {
                source: "vendor".to_string(),
                message: format!(
                    "vendor detections are concentrated (HHI {vendor_hhi:.2}); header coverage may track a single vendor"
                ),
            });
        }
    }

    warnings
}

/// Technology bias from the injected vendor snapshot
pub fn technology_bias(
    vendor: &VendorAnalysis,
    distribution: &CmsDistribution,
) -> TechnologyBiasAssessment {
    let shares: Vec<f64> = vendor
        .statistics
        .vendors
        .values()
        .map(|s| s.share_of_matched_headers * 100.0)
        .collect();
    let vendor_hhi = hhi(&shares);

    let dominant_vendors: Vec<String> = vendor
        .statistics
        .vendors
        .values()
        .filter(|s| s.share_of_matched_headers > 0.3)
        .map(|s| s.vendor.clone())
        .collect();

    let total_detections: usize = vendor.statistics.category_counts.values().sum();
    let biased_categories: Vec<String> = vendor
        .statistics
        .category_counts
        .iter()
        .filter(|(_, &count)| {
            total_detections > 0 && count as f64 / total_detections as f64 > 0.5
        })
        .map(|(category, _)| category.to_string())
        .collect();

    // Major CMS platforms whose expected vendors never surfaced
    let mut technology_gaps = Vec::new();
    for (cms, expected) in EXPECTED_VENDORS_BY_CMS {
        let Some(bucket) = distribution.buckets.get(*cms) else {
            continue;
        };
        if bucket.percentage < 5.0 {
            continue;
        }
        for vendor_name in *expected {
            if !vendor.statistics.vendors.contains_key(*vendor_name) {
                technology_gaps.push(format!("{vendor_name} (expected for {cms})"));
            }
        }
    }

    let level = if vendor_hhi > VENDOR_HHI_WARNING || !technology_gaps.is_empty() {
        RiskLevel::High
    } else if vendor_hhi > 0.4 || !dominant_vendors.is_empty() {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    let mut recommendations = Vec::new();
    if !technology_gaps.is_empty() {
        recommendations
            .push("Review crawler header capture for the platforms with missing vendors".to_string());
    }
    if vendor_hhi > VENDOR_HHI_WARNING {
        recommendations
            .push("Broaden the corpus beyond the dominant vendor's customer base".to_string());
    }

    TechnologyBiasAssessment {
        vendor_hhi,
        dominant_vendors,
        biased_categories,
        technology_gaps,
        level,
        recommendations,
    }
}

/// Semantic bias from the dataset's semantic block, with category shares
/// taken from the injected semantic analysis when available
pub fn semantic_bias(
    metadata: &crate::types::SemanticMetadata,
    analysis: Option<&SemanticAnalysis>,
) -> SemanticBiasAssessment {
    // Shares from the analyzer snapshot when injected, else derived from the
    // raw classification table
    let shares: BTreeMap<String, f64> = match analysis {
        Some(analysis) => analysis.category_shares.clone(),
        None => {
            let mut counts: BTreeMap<String, usize> = BTreeMap::new();
            for category in metadata.categories.values() {
                *counts.entry(category.clone()).or_default() += 1;
            }
            let total: usize = counts.values().sum();
            counts
                .into_iter()
                .map(|(category, count)| (category, count as f64 / total.max(1) as f64))
                .collect()
        }
    };

    let overrepresented_categories: Vec<String> = shares
        .iter()
        .filter(|(_, &share)| share > 0.5)
        .map(|(category, _)| category.clone())
        .collect();
    let underrepresented_categories: Vec<String> = shares
        .iter()
        .filter(|(_, &share)| share > 0.0 && share < 0.05)
        .map(|(category, _)| category.clone())
        .collect();

    // Headers whose declared category disagrees with their name shape
    const SHAPE_CATEGORIES: &[&str] = &["security", "caching", "infrastructure"];
    let mut misaligned_headers = Vec::new();
    for (header, category) in &metadata.categories {
        if !SHAPE_CATEGORIES.contains(&category.as_str()) {
            continue;
        }
        let shape = crate::cooccurrence::classify_header(header);
        if shape != crate::types::HeaderClass::Custom && shape.as_str() != category {
            misaligned_headers.push(header.clone());
        }
    }

    let level = if !overrepresented_categories.is_empty() {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    let mut recommendations = Vec::new();
    if !overrepresented_categories.is_empty() {
        recommendations.push(format!(
            "Category distribution is dominated by {}; widen semantic coverage",
            overrepresented_categories.join(", ")
        ));
    }
    if !misaligned_headers.is_empty() {
        recommendations
            .push("Re-classify headers whose names disagree with their category".to_string());
    }

    SemanticBiasAssessment {
        overrepresented_categories,
        underrepresented_categories,
        misaligned_headers,
        level,
        recommendations,
    }
}

/// Discovery bias from the injected pattern-discovery snapshot
pub fn discovery_bias(
    discovery: &DiscoveryAnalysis,
    distribution: &CmsDistribution,
) -> DiscoveryBiasAssessment {
    // Platform balance: evenness of discovered-pattern attention across CMS
    let mut platform_weight: BTreeMap<&str, f64> = BTreeMap::new();
    for pattern in &discovery.discovered {
        for (cms, fraction) in &pattern.cms_correlation {
            *platform_weight.entry(cms.as_str()).or_default() += fraction;
        }
    }
    let weights: Vec<f64> = platform_weight.values().copied().collect();
    let total_weight: f64 = weights.iter().sum();
    let platform_balance = if total_weight > 0.0 {
        let shares: Vec<f64> = weights.iter().map(|w| w / total_weight * 100.0).collect();
        1.0 - hhi(&shares)
    } else {
        1.0
    };

    // Category balance: evenness across pattern shapes
    let mut shape_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for pattern in &discovery.discovered {
        let key = match pattern.shape {
            crate::types::PatternShape::Prefix => "prefix",
            crate::types::PatternShape::Suffix => "suffix",
            crate::types::PatternShape::Contains => "contains",
            crate::types::PatternShape::RegexShape => "shape",
        };
        *shape_counts.entry(key).or_default() += 1;
    }
    let total_shapes: usize = shape_counts.values().sum();
    let category_balance = if total_shapes > 0 {
        let shares: Vec<f64> = shape_counts
            .values()
            .map(|&c| c as f64 / total_shapes as f64 * 100.0)
            .collect();
        1.0 - hhi(&shares)
    } else {
        1.0
    };

    // Completeness: did discovery touch a reasonable share of the platforms?
    let platforms = distribution
        .buckets
        .keys()
        .filter(|cms| cms.as_str() != "Unknown")
        .count();
    let covered = platform_weight
        .keys()
        .filter(|cms| **cms != "Unknown")
        .count();
    let discovery_completeness = if platforms == 0 {
        1.0
    } else {
        (covered as f64 / platforms as f64).min(1.0)
    };

    let level = if platform_balance < 0.3 || category_balance < 0.3 {
        RiskLevel::High
    } else if platform_balance < 0.6 || discovery_completeness < 0.5 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    let mut recommendations = Vec::new();
    if platform_balance < 0.6 {
        recommendations.push(
            "Discovered patterns concentrate on few platforms; verify against the others"
                .to_string(),
        );
    }
    if discovery_completeness < 0.5 {
        recommendations
            .push("Several platforms produced no discovered patterns; extend the corpus".to_string());
    }

    DiscoveryBiasAssessment {
        platform_balance,
        category_balance,
        discovery_completeness,
        level,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bias::concentration::concentration_metrics;
    use crate::bias::distribution::cms_distribution;
    use crate::types::{PreprocessedDataset, SiteObservation};
    use chrono::{DateTime, Utc};
    use std::collections::BTreeSet;

    fn make_site(url: &str, cms: Option<&str>, headers: &[&str]) -> SiteObservation {
        SiteObservation {
            url: format!("https://{url}"),
            normalized_url: url.to_string(),
            cms: cms.map(str::to_string),
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

    #[test]
    fn dominance_and_concentration_warnings_fire() {
        let mut sites: Vec<_> = (0..9)
            .map(|i| make_site(&format!("wp{i}.example"), Some("WordPress"), &[]))
            .collect();
        sites.push(make_site("d.example", Some("Drupal"), &[]));
        let dataset = PreprocessedDataset::from_sites(sites);

        let distribution = cms_distribution(&dataset);
        let concentration = concentration_metrics(&distribution);
        let warnings = bias_warnings(&distribution, &concentration, &BTreeMap::new(), None);

        assert!(warnings
            .iter()
            .any(|w| matches!(w, BiasWarning::HighConcentration { .. })));
        assert!(warnings
            .iter()
            .any(|w| matches!(w, BiasWarning::PlatformDominance { cms, .. } if cms == "WordPress")));
        assert!(warnings
            .iter()
            .any(|w| matches!(w, BiasWarning::LowDiversity { distinct_cms: 2 })));
    }

    #[test]
    fn unknown_share_warning_fires() {
        let mut sites: Vec<_> = (0..6)
            .map(|i| make_site(&format!("wp{i}.example"), Some("WordPress"), &[]))
            .collect();
        sites.extend((0..4).map(|i| make_site(&format!("u{i}.example"), None, &[])));
        let dataset = PreprocessedDataset::from_sites(sites);

        let distribution = cms_distribution(&dataset);
        let concentration = concentration_metrics(&distribution);
        let warnings = bias_warnings(&distribution, &concentration, &BTreeMap::new(), None);

        assert!(warnings
            .iter()
            .any(|w| matches!(w, BiasWarning::ManyUnknownSites { share } if *share > 0.3)));
    }

    #[test]
    fn technology_gaps_reported_for_major_cms() {
        let sites: Vec<_> = (0..10)
            .map(|i| make_site(&format!("wp{i}.example"), Some("WordPress"), &["server"]))
            .collect();
        let dataset = PreprocessedDataset::from_sites(sites);
        let distribution = cms_distribution(&dataset);

        // Vendor snapshot with no WordPress detection
        let vendor = VendorAnalysis::default();
        let assessment = technology_bias(&vendor, &distribution);

        assert!(assessment
            .technology_gaps
            .iter()
            .any(|gap| gap.contains("WordPress")));
        assert_eq!(assessment.level, RiskLevel::High);
    }

    #[test]
    fn semantic_misalignment_detected_from_metadata() {
        let mut metadata = crate::types::SemanticMetadata::default();
        // Name says caching, classification says security
        metadata
            .categories
            .insert("x-cache-status".to_string(), "security".to_string());
        metadata
            .categories
            .insert("x-frame-options".to_string(), "security".to_string());

        let assessment = semantic_bias(&metadata, None);
        assert_eq!(assessment.misaligned_headers, vec!["x-cache-status".to_string()]);
    }

    #[test]
    fn balanced_discovery_scores_low_risk() {
        let dataset = PreprocessedDataset::from_sites(vec![
            make_site("a.example", Some("WordPress"), &[]),
            make_site("b.example", Some("Drupal"), &[]),
        ]);
        let distribution = cms_distribution(&dataset);

        let mut discovery = DiscoveryAnalysis::default();
        discovery.discovered.push(crate::types::DiscoveredPattern {
            pattern: "prefix:acme".to_string(),
            shape: crate::types::PatternShape::Prefix,
            headers: BTreeSet::new(),
            site_count: 2,
            sites: BTreeSet::new(),
            frequency: 1.0,
            p_value: 0.01,
            significant: true,
            confidence: 0.8,
            inferred_vendor: None,
            cms_correlation: [
                ("WordPress".to_string(), 0.5),
                ("Drupal".to_string(), 0.5),
            ]
            .into_iter()
            .collect(),
            validation_boost_applied: false,
        });
        discovery.discovered.push(crate::types::DiscoveredPattern {
            pattern: "suffix:status".to_string(),
            shape: crate::types::PatternShape::Suffix,
            headers: BTreeSet::new(),
            site_count: 2,
            sites: BTreeSet::new(),
            frequency: 1.0,
            p_value: 0.01,
            significant: true,
            confidence: 0.8,
            inferred_vendor: None,
            cms_correlation: [
                ("WordPress".to_string(), 0.5),
                ("Drupal".to_string(), 0.5),
            ]
            .into_iter()
            .collect(),
            validation_boost_applied: false,
        });

        let assessment = discovery_bias(&discovery, &distribution);
        assert!(assessment.platform_balance > 0.4);
        assert!((assessment.discovery_completeness - 1.0).abs() < 1e-9);
        assert_eq!(assessment.level, RiskLevel::Low);
    }
}
