//! CMS distribution over the corpus, with Unknown-site categorization

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{CmsBucket, CmsDistribution, PreprocessedDataset, SiteObservation, UnknownCategory};

/// Security headers whose combined presence marks an enterprise profile
const ENTERPRISE_SECURITY_HEADERS: &[&str] = &[
    "strict-transport-security",
    "content-security-policy",
    "x-content-type-options",
    "x-frame-options",
    "expect-ct",
    "permissions-policy",
];

/// Minimum enterprise security headers for the enterprise categorization
const ENTERPRISE_HEADER_MINIMUM: usize = 2;

/// Header markers of well-known CDN edges
const CDN_MARKERS: &[&str] = &[
    "cf-ray",
    "x-amz-cf-id",
    "x-amz-cf-pop",
    "x-served-by",
    "via",
    "x-cache",
    "x-fastly-request-id",
    "x-akamai-transformed",
];

/// Deterministic categorization of an unlabeled site.
/// Enterprise wins over CDN when both rule sets match.
pub fn categorize_unknown(site: &SiteObservation) -> UnknownCategory {
    let enterprise_hits = ENTERPRISE_SECURITY_HEADERS
        .iter()
        .filter(|h| site.headers.contains_key(**h))
        .count();
    if enterprise_hits >= ENTERPRISE_HEADER_MINIMUM {
        return UnknownCategory::Enterprise;
    }

    let has_cdn_marker = CDN_MARKERS.iter().any(|h| site.headers.contains_key(*h));
    let cdn_technology = site
        .technologies
        .iter()
        .any(|t| t.to_ascii_lowercase().contains("cdn"));
    if has_cdn_marker || cdn_technology {
        return UnknownCategory::Cdn;
    }

    UnknownCategory::Unknown
}

/// Bucket every site by CMS label and categorize the Unknown bucket
pub fn cms_distribution(dataset: &PreprocessedDataset) -> CmsDistribution {
    let total_sites = dataset.total_sites;
    let mut buckets: BTreeMap<String, CmsBucket> = BTreeMap::new();
    let mut unknown_breakdown: BTreeMap<UnknownCategory, usize> = BTreeMap::new();
    let mut confidence_sums: BTreeMap<String, f64> = BTreeMap::new();

    for (url, site) in &dataset.sites {
        let label = site.cms_label().to_string();
        let bucket = buckets.entry(label.clone()).or_insert_with(|| CmsBucket {
            cms: label.clone(),
            count: 0,
            percentage: 0.0,
            sites: BTreeSet::new(),
            mean_confidence: 0.0,
            technologies: BTreeSet::new(),
        });
        bucket.count += 1;
        bucket.sites.insert(url.clone());
        bucket.technologies.extend(site.technologies.iter().cloned());
        *confidence_sums.entry(label).or_default() += site.confidence;

        if site.cms.is_none() {
            *unknown_breakdown.entry(categorize_unknown(site)).or_default() += 1;
        }
    }

    for (label, bucket) in &mut buckets {
        bucket.percentage = if total_sites > 0 {
            bucket.count as f64 / total_sites as f64 * 100.0
        } else {
            0.0
        };
        bucket.mean_confidence = confidence_sums
            .get(label)
            .map_or(0.0, |sum| sum / bucket.count.max(1) as f64);
    }

    CmsDistribution {
        buckets,
        unknown_breakdown,
        total_sites,
    }
}
