//! Co-occurrence Analyzer
//!
//! Builds header pair statistics over the site bitset matrix: joint counts by
//! popcount intersection, conditional probabilities, and mutual information.
//! On top of the pair matrix it detects technology-stack signatures,
//! platform-exclusive combinations, mutual-exclusivity groups and strong
//! correlations.
//!
//! When the dataset carries validation metadata, only validated headers enter
//! the matrix; otherwise every observed header does. An injected vendor
//! snapshot labels pair sides with vendor names.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::analyzers::{aggregate::result_metadata, CorpusAnalyzer};
use crate::dataset::{SiteBitset, SiteIndex};
use crate::types::analysis_thresholds::{
    EPSILON, EXCLUSIVITY_MAX_CONDITIONAL, EXCLUSIVITY_MAX_JOINT_FREQUENCY,
    EXCLUSIVITY_MIN_GROUP, PLATFORM_COMBINATION_MIN_FREQUENCY, STRONG_CONDITIONAL_PROBABILITY,
    STRONG_CORRELATION_LIMIT, STRONG_MI,
};
use crate::types::{
    AnalysisError, AnalysisOptions, AnalysisResult, CooccurrenceAnalysis, ExclusivityGroup,
    HeaderClass, HeaderPairStat, PatternRecord, PlatformCombination, PreprocessedDataset,
    StackSignatureMatch, StrongCorrelation, VendorAnalysis,
};
use crate::vendor::SIGNATURE_CATALOG;

/// Deterministic name-shape classifier for header semantics.
/// Rule order is fixed: security beats caching beats infrastructure.
pub fn classify_header(header: &str) -> HeaderClass {
    const SECURITY_SUBSTRINGS: &[&str] = &[
        "content-security",
        "strict-transport",
        "x-frame",
        "x-xss",
        "x-content-type-options",
        "permissions-policy",
        "referrer-policy",
        "x-permitted",
        "expect-ct",
    ];
    const CACHING_EXACT: &[&str] = &["age", "expires", "etag", "last-modified"];
    const CACHING_SUBSTRINGS: &[&str] = &["cache", "x-varnish", "x-served-by"];
    const INFRASTRUCTURE_EXACT: &[&str] = &["server", "via", "x-powered-by"];
    const INFRASTRUCTURE_SUBSTRINGS: &[&str] =
        &["cf-", "x-amz", "x-request-id", "x-backend", "x-proxy"];

    let header = header.to_ascii_lowercase();
    if SECURITY_SUBSTRINGS.iter().any(|t| header.contains(t)) {
        HeaderClass::Security
    } else if CACHING_EXACT.iter().any(|t| header == *t)
        || CACHING_SUBSTRINGS.iter().any(|t| header.contains(t))
    {
        HeaderClass::Caching
    } else if INFRASTRUCTURE_EXACT.iter().any(|t| header == *t)
        || INFRASTRUCTURE_SUBSTRINGS.iter().any(|t| header.contains(t))
    {
        HeaderClass::Infrastructure
    } else {
        HeaderClass::Custom
    }
}

/// Mutual information of one pair: p * ln(p / (f1 * f2)), zero when the
/// joint probability or the product vanishes
fn mutual_information(p_joint: f64, f1: f64, f2: f64) -> f64 {
    let product = f1 * f2;
    if p_joint <= EPSILON || product <= EPSILON {
        return 0.0;
    }
    p_joint * (p_joint / product).ln()
}

/// Header pair and association analyzer
#[derive(Debug, Default)]
pub struct CooccurrenceAnalyzer {
    vendor: Option<VendorAnalysis>,
}

impl CooccurrenceAnalyzer {
    pub fn new() -> Self {
        Self { vendor: None }
    }

    /// Inject the finished vendor snapshot so pair sides carry vendor labels
    pub fn set_vendor_data(&mut self, snapshot: VendorAnalysis) {
        self.vendor = Some(snapshot);
    }

    fn vendor_of(&self, header: &str) -> Option<String> {
        self.vendor
            .as_ref()
            .and_then(|v| v.detections.get(header))
            .map(|d| d.vendor.clone())
    }

    /// Technology-stack signatures over required/conflicting bitsets.
    /// Signature confidence is the mean P(h2|h1) over required header pairs.
    fn match_stack_signatures(&self, index: &SiteIndex) -> Vec<StackSignatureMatch> {
        let mut matches = Vec::new();

        for spec in SIGNATURE_CATALOG {
            let mut required_sets: Vec<&SiteBitset> = Vec::new();
            let mut missing = false;
            for header in spec.required {
                match index.sites_with(header) {
                    Some(bitset) => required_sets.push(bitset),
                    None => {
                        missing = true;
                        break;
                    }
                }
            }
            if missing || required_sets.is_empty() {
                continue;
            }

            let mut joint = required_sets[0].clone();
            for bitset in &required_sets[1..] {
                joint = joint.intersection(bitset);
            }
            for header in spec.conflicting {
                if let Some(conflict) = index.sites_with(header) {
                    let conflict_free: Vec<usize> =
                        joint.iter().filter(|id| !conflict.contains(*id)).collect();
                    let mut rebuilt = SiteBitset::with_capacity(index.total_sites());
                    for id in conflict_free {
                        rebuilt.insert(id);
                    }
                    joint = rebuilt;
                }
            }

            if joint.is_empty() {
                continue;
            }

            // Mean conditional over ordered required pairs
            let mut conditional_sum = 0.0;
            let mut conditional_count = 0usize;
            for (i, h1) in spec.required.iter().enumerate() {
                for h2 in spec.required.iter().skip(i + 1) {
                    let (Some(s1), Some(s2)) = (index.sites_with(h1), index.sites_with(h2))
                    else {
                        continue;
                    };
                    let pair_joint = s1.intersection_count(s2) as f64;
                    if s1.len() > 0 {
                        conditional_sum += pair_joint / s1.len() as f64;
                        conditional_count += 1;
                    }
                }
            }
            let confidence = if conditional_count > 0 {
                conditional_sum / conditional_count as f64
            } else {
                0.0
            };

            matches.push(StackSignatureMatch {
                name: spec.name.to_string(),
                vendor: spec.vendor.to_string(),
                category: spec.category,
                sites: index.urls(&joint),
                confidence,
            });
        }

        matches
    }

    /// Pairwise combinations concentrated within single CMS platforms
    fn platform_combinations(
        index: &SiteIndex,
        pairs: &[HeaderPairStat],
        min_occurrences: usize,
    ) -> Vec<PlatformCombination> {
        let mut combinations = Vec::new();

        for (platform, members) in index.cms_groups() {
            let group_size = members.len();
            if group_size == 0 {
                continue;
            }

            for pair in pairs {
                let (Some(s1), Some(s2)) = (
                    index.sites_with(&pair.header_a),
                    index.sites_with(&pair.header_b),
                ) else {
                    continue;
                };
                let joint = s1.intersection(s2);
                let total_matches = joint.len();
                if total_matches == 0 {
                    continue;
                }
                let group_matches = joint.intersection_count(members);
                if group_matches < min_occurrences {
                    continue;
                }
                let group_frequency = group_matches as f64 / group_size as f64;
                if group_frequency < PLATFORM_COMBINATION_MIN_FREQUENCY {
                    continue;
                }

                combinations.push(PlatformCombination {
                    platform: platform.clone(),
                    header_a: pair.header_a.clone(),
                    header_b: pair.header_b.clone(),
                    group_count: group_matches,
                    group_frequency,
                    exclusivity: group_matches as f64 / total_matches as f64,
                });
            }
        }

        combinations.sort_by(|a, b| {
            b.exclusivity
                .partial_cmp(&a.exclusivity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.platform.cmp(&b.platform))
                .then_with(|| a.header_a.cmp(&b.header_a))
        });
        combinations
    }

    /// Mutual-exclusivity groups: connected components of the low-joint,
    /// low-conditional pair graph, size >= 3
    fn exclusivity_groups(index: &SiteIndex, total_sites: usize) -> Vec<ExclusivityGroup> {
        let headers: Vec<&str> = index.header_names().collect();
        let mut adjacency: BTreeMap<&str, Vec<(&str, f64)>> = BTreeMap::new();

        for (i, &h1) in headers.iter().enumerate() {
            for &h2 in headers.iter().skip(i + 1) {
                let (Some(s1), Some(s2)) = (index.sites_with(h1), index.sites_with(h2)) else {
                    continue;
                };
                let n1 = s1.len();
                let n2 = s2.len();
                if n1 == 0 || n2 == 0 {
                    continue;
                }
                let joint = s1.intersection_count(s2);
                let joint_frequency = joint as f64 / total_sites.max(1) as f64;
                let conditional = (joint as f64 / n1 as f64).max(joint as f64 / n2 as f64);

                if joint_frequency < EXCLUSIVITY_MAX_JOINT_FREQUENCY
                    && conditional < EXCLUSIVITY_MAX_CONDITIONAL
                {
                    let exclusivity = 1.0 - conditional;
                    adjacency.entry(h1).or_default().push((h2, exclusivity));
                    adjacency.entry(h2).or_default().push((h1, exclusivity));
                }
            }
        }

        // Connected components over the exclusivity graph
        let mut visited: BTreeSet<&str> = BTreeSet::new();
        let mut groups = Vec::new();

        for start in adjacency.keys() {
            if visited.contains(start) {
                continue;
            }
            let mut component = Vec::new();
            let mut edge_scores = Vec::new();
            let mut stack = vec![*start];
            while let Some(node) = stack.pop() {
                if !visited.insert(node) {
                    continue;
                }
                component.push(node.to_string());
                if let Some(neighbors) = adjacency.get(node) {
                    for &(next, score) in neighbors {
                        edge_scores.push(score);
                        if !visited.contains(next) {
                            stack.push(next);
                        }
                    }
                }
            }
            if component.len() >= EXCLUSIVITY_MIN_GROUP {
                component.sort();
                let average_exclusivity = if edge_scores.is_empty() {
                    0.0
                } else {
                    edge_scores.iter().sum::<f64>() / edge_scores.len() as f64
                };
                groups.push(ExclusivityGroup {
                    headers: component,
                    average_exclusivity,
                });
            }
        }

        groups.sort_by(|a, b| {
            b.headers
                .len()
                .cmp(&a.headers.len())
                .then_with(|| a.headers.cmp(&b.headers))
        });
        groups
    }
}

impl CorpusAnalyzer for CooccurrenceAnalyzer {
    type Payload = CooccurrenceAnalysis;

    fn name(&self) -> &'static str {
        "CooccurrenceAnalyzerV2"
    }

    fn analyze(
        &self,
        dataset: &PreprocessedDataset,
        options: &AnalysisOptions,
    ) -> Result<AnalysisResult<Self::Payload>, AnalysisError> {
        options.validate()?;

        // Validated headers restrict the matrix when available
        let index = match dataset.metadata.validation.as_ref() {
            Some(validation) if !validation.validated_patterns.is_empty() => {
                let allowed: BTreeSet<String> =
                    validation.validated_patterns.keys().cloned().collect();
                SiteIndex::build_with_headers(dataset, &allowed)
            }
            _ => SiteIndex::build(dataset),
        };

        let total_sites = dataset.total_sites;
        let headers: Vec<&str> = index.header_names().collect();
        debug!(headers = headers.len(), "Building co-occurrence matrix");

        let mut pairs = Vec::new();
        let mut patterns: BTreeMap<String, PatternRecord> = BTreeMap::new();
        let mut total_found = 0usize;

        for (i, &h1) in headers.iter().enumerate() {
            let Some(s1) = index.sites_with(h1) else { continue };
            let n1 = s1.len();
            if n1 == 0 {
                continue;
            }
            for &h2 in headers.iter().skip(i + 1) {
                let Some(s2) = index.sites_with(h2) else { continue };
                let joint_count = s1.intersection_count(s2);
                if joint_count == 0 {
                    continue;
                }
                total_found += 1;
                if joint_count < options.min_occurrences {
                    continue;
                }

                let f1 = n1 as f64 / total_sites.max(1) as f64;
                let f2 = s2.len() as f64 / total_sites.max(1) as f64;
                let p_joint = joint_count as f64 / total_sites.max(1) as f64;
                let conditional = joint_count as f64 / n1 as f64;

                pairs.push(HeaderPairStat {
                    header_a: h1.to_string(),
                    header_b: h2.to_string(),
                    joint_count,
                    joint_frequency_pct: p_joint * 100.0,
                    conditional_probability: conditional,
                    mutual_information: mutual_information(p_joint, f1, f2),
                    vendor_a: self.vendor_of(h1),
                    vendor_b: self.vendor_of(h2),
                    class_a: classify_header(h1),
                    class_b: classify_header(h2),
                });

                let key = format!("cooccurrence:{h1}+{h2}");
                let joint_sites = index.urls(&s1.intersection(s2));
                patterns.insert(
                    key.clone(),
                    PatternRecord {
                        pattern: key,
                        site_count: joint_count,
                        sites: joint_sites,
                        frequency: p_joint,
                        examples: None,
                        metadata: None,
                    },
                );
            }
        }

        // Strong correlations: high MI and high conditional, top N by MI
        let mut strong: Vec<StrongCorrelation> = pairs
            .iter()
            .filter(|p| {
                p.mutual_information > STRONG_MI
                    && p.conditional_probability > STRONG_CONDITIONAL_PROBABILITY
            })
            .map(|p| StrongCorrelation {
                header_a: p.header_a.clone(),
                header_b: p.header_b.clone(),
                mutual_information: p.mutual_information,
                conditional_probability: p.conditional_probability,
            })
            .collect();
        strong.sort_by(|a, b| {
            b.mutual_information
                .partial_cmp(&a.mutual_information)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.header_a.cmp(&b.header_a))
        });
        strong.truncate(STRONG_CORRELATION_LIMIT);

        let signatures = self.match_stack_signatures(&index);
        let platform_combinations =
            Self::platform_combinations(&index, &pairs, options.min_occurrences);
        let exclusivity_groups = Self::exclusivity_groups(&index, total_sites);

        pairs.sort_by(|a, b| {
            b.mutual_information
                .partial_cmp(&a.mutual_information)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.header_a.cmp(&b.header_a))
                .then_with(|| a.header_b.cmp(&b.header_b))
        });

        Ok(AnalysisResult {
            total_sites,
            metadata: result_metadata(self.name(), total_found, patterns.len(), options),
            analyzer_specific: CooccurrenceAnalysis {
                pairs,
                signatures,
                platform_combinations,
                exclusivity_groups,
                strong_correlations: strong,
            },
            patterns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    use crate::types::SiteObservation;

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
    fn always_cooccurring_pair_has_zero_mi() {
        // Two headers on all 10 sites: P(h2|h1) = 1, MI = 1 * ln(1/1) = 0
        let sites: Vec<_> = (0..10)
            .map(|i| make_site(&format!("s{i}.example"), None, &["h-one", "h-two"]))
            .collect();
        let dataset = PreprocessedDataset::from_sites(sites);

        let result = CooccurrenceAnalyzer::new()
            .analyze(&dataset, &AnalysisOptions::default())
            .expect("analyzes");

        let pair = result
            .analyzer_specific
            .pairs
            .iter()
            .find(|p| p.header_a == "h-one" && p.header_b == "h-two")
            .expect("pair present");
        assert_eq!(pair.joint_count, 10);
        assert!((pair.conditional_probability - 1.0).abs() < 1e-9);
        assert!(pair.mutual_information.abs() < 1e-9);
    }

    #[test]
    fn half_overlap_pair_mi_is_half_ln_two() {
        // f1 = f2 = 0.5, joint = 0.5: MI = 0.5 * ln(0.5 / 0.25) = 0.5 ln 2
        let mut sites = Vec::new();
        for i in 0..5 {
            sites.push(make_site(&format!("both{i}.example"), None, &["h-a", "h-b"]));
        }
        for i in 0..5 {
            sites.push(make_site(&format!("neither{i}.example"), None, &["h-c"]));
        }
        let dataset = PreprocessedDataset::from_sites(sites);

        let result = CooccurrenceAnalyzer::new()
            .analyze(&dataset, &AnalysisOptions::default())
            .expect("analyzes");

        let pair = result
            .analyzer_specific
            .pairs
            .iter()
            .find(|p| p.header_a == "h-a" && p.header_b == "h-b")
            .expect("pair present");
        let expected = 0.5 * 2.0_f64.ln();
        assert!(
            (pair.mutual_information - expected).abs() < 1e-6,
            "MI = {}, expected {expected}",
            pair.mutual_information
        );
    }

    #[test]
    fn pair_stored_exactly_once_with_consistent_conditionals() {
        let dataset = PreprocessedDataset::from_sites(vec![
            make_site("a.example", None, &["h-x", "h-y"]),
            make_site("b.example", None, &["h-x", "h-y"]),
            make_site("c.example", None, &["h-x"]),
        ]);

        let result = CooccurrenceAnalyzer::new()
            .analyze(&dataset, &AnalysisOptions::default())
            .expect("analyzes");

        let matching: Vec<_> = result
            .analyzer_specific
            .pairs
            .iter()
            .filter(|p| {
                (p.header_a == "h-x" && p.header_b == "h-y")
                    || (p.header_a == "h-y" && p.header_b == "h-x")
            })
            .collect();
        assert_eq!(matching.len(), 1, "unordered pair stored exactly once");

        // P(h2|h1) * |sites(h1)| == joint_count
        let pair = matching[0];
        let n1 = if pair.header_a == "h-x" { 3.0 } else { 2.0 };
        assert!(
            (pair.conditional_probability * n1 - pair.joint_count as f64).abs() < 1e-9
        );

        assert!(result
            .patterns
            .contains_key("cooccurrence:h-x+h-y"));
    }

    #[test]
    fn min_occurrences_gates_pairs() {
        let dataset = PreprocessedDataset::from_sites(vec![
            make_site("a.example", None, &["h-x", "h-y"]),
            make_site("b.example", None, &["h-x"]),
        ]);

        let options = AnalysisOptions {
            min_occurrences: 2,
            ..AnalysisOptions::default()
        };
        let result = CooccurrenceAnalyzer::new().analyze(&dataset, &options).expect("analyzes");
        assert!(result.analyzer_specific.pairs.is_empty());
        assert!(result.patterns.is_empty());
    }

    #[test]
    fn vendor_labels_attached_from_snapshot() {
        let dataset = PreprocessedDataset::from_sites(vec![
            make_site("a.example", None, &["cf-ray", "x-pingback"]),
            make_site("b.example", None, &["cf-ray", "x-pingback"]),
        ]);

        let mut vendor_analyzer = crate::vendor::VendorAnalyzer::new();
        let vendor_result = vendor_analyzer
            .analyze(&dataset, &AnalysisOptions::default())
            .expect("vendor analyzes");

        let mut analyzer = CooccurrenceAnalyzer::new();
        analyzer.set_vendor_data(vendor_result.analyzer_specific);
        let result = analyzer.analyze(&dataset, &AnalysisOptions::default()).expect("analyzes");

        let pair = result
            .analyzer_specific
            .pairs
            .iter()
            .find(|p| p.header_a == "cf-ray")
            .expect("pair present");
        assert_eq!(pair.vendor_a.as_deref(), Some("Cloudflare"));
        assert_eq!(pair.vendor_b.as_deref(), Some("WordPress"));
    }

    #[test]
    fn platform_combinations_measure_exclusivity() {
        let mut sites = Vec::new();
        for i in 0..5 {
            sites.push(make_site(
                &format!("wp{i}.example"),
                Some("WordPress"),
                &["x-pingback", "x-wp-total"],
            ));
        }
        for i in 0..5 {
            sites.push(make_site(&format!("other{i}.example"), Some("Drupal"), &["server"]));
        }
        let dataset = PreprocessedDataset::from_sites(sites);

        let result = CooccurrenceAnalyzer::new()
            .analyze(&dataset, &AnalysisOptions::default())
            .expect("analyzes");

        let combo = result
            .analyzer_specific
            .platform_combinations
            .iter()
            .find(|c| c.platform == "WordPress")
            .expect("combination present");
        assert!((combo.exclusivity - 1.0).abs() < 1e-9, "WordPress-only combination");
        assert!((combo.group_frequency - 1.0).abs() < 1e-9);
    }

    #[test]
    fn exclusivity_groups_require_three_members() {
        // Three headers on disjoint site sets, each common enough to index
        let mut sites = Vec::new();
        for i in 0..7 {
            sites.push(make_site(&format!("a{i}.example"), None, &["h-alpha"]));
        }
        for i in 0..7 {
            sites.push(make_site(&format!("b{i}.example"), None, &["h-beta"]));
        }
        for i in 0..7 {
            sites.push(make_site(&format!("c{i}.example"), None, &["h-gamma"]));
        }
        let dataset = PreprocessedDataset::from_sites(sites);

        let result = CooccurrenceAnalyzer::new()
            .analyze(&dataset, &AnalysisOptions::default())
            .expect("analyzes");

        let groups = &result.analyzer_specific.exclusivity_groups;
        assert_eq!(groups.len(), 1);
        assert_eq!(
            groups[0].headers,
            vec!["h-alpha".to_string(), "h-beta".to_string(), "h-gamma".to_string()]
        );
        assert!(groups[0].average_exclusivity > 0.9);
    }

    #[test]
    fn classifier_buckets_header_names() {
        assert_eq!(classify_header("x-frame-options"), HeaderClass::Security);
        assert_eq!(classify_header("cache-control"), HeaderClass::Caching);
        assert_eq!(classify_header("server"), HeaderClass::Infrastructure);
        assert_eq!(classify_header("x-whatever-custom"), HeaderClass::Custom);
    }

    #[test]
    fn empty_dataset_produces_empty_analysis() {
        let result = CooccurrenceAnalyzer::new()
            .analyze(&PreprocessedDataset::default(), &AnalysisOptions::default())
            .expect("analyzes");
        assert!(result.patterns.is_empty());
        assert!(result.analyzer_specific.pairs.is_empty());
    }
}
